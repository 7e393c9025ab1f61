pub mod decks;
pub mod grade;
pub mod queue;
pub mod reading;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use nous_srs::flashcards::collector::load_review_cards;
use nous_srs::flashcards::review::parse_direction;
use nous_srs::flashcards::{ReviewCard, StateKey};
use nous_srs::tasks::LoadOutcome;

use crate::app::App;
use crate::CardSelector;

/// Token cancelled on Ctrl-C
pub fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    cancel
}

/// Every review card in the store; Ctrl-C abandons the load
pub async fn review_cards(app: &App, now: DateTime<Utc>) -> Result<Vec<ReviewCard>> {
    match load_review_cards(&app.ctx, now, &interrupt_token()).await {
        LoadOutcome::Completed(cards) => Ok(cards),
        LoadOutcome::Cancelled => bail!("Interrupted"),
    }
}

/// State namespace picked by `--cloze` / `--direction`
pub fn selected_key(card: &CardSelector) -> Result<StateKey> {
    if let Some(n) = card.cloze {
        return Ok(StateKey::Cloze(n));
    }
    match card.direction.as_deref() {
        Some(d) => Ok(StateKey::Direction(parse_direction(d)?)),
        None => Ok(StateKey::Plain),
    }
}
