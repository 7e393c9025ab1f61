use anyhow::{Context, Result};
use chrono::Utc;

use nous_srs::flashcards::format_interval;
use nous_srs::flashcards::review::{
    bury_card, grade_card_at, grade_labels, parse_grade, reset_card, suspend_card, unsuspend_card,
};

use super::selected_key;
use crate::app::App;
use crate::render::terminal::{key_label, local_date, paint, Color};
use crate::{CardSelector, OutputFormat};

pub async fn run(
    app: &App,
    id: i64,
    grade: &str,
    card: &CardSelector,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let grade = parse_grade(grade)?;
    let key = selected_key(card)?;
    let outcome = grade_card_at(&app.ctx, id, key, grade, Utc::now())
        .await
        .with_context(|| format!("Failed to grade block {}", id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Plain => {
            let state = &outcome.state;
            println!(
                "Graded {} [{}] {}: next due {} ({})",
                id,
                key_label(key),
                paint(grade.as_str(), Color::BOLD, use_color),
                local_date(state.due),
                format_interval(state.interval),
            );
            println!(
                "  stability {:.2}  difficulty {:.2}  reps {}  lapses {}",
                state.stability, state.difficulty, state.reps, state.lapses
            );
        }
    }

    Ok(())
}

pub async fn run_preview(app: &App, id: i64, card: &CardSelector, format: &OutputFormat) -> Result<()> {
    let key = selected_key(card)?;
    let now = Utc::now();
    let storage = app.ctx.storage();
    let state = storage.load_at(id, key, now).await?;
    let preview = storage.scheduler().preview_intervals(Some(&state), now);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        }
        OutputFormat::Plain => {
            for (grade, label) in grade_labels(&preview) {
                println!("{:<6} {}", grade.as_str(), label);
            }
        }
    }

    Ok(())
}

pub async fn run_bury(app: &App, id: i64, card: &CardSelector, format: &OutputFormat) -> Result<()> {
    let key = selected_key(card)?;
    let state = bury_card(&app.ctx, id, key, Utc::now()).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        OutputFormat::Plain => {
            println!("Buried {} [{}] until {}", id, key_label(key), local_date(state.due));
        }
    }

    Ok(())
}

pub async fn run_suspend(app: &App, id: i64, suspended: bool, format: &OutputFormat) -> Result<()> {
    if suspended {
        suspend_card(&app.ctx, id).await?;
    } else {
        unsuspend_card(&app.ctx, id).await?;
    }

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": id,
                "suspended": suspended,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            let verb = if suspended { "Suspended" } else { "Unsuspended" };
            println!("{} {}", verb, id);
        }
    }

    Ok(())
}

pub async fn run_reset(app: &App, id: i64, format: &OutputFormat) -> Result<()> {
    let cards = reset_card(&app.ctx, id, Utc::now())
        .await
        .with_context(|| format!("Failed to reset block {}", id))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            println!("Reset {}: {} card(s) start over", id, cards.len());
            for card in &cards {
                println!("  [{}] due {}", key_label(card.state_key()), local_date(card.srs.due));
            }
        }
    }

    Ok(())
}
