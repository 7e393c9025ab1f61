use anyhow::Result;
use chrono::Utc;

use nous_srs::flashcards::queue::build_review_queue_at;
use nous_srs::time::DayWindow;

use super::review_cards;
use crate::app::App;
use crate::render::terminal::{due_label, key_label, rule, truncate};
use crate::OutputFormat;

pub async fn run(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = Utc::now();
    let cards = review_cards(app, now).await?;
    let mut queue = build_review_queue_at(cards, now);
    if let Some(limit) = limit {
        queue.truncate(limit);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&queue)?);
        }
        OutputFormat::Plain => {
            if queue.is_empty() {
                println!("Nothing to review.");
                return Ok(());
            }

            let window = DayWindow::at(now);
            println!("{:<8} {:<9} {:<12} {:<11} Front", "Id", "Card", "Deck", "Due");
            println!("{}", rule(72));
            for card in &queue {
                println!(
                    "{:<8} {:<9} {:<12} {:<11} {}",
                    card.id,
                    key_label(card.state_key()),
                    truncate(&card.deck, 12),
                    due_label(card, &window, use_color),
                    truncate(&card.front, 40),
                );
            }

            let new_count = queue.iter().filter(|c| c.is_new).count();
            println!("\n{} cards ({} due, {} new)", queue.len(), queue.len() - new_count, new_count);
        }
    }

    Ok(())
}
