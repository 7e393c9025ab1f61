use anyhow::Result;
use chrono::Utc;

use nous_srs::flashcards::decks::{calculate_deck_stats_in, filter_cards_in, CardFilter};
use nous_srs::time::DayWindow;

use super::review_cards;
use crate::app::App;
use crate::render::terminal::{due_label, key_label, paint, rule, truncate, Color};
use crate::{FilterArg, OutputFormat};

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = Utc::now();
    let cards = review_cards(app, now).await?;
    let stats = calculate_deck_stats_in(&cards, &DayWindow::at(now));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            if stats.decks.is_empty() {
                println!("No cards found.");
                return Ok(());
            }

            let width = stats.decks.iter().map(|d| d.name.chars().count()).max().unwrap_or(4).max(4);
            println!(
                "{:<width$} {:>6} {:>6} {:>8} {:>6} {:>7}",
                "Deck", "Total", "New", "Overdue", "Today", "Future",
                width = width
            );
            println!("{}", rule(width + 38));
            for deck in &stats.decks {
                let overdue = format!("{:>8}", deck.overdue_count);
                let overdue = if deck.overdue_count > 0 {
                    paint(&overdue, Color::RED, use_color)
                } else {
                    overdue
                };
                println!(
                    "{:<width$} {:>6} {:>6} {} {:>6} {:>7}",
                    deck.name,
                    deck.total_count,
                    deck.new_count,
                    overdue,
                    deck.today_count,
                    deck.future_count,
                    width = width
                );
            }

            println!(
                "\n{} cards, {} new, {} overdue",
                stats.total_cards, stats.total_new, stats.total_overdue
            );
        }
    }

    Ok(())
}

fn card_filter(arg: FilterArg) -> CardFilter {
    match arg {
        FilterArg::All => CardFilter::All,
        FilterArg::Overdue => CardFilter::Overdue,
        FilterArg::Today => CardFilter::Today,
        FilterArg::Future => CardFilter::Future,
        FilterArg::New => CardFilter::New,
    }
}

/// Card browser
pub async fn run_cards(
    app: &App,
    filter: FilterArg,
    deck: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let now = Utc::now();
    let window = DayWindow::at(now);
    let cards = review_cards(app, now).await?;
    let mut cards = filter_cards_in(&cards, card_filter(filter), &window);
    if let Some(deck) = deck {
        cards.retain(|c| c.deck.eq_ignore_ascii_case(deck));
    }
    cards.sort_by_key(|c| c.srs.due);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&cards)?);
        }
        OutputFormat::Plain => {
            if cards.is_empty() {
                println!("No matching cards.");
                return Ok(());
            }

            for card in &cards {
                println!(
                    "{:<8} {:<9} {:<11} {:>3} reps {:>2} lapses  {}",
                    card.id,
                    key_label(card.state_key()),
                    due_label(card, &window, use_color),
                    card.srs.reps,
                    card.srs.lapses,
                    truncate(&card.front, 40),
                );
            }
            println!("\n{} cards", cards.len());
        }
    }

    Ok(())
}
