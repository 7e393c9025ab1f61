//! Deck statistics and card browser filters

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{DeckInfo, DeckStats, ReviewCard};
use crate::time::DayWindow;

pub const DEFAULT_DECK: &str = "Default";

pub fn calculate_deck_stats(cards: &[ReviewCard]) -> DeckStats {
    calculate_deck_stats_in(cards, &DayWindow::at(Utc::now()))
}

/// Per-deck and global counts. Global totals are counted over `cards`
/// directly rather than summed from the decks.
pub fn calculate_deck_stats_in(cards: &[ReviewCard], window: &DayWindow) -> DeckStats {
    let mut by_name: HashMap<&str, DeckInfo> = HashMap::new();

    for card in cards {
        let deck = by_name
            .entry(card.deck.as_str())
            .or_insert_with(|| DeckInfo::new(card.deck.clone()));
        deck.total_count += 1;

        match classify_card(card, window) {
            CardFilter::New => deck.new_count += 1,
            CardFilter::Overdue => deck.overdue_count += 1,
            CardFilter::Today => deck.today_count += 1,
            _ => deck.future_count += 1,
        }
    }

    let mut decks: Vec<DeckInfo> = by_name.into_values().collect();
    decks.sort_by(|a, b| {
        let pinned = |d: &DeckInfo| d.name != DEFAULT_DECK;
        pinned(a)
            .cmp(&pinned(b))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });

    DeckStats {
        decks,
        total_cards: cards.len(),
        total_new: cards.iter().filter(|c| c.is_new).count(),
        total_overdue: cards
            .iter()
            .filter(|c| !c.is_new && window.is_overdue(c.srs.due))
            .count(),
    }
}

/// Card browser filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardFilter {
    All,
    Overdue,
    Today,
    Future,
    New,
}

/// The one bucket a card falls into (never `All`)
pub fn classify_card(card: &ReviewCard, window: &DayWindow) -> CardFilter {
    if card.is_new {
        CardFilter::New
    } else if window.is_overdue(card.srs.due) {
        CardFilter::Overdue
    } else if window.is_today(card.srs.due) {
        CardFilter::Today
    } else {
        CardFilter::Future
    }
}

pub fn filter_cards(cards: &[ReviewCard], filter: CardFilter, now: DateTime<Utc>) -> Vec<ReviewCard> {
    let window = DayWindow::at(now);
    filter_cards_in(cards, filter, &window)
}

pub fn filter_cards_in(cards: &[ReviewCard], filter: CardFilter, window: &DayWindow) -> Vec<ReviewCard> {
    cards
        .iter()
        .filter(|card| filter == CardFilter::All || classify_card(card, window) == filter)
        .cloned()
        .collect()
}
