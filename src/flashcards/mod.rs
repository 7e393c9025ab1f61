//! Flashcards and spaced repetition
//!
//! This module provides:
//! - FSRS memory model (stability/difficulty per card)
//! - Memory state persistence on block properties
//! - Card collection for basic, cloze and direction cards
//! - Review queue and deck statistics
//! - Review actions (grade, bury, suspend, reset)

pub mod algorithm;
pub mod collector;
pub mod decks;
pub mod models;
pub mod queue;
pub mod review;
pub mod storage;

pub use algorithm::{create_initial_state, format_interval, Scheduler};
pub use collector::{collect_review_cards, convert_block_to_review_cards};
pub use decks::{calculate_deck_stats, CardFilter};
pub use models::*;
pub use queue::build_review_queue;
pub use storage::{SrsError, SrsStorage};
