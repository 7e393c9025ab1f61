//! Spaced repetition and incremental reading for Nous block notes
//!
//! Cards live on ordinary blocks tagged with the configured card tag; their
//! memory state is stored as `srs.*` properties on the same block. Reading
//! cards (extracts and topics) carry `ir.*` properties instead.

pub mod blocks;
pub mod config;
pub mod context;
pub mod events;
pub mod flashcards;
pub mod reading;
pub mod sessions;
pub mod tasks;
pub mod time;

pub use config::SrsConfig;
pub use context::SrsContext;
