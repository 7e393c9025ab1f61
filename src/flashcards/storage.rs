//! Memory state persistence on block properties
//!
//! Property layout per state key:
//! ```text
//! srs.isCard                     # plain cards only
//! srs.stability  srs.difficulty  srs.interval  srs.reps  srs.lapses
//! srs.due        srs.lastReviewed
//!
//! srs.c<N>.<field>               # cloze blank N
//! srs.<forward|backward>.<field> # direction side
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

use super::algorithm::{create_initial_state, Scheduler};
use super::models::*;
use crate::blocks::{Block, BlockProperty, BlockStore, DbId, PropertyWrite, StoreError};
use crate::config::SchedulerConfig;

pub const SRS_PREFIX: &str = "srs.";
pub const IS_CARD_PROPERTY: &str = "srs.isCard";

const STABILITY: &str = "stability";
const DIFFICULTY: &str = "difficulty";
const INTERVAL: &str = "interval";
const DUE: &str = "due";
const LAST_REVIEWED: &str = "lastReviewed";
const REPS: &str = "reps";
const LAPSES: &str = "lapses";

#[derive(Error, Debug)]
pub enum SrsError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid grade: {0}")]
    InvalidGrade(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Block {0} is not a card")]
    NotACard(DbId),
}

pub type Result<T> = std::result::Result<T, SrsError>;

/// Number from a property value; numeric strings are accepted
pub fn parse_number(value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Date from a property value: RFC 3339 string or epoch milliseconds
pub fn parse_date(value: Option<&serde_json::Value>) -> Option<DateTime<Utc>> {
    match value? {
        serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn parse_count(value: Option<&serde_json::Value>) -> Option<u32> {
    parse_number(value)
        .filter(|n| *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n.round() as u32)
}

/// Read the state stored under `key`, filling gaps from a fresh state at `now`
pub fn state_from_block(block: &Block, key: StateKey, now: DateTime<Utc>) -> MemoryState {
    let base = create_initial_state(now);
    let value = |field: &str| block.property_value(&key.property_name(field));

    let reps = parse_count(value(REPS)).unwrap_or(base.reps);
    MemoryState {
        stability: parse_number(value(STABILITY))
            .filter(|s| *s >= 0.0)
            .unwrap_or(base.stability),
        difficulty: parse_number(value(DIFFICULTY)).unwrap_or(base.difficulty),
        interval: parse_number(value(INTERVAL))
            .filter(|i| *i >= 0.0)
            .unwrap_or(base.interval),
        due: parse_date(value(DUE)).unwrap_or(base.due),
        last_reviewed: parse_date(value(LAST_REVIEWED)).or(base.last_reviewed),
        reps,
        lapses: parse_count(value(LAPSES)).unwrap_or(base.lapses),
        state: if reps > 0 {
            CardStatus::Review
        } else {
            CardStatus::New
        },
    }
}

/// Property writes that persist `state` under `key`
pub fn state_properties(key: StateKey, state: &MemoryState) -> Vec<PropertyWrite> {
    let mut props = Vec::with_capacity(8);
    if key == StateKey::Plain {
        props.push(BlockProperty::boolean(IS_CARD_PROPERTY, true));
    }
    props.extend([
        BlockProperty::number(key.property_name(STABILITY), state.stability),
        BlockProperty::number(key.property_name(DIFFICULTY), state.difficulty),
        BlockProperty::number(key.property_name(INTERVAL), state.interval),
        BlockProperty::datetime(key.property_name(DUE), Some(state.due)),
        BlockProperty::datetime(key.property_name(LAST_REVIEWED), state.last_reviewed),
        BlockProperty::number(key.property_name(REPS), state.reps as f64),
        BlockProperty::number(key.property_name(LAPSES), state.lapses as f64),
    ]);
    props
}

/// Whether the block has any stored state under `key`
pub fn has_state(block: &Block, key: StateKey) -> bool {
    block.has_property_prefix(&key.prefix())
        && (key != StateKey::Plain || block.property(&key.property_name(DUE)).is_some())
}

/// Storage adapter between memory states and block properties
pub struct SrsStorage {
    store: Arc<dyn BlockStore>,
    scheduler: Scheduler,
}

impl SrsStorage {
    pub fn new(store: Arc<dyn BlockStore>, config: SchedulerConfig) -> Self {
        Self {
            store,
            scheduler: Scheduler::new(config),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub async fn load(&self, block_id: DbId, key: StateKey) -> Result<MemoryState> {
        self.load_at(block_id, key, Utc::now()).await
    }

    /// Load a state; a missing block yields a fresh state at `now`
    pub async fn load_at(&self, block_id: DbId, key: StateKey, now: DateTime<Utc>) -> Result<MemoryState> {
        match self.store.get_block(block_id).await? {
            Some(block) => Ok(state_from_block(&block, key, now)),
            None => {
                log::debug!("Block {} not found, using initial SRS state", block_id);
                Ok(create_initial_state(now))
            }
        }
    }

    /// Write all fields of `state` in one batched command
    pub async fn save(&self, block_id: DbId, key: StateKey, state: &MemoryState) -> Result<()> {
        self.store
            .set_properties(block_id, state_properties(key, state))
            .await?;
        Ok(())
    }

    /// Persist a fresh state whose due date is `due_base`
    pub async fn write_initial(
        &self,
        block_id: DbId,
        key: StateKey,
        due_base: DateTime<Utc>,
    ) -> Result<MemoryState> {
        let state = create_initial_state(due_base);
        self.save(block_id, key, &state).await?;
        Ok(state)
    }

    pub async fn update(&self, block_id: DbId, key: StateKey, grade: Grade) -> Result<ReviewOutcome> {
        self.update_at(block_id, key, grade, Utc::now()).await
    }

    /// Load, apply `grade`, save
    pub async fn update_at(
        &self,
        block_id: DbId,
        key: StateKey,
        grade: Grade,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let prev = self.load_at(block_id, key, now).await?;
        let outcome = self.scheduler.next_state(Some(&prev), grade, now);
        self.save(block_id, key, &outcome.state).await?;
        Ok(outcome)
    }

    /// Remove every `srs.*` property from the block; returns how many were removed
    pub async fn cleanup_srs_properties(&self, block: &Block) -> Result<usize> {
        let names: Vec<String> = block
            .properties
            .iter()
            .filter(|p| p.name.starts_with(SRS_PREFIX))
            .map(|p| p.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(0);
        }
        self.store.delete_properties(block.id, &names).await?;
        Ok(names.len())
    }
}
