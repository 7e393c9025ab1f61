//! Reading state persistence
//!
//! ```text
//! ir.priority   number 1-10
//! ir.lastRead   datetime, null until first read
//! ir.readCount  number
//! ir.due        datetime
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scheduler::{calculate_next_due, normalize_priority};
use crate::blocks::content::scalar_text;
use crate::blocks::{Block, BlockProperty, BlockStore, BulkUpdateResult, DbId, KeyedCache, StoreError};
use crate::config::ReadingConfig;
use crate::flashcards::storage::{parse_date, parse_number};

pub const PRIORITY_PROPERTY: &str = "ir.priority";
pub const LAST_READ_PROPERTY: &str = "ir.lastRead";
pub const READ_COUNT_PROPERTY: &str = "ir.readCount";
pub const DUE_PROPERTY: &str = "ir.due";

#[derive(Error, Debug)]
pub enum ReadingError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),
}

pub type Result<T> = std::result::Result<T, ReadingError>;

/// Parse user-entered priority text
pub fn parse_priority(input: &str) -> Result<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .ok_or_else(|| ReadingError::InvalidPriority(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrState {
    pub priority: i32,
    pub last_read: Option<DateTime<Utc>>,
    pub read_count: u32,
    pub due: DateTime<Utc>,
}

impl IrState {
    pub fn is_new(&self) -> bool {
        self.read_count == 0 || self.last_read.is_none()
    }
}

pub struct IrStorage {
    store: Arc<dyn BlockStore>,
    config: ReadingConfig,
    card_tag: String,
    blocks: KeyedCache<DbId, Block>,
}

impl IrStorage {
    pub fn new(store: Arc<dyn BlockStore>, config: ReadingConfig, card_tag: impl Into<String>) -> Self {
        Self {
            store,
            config,
            card_tag: card_tag.into(),
            blocks: KeyedCache::new(),
        }
    }

    pub fn config(&self) -> &ReadingConfig {
        &self.config
    }

    pub fn card_tag(&self) -> &str {
        &self.card_tag
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    /// Drop the cached copy of a block after its properties change
    pub fn invalidate_ir_block_cache(&self, id: DbId) {
        self.blocks.invalidate(&id);
    }

    async fn cached_block(&self, id: DbId) -> Result<Option<Block>> {
        if let Some(block) = self.blocks.get(&id) {
            return Ok(Some(block));
        }
        let block = self.store.get_block(id).await?;
        if let Some(block) = &block {
            self.blocks.insert(id, block.clone());
        }
        Ok(block)
    }

    /// Priority from the tag data, used when the block has none of its own
    fn tag_priority(&self, block: &Block) -> Option<i32> {
        let value = block.tag_ref(&self.card_tag)?.data_value("priority")?;
        let number = parse_number(Some(value))
            .or_else(|| scalar_text(value).and_then(|s| s.parse::<f64>().ok()))?;
        Some(normalize_priority(number))
    }

    fn default_state(&self, now: DateTime<Utc>) -> IrState {
        IrState {
            priority: normalize_priority(self.config.default_priority as f64),
            last_read: None,
            read_count: 0,
            due: now,
        }
    }

    /// State stored on `block`, with per-field fallbacks
    pub fn state_from_block(&self, block: &Block, now: DateTime<Utc>) -> IrState {
        let base = self.default_state(now);
        IrState {
            priority: parse_number(block.property_value(PRIORITY_PROPERTY))
                .map(normalize_priority)
                .or_else(|| self.tag_priority(block))
                .unwrap_or(base.priority),
            last_read: parse_date(block.property_value(LAST_READ_PROPERTY)),
            read_count: parse_number(block.property_value(READ_COUNT_PROPERTY))
                .filter(|n| *n >= 0.0)
                .map(|n| n.round() as u32)
                .unwrap_or(base.read_count),
            due: parse_date(block.property_value(DUE_PROPERTY)).unwrap_or(base.due),
        }
    }

    pub async fn load_ir_state(&self, id: DbId) -> Result<IrState> {
        self.load_ir_state_at(id, Utc::now()).await
    }

    /// Load through the block cache; a missing block yields the default state
    pub async fn load_ir_state_at(&self, id: DbId, now: DateTime<Utc>) -> Result<IrState> {
        Ok(match self.cached_block(id).await? {
            Some(block) => self.state_from_block(&block, now),
            None => self.default_state(now),
        })
    }

    /// Initialize missing reading state on `block`, or return the stored one
    pub async fn ensure_ir_state(&self, block: &Block, now: DateTime<Utc>) -> Result<IrState> {
        let initialized = block.property(PRIORITY_PROPERTY).is_some()
            && block.property(DUE_PROPERTY).is_some();
        if initialized {
            return Ok(self.state_from_block(block, now));
        }

        let state = IrState {
            priority: self
                .tag_priority(block)
                .unwrap_or_else(|| normalize_priority(self.config.default_priority as f64)),
            ..self.default_state(now)
        };
        self.save_ir_state(block.id, &state).await?;
        log::debug!("Initialized reading state for block {}", block.id);
        Ok(state)
    }

    pub async fn save_ir_state(&self, id: DbId, state: &IrState) -> Result<()> {
        let props = vec![
            BlockProperty::number(PRIORITY_PROPERTY, state.priority as f64),
            BlockProperty::datetime(LAST_READ_PROPERTY, state.last_read),
            BlockProperty::number(READ_COUNT_PROPERTY, state.read_count as f64),
            BlockProperty::datetime(DUE_PROPERTY, Some(state.due)),
        ];
        let result = self.store.set_properties(id, props).await;
        self.invalidate_ir_block_cache(id);
        Ok(result?)
    }

    pub async fn mark_as_read(&self, id: DbId) -> Result<IrState> {
        self.mark_as_read_at(id, Utc::now()).await
    }

    /// Count a read and schedule the next one from `now`
    pub async fn mark_as_read_at(&self, id: DbId, now: DateTime<Utc>) -> Result<IrState> {
        let prev = self.load_ir_state_at(id, now).await?;
        let state = IrState {
            priority: prev.priority,
            last_read: Some(now),
            read_count: prev.read_count + 1,
            due: calculate_next_due(prev.priority as f64, now),
        };
        self.save_ir_state(id, &state).await?;
        Ok(state)
    }

    /// Set a new priority; a card already read is rescheduled from its last read
    pub async fn update_priority(&self, id: DbId, priority: f64) -> Result<IrState> {
        let now = Utc::now();
        let prev = self.load_ir_state_at(id, now).await?;
        let priority = normalize_priority(priority);
        let due = match prev.last_read {
            Some(last_read) => calculate_next_due(priority as f64, last_read),
            None => prev.due,
        };

        let props = vec![
            BlockProperty::number(PRIORITY_PROPERTY, priority as f64),
            BlockProperty::datetime(DUE_PROPERTY, Some(due)),
        ];
        let result = self.store.set_properties(id, props).await;
        self.invalidate_ir_block_cache(id);
        result?;

        Ok(IrState {
            priority,
            due,
            ..prev
        })
    }

    /// Apply one priority to many blocks; failures are collected per block
    pub async fn bulk_update_priority(&self, ids: &[DbId], priority: f64) -> BulkUpdateResult {
        let results = join_all(ids.iter().map(|id| self.update_priority(*id, priority))).await;

        let mut outcome = BulkUpdateResult::default();
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = &result {
                log::warn!("Failed to update priority of block {}: {}", id, e);
            }
            outcome.record(*id, result);
        }
        outcome
    }
}
