//! Reading card collection, queue and stats

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::storage::{IrStorage, Result};
use crate::blocks::content::{extract_card_type, is_suspended, remove_hash_tags};
use crate::blocks::{Block, DbId};
use crate::flashcards::queue::interleave_due_new;
use crate::tasks::{run_cancellable, LoadOutcome};
use crate::time::DayWindow;

/// Localized label some users have on existing topic blocks
const TOPIC_LABEL_ZH: &str = "渐进阅读";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IrCardType {
    Extracts,
    Topic,
}

impl IrCardType {
    /// Parse the tag-data `type`; anything else is not a reading card
    pub fn from_tag_type(value: &str) -> Option<Self> {
        match value.trim() {
            "extracts" => Some(IrCardType::Extracts),
            "topic" | TOPIC_LABEL_ZH => Some(IrCardType::Topic),
            _ => None,
        }
    }

    pub fn of_block(block: &Block, tag: &str) -> Option<Self> {
        extract_card_type(block, tag).and_then(|t| Self::from_tag_type(&t))
    }
}

impl fmt::Display for IrCardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrCardType::Extracts => f.write_str("extracts"),
            IrCardType::Topic => f.write_str("topic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrCard {
    pub id: DbId,
    pub title: String,
    pub card_type: IrCardType,
    pub priority: i32,
    pub due: DateTime<Utc>,
    pub last_read: Option<DateTime<Utc>>,
    pub read_count: u32,
    pub is_new: bool,
}

impl IrCard {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

async fn load_card(storage: &IrStorage, block: &Block, now: DateTime<Utc>) -> Result<Option<IrCard>> {
    let tag = storage.card_tag();
    if is_suspended(block, tag) {
        return Ok(None);
    }
    let Some(card_type) = IrCardType::of_block(block, tag) else {
        return Ok(None);
    };

    let state = storage.ensure_ir_state(block, now).await?;
    Ok(Some(IrCard {
        id: block.id,
        title: remove_hash_tags(block.text.as_deref().unwrap_or_default()),
        card_type,
        priority: state.priority,
        due: state.due,
        last_read: state.last_read,
        read_count: state.read_count,
        is_new: state.is_new(),
    }))
}

/// Every reading card among `blocks`, initializing missing state
pub async fn load_ir_cards(storage: &IrStorage, blocks: &[Block], now: DateTime<Utc>) -> Vec<IrCard> {
    let results = join_all(blocks.iter().map(|block| load_card(storage, block, now))).await;

    let mut cards = Vec::new();
    for (block, result) in blocks.iter().zip(results) {
        match result {
            Ok(Some(card)) => cards.push(card),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping reading block {}: {}", block.id, e),
        }
    }
    cards
}

/// Reading cards that are new or due at `now`
pub async fn collect_ir_cards_from_blocks(
    storage: &IrStorage,
    blocks: &[Block],
    now: DateTime<Utc>,
) -> Vec<IrCard> {
    load_ir_cards(storage, blocks, now)
        .await
        .into_iter()
        .filter(|card| card.is_new || card.is_due(now))
        .collect()
}

/// All tagged reading cards in the store
pub async fn collect_ir_cards(storage: &IrStorage, now: DateTime<Utc>) -> Result<Vec<IrCard>> {
    let blocks = storage.store().get_blocks_with_tag(storage.card_tag()).await?;
    Ok(collect_ir_cards_from_blocks(storage, &blocks, now).await)
}

/// Ordered reading queue, abandoned once `cancel` fires
pub async fn load_ir_queue(
    storage: &IrStorage,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> LoadOutcome<Result<Vec<IrCard>>> {
    run_cancellable(cancel, async {
        collect_ir_cards(storage, now).await.map(build_ir_queue)
    })
    .await
}

/// Higher priority first; topics before extracts on a tie
fn queue_order(a: &IrCard, b: &IrCard) -> Ordering {
    let topic_rank = |card: &IrCard| match card.card_type {
        IrCardType::Topic => 0,
        IrCardType::Extracts => 1,
    };
    b.priority
        .cmp(&a.priority)
        .then_with(|| topic_rank(a).cmp(&topic_rank(b)))
}

/// Priority-sorted due and new partitions, interleaved 2:1
pub fn build_ir_queue(cards: Vec<IrCard>) -> Vec<IrCard> {
    let (mut new, mut due): (Vec<_>, Vec<_>) = cards.into_iter().partition(|c| c.is_new);
    // Stable sorts keep input order among equals
    due.sort_by(queue_order);
    new.sort_by(queue_order);
    interleave_due_new(due, new)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrStats {
    pub total: usize,
    pub new_count: usize,
    pub overdue_count: usize,
    pub today_count: usize,
    /// Due in the seven days after today
    pub upcoming7_count: usize,
}

pub fn calculate_ir_stats(cards: &[IrCard], window: &DayWindow) -> IrStats {
    let mut stats = IrStats {
        total: cards.len(),
        ..Default::default()
    };

    for card in cards {
        if card.is_new {
            stats.new_count += 1;
        } else if window.is_overdue(card.due) {
            stats.overdue_count += 1;
        } else if window.is_today(card.due) {
            stats.today_count += 1;
        } else if card.due < window.week_end {
            stats.upcoming7_count += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockProperty, BlockRef, MemoryBlockStore};
    use crate::config::ReadingConfig;
    use crate::reading::storage::{DUE_PROPERTY, LAST_READ_PROPERTY, PRIORITY_PROPERTY, READ_COUNT_PROPERTY};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn ir_block(id: DbId, type_value: &str, read_count: u32, due: DateTime<Utc>) -> Block {
        let mut block = Block::new(id).with_text(format!("{}-{}", type_value, id));
        block.refs.push(
            BlockRef::tag(id * 100, id, 1, "card")
                .with_data(vec![BlockProperty::text("type", type_value)]),
        );
        let last_read = (read_count > 0).then(|| fixed_now() - Duration::seconds(1));
        block.properties = vec![
            BlockProperty::number(PRIORITY_PROPERTY, 5.0),
            BlockProperty::datetime(LAST_READ_PROPERTY, last_read),
            BlockProperty::number(READ_COUNT_PROPERTY, read_count as f64),
            BlockProperty::datetime(DUE_PROPERTY, Some(due)),
        ];
        block
    }

    fn card(id: DbId, card_type: IrCardType, priority: i32, is_new: bool) -> IrCard {
        IrCard {
            id,
            title: String::new(),
            card_type,
            priority,
            due: fixed_now(),
            last_read: (!is_new).then(fixed_now),
            read_count: if is_new { 0 } else { 1 },
            is_new,
        }
    }

    #[tokio::test]
    async fn test_collects_new_or_due_reading_cards_only() {
        let blocks = vec![
            ir_block(1, "extracts", 0, fixed_now() + Duration::hours(1)),
            ir_block(2, "topic", 1, fixed_now() - Duration::seconds(1)),
            ir_block(3, "basic", 1, fixed_now() - Duration::seconds(1)),
            ir_block(4, "extracts", 2, fixed_now() + Duration::days(3)),
        ];
        let store = Arc::new(MemoryBlockStore::with_blocks(blocks.clone()));
        let storage = IrStorage::new(store.clone(), ReadingConfig::default(), "card");

        let cards = collect_ir_cards_from_blocks(&storage, &blocks, fixed_now()).await;

        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(cards[0].is_new);
        assert_eq!(cards[1].card_type, IrCardType::Topic);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_uninitialized_blocks_get_state() {
        let mut block = Block::new(5).with_text("fresh extract");
        block.refs.push(
            BlockRef::tag(500, 5, 1, "card")
                .with_data(vec![BlockProperty::text("type", "extracts")]),
        );
        let store = Arc::new(MemoryBlockStore::with_blocks([block.clone()]));
        let storage = IrStorage::new(store.clone(), ReadingConfig::default(), "card");

        let cards = collect_ir_cards_from_blocks(&storage, &[block], fixed_now()).await;
        assert_eq!(cards.len(), 1);
        assert!(cards[0].is_new);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_queue_load_writes_nothing() {
        let mut block = Block::new(6).with_text("untouched");
        block.refs.push(
            BlockRef::tag(600, 6, 1, "card")
                .with_data(vec![BlockProperty::text("type", "topic")]),
        );
        let store = Arc::new(MemoryBlockStore::with_blocks([block]));
        let storage = IrStorage::new(store.clone(), ReadingConfig::default(), "card");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = load_ir_queue(&storage, fixed_now(), &cancel).await;
        assert!(matches!(outcome, LoadOutcome::Cancelled));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_queue_load_completes_with_live_token() {
        let blocks = vec![
            ir_block(1, "extracts", 1, fixed_now() - Duration::hours(1)),
            ir_block(2, "topic", 1, fixed_now() - Duration::hours(1)),
        ];
        let store = Arc::new(MemoryBlockStore::with_blocks(blocks));
        let storage = IrStorage::new(store, ReadingConfig::default(), "card");

        let outcome = load_ir_queue(&storage, fixed_now(), &CancellationToken::new()).await;
        let queue = match outcome {
            LoadOutcome::Completed(queue) => queue.unwrap(),
            LoadOutcome::Cancelled => panic!("load was not cancelled"),
        };
        assert_eq!(queue.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_queue_orders_by_priority_and_interleaves() {
        let cards = vec![
            card(1, IrCardType::Extracts, 5, false),
            card(2, IrCardType::Extracts, 9, false),
            card(3, IrCardType::from_tag_type("渐进阅读").unwrap(), 9, false),
            card(4, IrCardType::Extracts, 7, true),
            card(5, IrCardType::Extracts, 10, true),
        ];

        let queue = build_ir_queue(cards);
        assert_eq!(queue.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 2, 5, 1, 4]);
    }

    #[test]
    fn test_ir_stats_windows() {
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
        let window = DayWindow::in_tz(now, &Utc);
        let due_at = |due: DateTime<Utc>| IrCard {
            due,
            ..card(0, IrCardType::Extracts, 5, false)
        };

        let cards = vec![
            card(1, IrCardType::Topic, 5, true),
            due_at(now - Duration::days(2)),
            due_at(now + Duration::hours(2)),
            due_at(now + Duration::days(1)),
            due_at(now + Duration::days(7)),
            due_at(now + Duration::days(8)),
        ];

        let stats = calculate_ir_stats(&cards, &window);
        assert_eq!(
            stats,
            IrStats {
                total: 6,
                new_count: 1,
                overdue_count: 1,
                today_count: 1,
                upcoming7_count: 2,
            }
        );
    }
}
