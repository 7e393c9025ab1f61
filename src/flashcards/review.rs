//! Review actions taken from a session

use chrono::{DateTime, Local, Utc};

use super::algorithm::format_interval;
use super::collector::{classify_block, convert_block_to_review_cards};
use super::models::*;
use super::storage::{Result, SrsError, IS_CARD_PROPERTY};
use crate::blocks::{BlockProperty, BulkUpdateResult, DbId, StoreError};
use crate::context::SrsContext;
use crate::events::SrsEvent;
use crate::time::day_start_in;

const STATUS_FIELD: &str = "status";
const SUSPENDED: &str = "suspend";
const ACTIVE: &str = "normal";

pub fn parse_grade(input: &str) -> Result<Grade> {
    input.parse().map_err(SrsError::InvalidGrade)
}

pub fn parse_direction(input: &str) -> Result<Direction> {
    input.parse().map_err(SrsError::InvalidDirection)
}

pub async fn grade_card(ctx: &SrsContext, block_id: DbId, key: StateKey, grade: Grade) -> Result<ReviewOutcome> {
    grade_card_at(ctx, block_id, key, grade, Utc::now()).await
}

/// Apply a grade, persist the new state and notify listeners
pub async fn grade_card_at(
    ctx: &SrsContext,
    block_id: DbId,
    key: StateKey,
    grade: Grade,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome> {
    let outcome = ctx.storage().update_at(block_id, key, grade, now).await?;
    log::info!(
        "[{}] Graded block {} ({}) as {}, next due {}",
        ctx.plugin_name(),
        block_id,
        key.prefix(),
        grade,
        outcome.state.due
    );
    ctx.emit(SrsEvent::CardGraded {
        block_id,
        key,
        grade,
        due: outcome.state.due,
    });
    Ok(outcome)
}

/// One entry of a multi-card grading batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeRequest {
    pub block_id: DbId,
    pub key: StateKey,
    pub grade: Grade,
}

/// Grade several cards; each is applied on its own and failures are reported per block
pub async fn grade_cards(ctx: &SrsContext, requests: &[GradeRequest], now: DateTime<Utc>) -> BulkUpdateResult {
    let mut result = BulkUpdateResult::default();
    // Sequential: requests may share a block
    for request in requests {
        let graded = grade_card_at(ctx, request.block_id, request.key, request.grade, now).await;
        if let Err(e) = &graded {
            log::warn!("[{}] Grading block {} failed: {}", ctx.plugin_name(), request.block_id, e);
        }
        result.record(request.block_id, graded);
    }
    result
}

/// Push a card to the start of tomorrow without grading it
pub async fn bury_card(ctx: &SrsContext, block_id: DbId, key: StateKey, now: DateTime<Utc>) -> Result<MemoryState> {
    let mut state = ctx.storage().load_at(block_id, key, now).await?;
    state.due = day_start_in(now, &Local, 1);
    ctx.storage().save(block_id, key, &state).await?;

    ctx.emit(SrsEvent::CardBuried {
        block_id,
        key,
        due: state.due,
    });
    Ok(state)
}

async fn set_suspended(ctx: &SrsContext, block_id: DbId, suspended: bool) -> Result<()> {
    let status = if suspended { SUSPENDED } else { ACTIVE };
    ctx.store()
        .set_ref_data(
            block_id,
            &ctx.config().card_tag,
            vec![BlockProperty::text(STATUS_FIELD, status)],
        )
        .await?;
    ctx.emit(SrsEvent::CardSuspended { block_id, suspended });
    Ok(())
}

/// Hide every card of the block from collection
pub async fn suspend_card(ctx: &SrsContext, block_id: DbId) -> Result<()> {
    set_suspended(ctx, block_id, true).await
}

pub async fn unsuspend_card(ctx: &SrsContext, block_id: DbId) -> Result<()> {
    set_suspended(ctx, block_id, false).await
}

/// Drop all stored state of a block and start its cards over
pub async fn reset_card(ctx: &SrsContext, block_id: DbId, now: DateTime<Utc>) -> Result<Vec<ReviewCard>> {
    let block = ctx
        .store()
        .get_block(block_id)
        .await?
        .ok_or(SrsError::Store(StoreError::NotFound(block_id)))?;
    let config = ctx.config();
    if classify_block(&block, &config.card_tag, &config.plugin_name).is_none() {
        return Err(SrsError::NotACard(block_id));
    }

    let removed = ctx.storage().cleanup_srs_properties(&block).await?;
    // The marker may be the only thing that makes this block a card
    if block.property(IS_CARD_PROPERTY).is_some() {
        ctx.store()
            .set_properties(block_id, vec![BlockProperty::boolean(IS_CARD_PROPERTY, true)])
            .await?;
    }
    log::info!("[{}] Reset block {}: removed {} properties", ctx.plugin_name(), block_id, removed);

    let block = ctx
        .store()
        .get_block(block_id)
        .await?
        .ok_or(SrsError::Store(StoreError::NotFound(block_id)))?;
    let cards = convert_block_to_review_cards(ctx, &block, now).await?;
    if cards.is_empty() {
        return Err(SrsError::NotACard(block_id));
    }
    Ok(cards)
}

/// Interval each grade would give the card
pub fn preview_card(ctx: &SrsContext, card: &ReviewCard, now: DateTime<Utc>) -> IntervalPreview {
    ctx.storage().scheduler().preview_intervals(Some(&card.srs), now)
}

/// Button labels, e.g. `[(Again, "now"), .., (Easy, "2w")]`
pub fn grade_labels(preview: &IntervalPreview) -> [(Grade, String); 4] {
    [
        (Grade::Again, format_interval(preview.again)),
        (Grade::Hard, format_interval(preview.hard)),
        (Grade::Good, format_interval(preview.good)),
        (Grade::Easy, format_interval(preview.easy)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::content::is_suspended;
    use crate::blocks::{Block, BlockRef, ContentFragment, MemoryBlockStore};
    use crate::config::SrsConfig;
    use crate::flashcards::collector::collect_review_cards_at;
    use crate::flashcards::storage::state_from_block;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, 14, 0, 0).unwrap()
    }

    fn card_block(id: DbId) -> Block {
        let mut block = Block::new(id).with_text(format!("Question {} #card", id));
        block.content = vec![ContentFragment::text(format!("Question {}", id))];
        block.refs.push(BlockRef::tag(id * 10, id, 1000, "card"));
        block
    }

    fn create_test_context() -> (Arc<MemoryBlockStore>, SrsContext) {
        let store = Arc::new(MemoryBlockStore::with_blocks([card_block(1), card_block(2)]));
        let ctx = SrsContext::new(SrsConfig::default(), store.clone());
        (store, ctx)
    }

    #[tokio::test]
    async fn test_grade_card_emits_event() {
        let (store, ctx) = create_test_context();
        let mut events = ctx.subscribe();

        let outcome = grade_card_at(&ctx, 1, StateKey::Plain, Grade::Good, fixed_now())
            .await
            .unwrap();

        let stored = state_from_block(&store.block(1).unwrap(), StateKey::Plain, fixed_now());
        assert_eq!(stored.reps, 1);
        assert_eq!(
            events.recv().await.unwrap(),
            SrsEvent::CardGraded {
                block_id: 1,
                key: StateKey::Plain,
                grade: Grade::Good,
                due: outcome.state.due,
            }
        );
    }

    #[tokio::test]
    async fn test_grade_cards_partial_failure() {
        let (store, ctx) = create_test_context();
        store.fail_writes_for(2);

        let requests = [
            GradeRequest { block_id: 1, key: StateKey::Plain, grade: Grade::Easy },
            GradeRequest { block_id: 2, key: StateKey::Plain, grade: Grade::Easy },
        ];
        let result = grade_cards(&ctx, &requests, fixed_now()).await;

        assert_eq!(result.success, vec![1]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, 2);
        assert!(!result.is_complete_success());
    }

    #[tokio::test]
    async fn test_bury_moves_due_to_tomorrow() {
        let (store, ctx) = create_test_context();
        let key = StateKey::Cloze(2);

        let state = bury_card(&ctx, 1, key, fixed_now()).await.unwrap();

        assert_eq!(state.due, day_start_in(fixed_now(), &Local, 1));
        assert!(state.due > fixed_now());
        let stored = state_from_block(&store.block(1).unwrap(), key, fixed_now());
        assert_eq!(stored.due, state.due);
    }

    #[tokio::test]
    async fn test_suspend_and_unsuspend() {
        let (store, ctx) = create_test_context();

        suspend_card(&ctx, 1).await.unwrap();
        assert!(is_suspended(&store.block(1).unwrap(), "card"));
        let cards = collect_review_cards_at(&ctx, fixed_now()).await;
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2]);

        unsuspend_card(&ctx, 1).await.unwrap();
        let cards = collect_review_cards_at(&ctx, fixed_now()).await;
        assert_eq!(cards.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_starts_over() {
        let (store, ctx) = create_test_context();
        grade_card_at(&ctx, 1, StateKey::Plain, Grade::Easy, fixed_now() - Duration::days(20))
            .await
            .unwrap();

        let cards = reset_card(&ctx, 1, fixed_now()).await.unwrap();

        assert_eq!(cards.len(), 1);
        assert!(cards[0].is_new);
        let stored = state_from_block(&store.block(1).unwrap(), StateKey::Plain, fixed_now());
        assert_eq!(stored.reps, 0);
        assert!(stored.last_reviewed.is_none());
    }

    #[tokio::test]
    async fn test_reset_keeps_card_marker() {
        let (store, ctx) = create_test_context();
        let mut marked = Block::new(3).with_text("Marked only");
        marked.content = vec![ContentFragment::text("Marked only")];
        store.insert(marked);
        grade_card_at(&ctx, 3, StateKey::Plain, Grade::Good, fixed_now() - Duration::days(3))
            .await
            .unwrap();
        assert!(store.block(3).unwrap().property(IS_CARD_PROPERTY).is_some());

        let cards = reset_card(&ctx, 3, fixed_now()).await.unwrap();

        assert_eq!(cards.len(), 1);
        assert!(cards[0].is_new);
        let block = store.block(3).unwrap();
        assert!(block.property(IS_CARD_PROPERTY).is_some());
        assert_eq!(state_from_block(&block, StateKey::Plain, fixed_now()).reps, 0);
    }

    #[tokio::test]
    async fn test_reset_refuses_plain_block_without_touching_it() {
        let (store, ctx) = create_test_context();
        let mut plain = Block::new(4).with_text("Just a note");
        plain.properties.push(BlockProperty::text("srs.note", "keep me"));
        store.insert(plain);

        let result = reset_card(&ctx, 4, fixed_now()).await;

        assert!(matches!(result, Err(SrsError::NotACard(4))));
        assert!(store.block(4).unwrap().property("srs.note").is_some());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_missing_block() {
        let (_store, ctx) = create_test_context();
        let result = reset_card(&ctx, 42, fixed_now()).await;
        assert!(matches!(result, Err(SrsError::Store(StoreError::NotFound(42)))));
    }

    #[tokio::test]
    async fn test_preview_labels_for_new_card() {
        let (_store, ctx) = create_test_context();
        let cards = collect_review_cards_at(&ctx, fixed_now()).await;

        let preview = preview_card(&ctx, &cards[0], fixed_now());
        let labels = grade_labels(&preview);
        assert_eq!(labels[0], (Grade::Again, "now".to_string()));
        assert_eq!(labels[3], (Grade::Easy, "2w".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_grade("perfect"), Err(SrsError::InvalidGrade(_))));
        assert!(matches!(parse_direction("sideways"), Err(SrsError::InvalidDirection(_))));
        assert_eq!(parse_direction("Backward").unwrap(), Direction::Backward);
    }
}
