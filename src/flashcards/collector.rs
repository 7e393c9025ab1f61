//! Card discovery and expansion
//!
//! Sources, merged by block id:
//! 1. blocks under the card tag in the store's tag index
//! 2. if that comes back empty, a full scan for blocks with a card tag reference
//! 3. card blocks in the editor's working set (may not be indexed yet)

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Local, Utc};
use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;

use super::models::*;
use super::storage::{has_state, state_from_block, Result, IS_CARD_PROPERTY};
use crate::blocks::content::{
    cloze_fragment_type, direction_fragment_type, direction_info, distinct_cloze_numbers,
    extract_card_type, extract_deck_name, is_suspended, remove_hash_tags, resolve_front_back,
    NO_QUESTION,
};
use crate::blocks::{Block, BlockStore, DbId, QueryResult};
use crate::context::SrsContext;
use crate::tasks::{run_cancellable, LoadOutcome};
use crate::time::day_start_in;

/// Repr types of blocks converted to cards by the editor
pub const CARD_REPR_TYPES: [&str; 3] = ["srs.card", "srs.cloze-card", "srs.direction-card"];
const QUERY_REPR_TYPE: &str = "query";

/// Whether the block is marked as a card by tag, repr or property
pub fn is_card_block(block: &Block, tag: &str) -> bool {
    block.has_tag(tag)
        || block.repr_type().map_or(false, |t| CARD_REPR_TYPES.contains(&t))
        || block.property(IS_CARD_PROPERTY).is_some()
}

/// Decide the card variant of a block once; `None` when it is not a card
pub fn classify_block(block: &Block, tag: &str, plugin_name: &str) -> Option<CardKind> {
    if !is_card_block(block, tag) {
        return None;
    }

    let declared = extract_card_type(block, tag);
    let repr = block.repr_type();
    let cloze_type = cloze_fragment_type(plugin_name);
    let blank_numbers = distinct_cloze_numbers(&block.content, &cloze_type);

    if declared.as_deref() == Some("cloze") || repr == Some("srs.cloze-card") || !blank_numbers.is_empty() {
        return Some(CardKind::Cloze { blank_numbers });
    }

    let wants_direction = declared.as_deref() == Some("direction") || repr == Some("srs.direction-card");
    let has_arrow = direction_info(&block.content, &direction_fragment_type(plugin_name)).is_some();
    if has_arrow {
        return Some(CardKind::Direction);
    }
    if wants_direction {
        log::debug!("Block {} is marked as a direction card but has no arrow", block.id);
    }
    Some(CardKind::Basic)
}

/// Label shown on the back of a cloze card
pub fn cloze_back_label(number: u32) -> String {
    format!("Cloze c{}", number)
}

async fn stored_or_initial(
    ctx: &SrsContext,
    block: &Block,
    key: StateKey,
    due_base: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<MemoryState> {
    if has_state(block, key) {
        return Ok(state_from_block(block, key, now));
    }
    ctx.storage().write_initial(block.id, key, due_base).await
}

fn review_card(block: &Block, deck: &str, front: String, back: String, srs: MemoryState) -> ReviewCard {
    ReviewCard {
        id: block.id,
        front,
        back,
        is_new: srs.is_new(),
        srs,
        deck: deck.to_string(),
        cloze_number: None,
        direction: None,
    }
}

/// Expand one block into its review cards, initializing missing state
pub async fn convert_block_to_review_cards(
    ctx: &SrsContext,
    block: &Block,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewCard>> {
    let config = ctx.config();
    if is_suspended(block, &config.card_tag) {
        return Ok(Vec::new());
    }
    let Some(kind) = classify_block(block, &config.card_tag, &config.plugin_name) else {
        return Ok(Vec::new());
    };
    let deck = extract_deck_name(block, &config.card_tag, &config.default_deck);

    let cards = match kind {
        CardKind::Basic => {
            let (front, back) = resolve_front_back(block, ctx.store()).await?;
            let srs = stored_or_initial(ctx, block, StateKey::Plain, now, now).await?;
            vec![review_card(block, &deck, front, back, srs)]
        }
        CardKind::Cloze { blank_numbers } => {
            if blank_numbers.is_empty() {
                log::warn!("[{}] Cloze block {} has no blanks, skipping", config.plugin_name, block.id);
                return Ok(Vec::new());
            }
            let front = remove_hash_tags(block.text.as_deref().unwrap_or(NO_QUESTION));
            let mut cards = Vec::with_capacity(blank_numbers.len());
            for number in blank_numbers {
                let due_base = day_start_in(now, &Local, (number - 1) as u64);
                let srs = stored_or_initial(ctx, block, StateKey::Cloze(number), due_base, now).await?;
                let mut card = review_card(block, &deck, front.clone(), cloze_back_label(number), srs);
                card.cloze_number = Some(number);
                cards.push(card);
            }
            cards
        }
        CardKind::Direction => {
            let direction_type = direction_fragment_type(&config.plugin_name);
            let Some(info) = direction_info(&block.content, &direction_type) else {
                return Ok(Vec::new());
            };
            let mut cards = Vec::with_capacity(2);
            for direction in Direction::BOTH {
                let (front, back) = match direction {
                    Direction::Forward => (info.left_text.clone(), info.right_text.clone()),
                    Direction::Backward => (info.right_text.clone(), info.left_text.clone()),
                };
                let due_base = day_start_in(now, &Local, direction.initial_offset_days() as u64);
                let key = StateKey::Direction(direction);
                let srs = stored_or_initial(ctx, block, key, due_base, now).await?;
                let mut card = review_card(block, &deck, front, back, srs);
                card.direction = Some(direction);
                cards.push(card);
            }
            cards
        }
    };
    Ok(cards)
}

/// Convert blocks concurrently; a failing block is logged and skipped
pub async fn convert_blocks(ctx: &SrsContext, blocks: &[Block], now: DateTime<Utc>) -> Vec<ReviewCard> {
    let results = join_all(
        blocks
            .iter()
            .map(|block| convert_block_to_review_cards(ctx, block, now)),
    )
    .await;

    let mut cards = Vec::new();
    for (block, result) in blocks.iter().zip(results) {
        match result {
            Ok(mut converted) => cards.append(&mut converted),
            Err(e) => log::warn!("[{}] Skipping block {}: {}", ctx.plugin_name(), block.id, e),
        }
    }
    cards
}

/// Candidate card blocks from the tag index, the scan fallback and the working set
pub async fn collect_srs_blocks(ctx: &SrsContext) -> Vec<Block> {
    let plugin = ctx.plugin_name();
    let tag = ctx.config().card_tag.as_str();

    let mut tagged = match ctx.store().get_blocks_with_tag(tag).await {
        Ok(blocks) => blocks,
        Err(e) => {
            log::warn!("[{}] Tag query for #{} failed: {}", plugin, tag, e);
            Vec::new()
        }
    };

    if tagged.is_empty() {
        log::info!("[{}] Tag query returned nothing, scanning all blocks", plugin);
        tagged = match ctx.store().get_all_blocks().await {
            Ok(all) => all.into_iter().filter(|b| b.has_tag(tag)).collect(),
            Err(e) => {
                log::error!("[{}] Block scan failed: {}", plugin, e);
                Vec::new()
            }
        };
        log::debug!("[{}] Scan found {} tagged blocks", plugin, tagged.len());
    }

    let working: Vec<Block> = ctx
        .store()
        .working_set()
        .into_iter()
        .filter(|b| b.repr_type().map_or(false, |t| CARD_REPR_TYPES.contains(&t)))
        .collect();

    merge_by_id(tagged.into_iter().chain(working))
}

/// First position wins, last value wins
fn merge_by_id(blocks: impl IntoIterator<Item = Block>) -> Vec<Block> {
    let mut index: HashMap<DbId, usize> = HashMap::new();
    let mut merged: Vec<Block> = Vec::new();
    for block in blocks {
        match index.get(&block.id) {
            Some(&i) => merged[i] = block,
            None => {
                index.insert(block.id, merged.len());
                merged.push(block);
            }
        }
    }
    merged
}

pub async fn collect_review_cards(ctx: &SrsContext) -> Vec<ReviewCard> {
    collect_review_cards_at(ctx, Utc::now()).await
}

/// Every card in the store, expanded and with state attached
pub async fn collect_review_cards_at(ctx: &SrsContext, now: DateTime<Utc>) -> Vec<ReviewCard> {
    let blocks = collect_srs_blocks(ctx).await;
    let cards = convert_blocks(ctx, &blocks, now).await;
    log::info!(
        "[{}] Collected {} cards from {} blocks",
        ctx.plugin_name(),
        cards.len(),
        blocks.len()
    );
    cards
}

/// [`collect_review_cards_at`] bound to a dashboard's lifetime
pub async fn load_review_cards(
    ctx: &SrsContext,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> LoadOutcome<Vec<ReviewCard>> {
    run_cancellable(cancel, collect_review_cards_at(ctx, now)).await
}

async fn fetch_blocks(store: &dyn BlockStore, ids: &[DbId]) -> Vec<Block> {
    let results = join_all(ids.iter().map(|id| store.get_block(*id))).await;
    ids.iter()
        .zip(results)
        .filter_map(|(id, result)| match result {
            Ok(block) => block,
            Err(e) => {
                log::warn!("Could not fetch block {}: {}", id, e);
                None
            }
        })
        .collect()
}

pub fn is_query_block(block: &Block) -> bool {
    block.repr_type() == Some(QUERY_REPR_TYPE)
}

/// Cards among the results of a query block
pub async fn collect_cards_from_query_block(
    ctx: &SrsContext,
    block_id: DbId,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewCard>> {
    let Some(block) = ctx.store().get_block(block_id).await? else {
        return Ok(Vec::new());
    };
    let Some(query) = block.query_descriptor().filter(|_| is_query_block(&block)) else {
        log::warn!("[{}] Block {} is not a query block", ctx.plugin_name(), block_id);
        return Ok(Vec::new());
    };

    let results = match ctx.store().query_blocks(&query).await? {
        QueryResult::Blocks(blocks) => blocks,
        QueryResult::Ids(ids) => fetch_blocks(ctx.store(), &ids).await,
    };
    let tag = &ctx.config().card_tag;
    let cards: Vec<Block> = results.into_iter().filter(|b| b.has_tag(tag)).collect();
    Ok(convert_blocks(ctx, &cards, now).await)
}

/// All descendants of a block, depth first; the block itself is not included
pub async fn get_all_descendant_ids(store: &dyn BlockStore, block_id: DbId) -> Result<Vec<DbId>> {
    let Some(root) = store.get_block(block_id).await? else {
        return Ok(Vec::new());
    };

    let mut seen: HashSet<DbId> = HashSet::from([block_id]);
    let mut ids = Vec::new();
    let mut stack: Vec<DbId> = root.children.iter().rev().copied().collect();

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        ids.push(id);
        if let Some(child) = store.get_block(id).await? {
            stack.extend(child.children.iter().rev().copied());
        }
    }
    Ok(ids)
}

/// Cards anywhere below a block
pub async fn collect_cards_from_children(
    ctx: &SrsContext,
    block_id: DbId,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewCard>> {
    let ids = get_all_descendant_ids(ctx.store(), block_id).await?;
    let tag = &ctx.config().card_tag;
    let blocks: Vec<Block> = fetch_blocks(ctx.store(), &ids)
        .await
        .into_iter()
        .filter(|b| b.has_tag(tag))
        .collect();
    Ok(convert_blocks(ctx, &blocks, now).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{BlockProperty, BlockRef, ContentFragment, MemoryBlockStore, Repr};
    use crate::config::SrsConfig;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
    }

    fn create_test_context(blocks: Vec<Block>) -> (Arc<MemoryBlockStore>, SrsContext) {
        let store = Arc::new(MemoryBlockStore::with_blocks(blocks));
        let ctx = SrsContext::new(SrsConfig::default(), store.clone());
        (store, ctx)
    }

    fn tagged(id: DbId, text: &str, data: Vec<BlockProperty>) -> Block {
        let mut block = Block::new(id).with_text(text);
        block.content = vec![ContentFragment::text(text)];
        block.refs.push(BlockRef::tag(id * 10, id, 1000, "card").with_data(data));
        block
    }

    fn cloze(n: u32, text: &str) -> ContentFragment {
        ContentFragment {
            t: "orca-srs.cloze".to_string(),
            v: serde_json::Value::String(text.to_string()),
            cloze_number: Some(n),
        }
    }

    fn arrow() -> ContentFragment {
        ContentFragment {
            t: "orca-srs.direction".to_string(),
            v: serde_json::Value::Null,
            cloze_number: None,
        }
    }

    #[tokio::test]
    async fn test_cloze_expansion_one_card_per_distinct_blank() {
        let mut block = tagged(1, "The sun rises in the east #card", vec![]);
        block.content = vec![
            ContentFragment::text("The "),
            cloze(1, "sun"),
            cloze(2, "rises"),
            cloze(2, "in"),
            cloze(3, "east"),
        ];
        let (store, ctx) = create_test_context(vec![block.clone()]);

        let cards = convert_block_to_review_cards(&ctx, &block, fixed_now()).await.unwrap();

        assert_eq!(cards.len(), 3);
        for (card, n) in cards.iter().zip(1u32..) {
            assert_eq!(card.cloze_number, Some(n));
            assert_eq!(card.back, cloze_back_label(n));
            assert_eq!(card.front, "The sun rises in the east");
            assert!(card.is_new);
            assert_eq!(card.srs.due, day_start_in(fixed_now(), &Local, (n - 1) as u64));
        }
        assert!(has_state(&store.block(1).unwrap(), StateKey::Cloze(3)));
    }

    #[tokio::test]
    async fn test_cloze_keeps_existing_state() {
        let mut block = tagged(1, "x", vec![]);
        block.content = vec![cloze(1, "a"), cloze(2, "b")];
        let (store, ctx) = create_test_context(vec![block.clone()]);
        ctx.storage()
            .update_at(1, StateKey::Cloze(1), Grade::Easy, fixed_now() - Duration::days(1))
            .await
            .unwrap();

        let block = store.block(1).unwrap();
        let cards = convert_block_to_review_cards(&ctx, &block, fixed_now()).await.unwrap();
        assert!(!cards[0].is_new);
        assert_eq!(cards[0].srs.reps, 1);
        assert!(cards[1].is_new);
    }

    #[tokio::test]
    async fn test_cloze_without_blanks_is_skipped() {
        let block = tagged(1, "nothing hidden", vec![BlockProperty::text("type", "cloze")]);
        let (store, ctx) = create_test_context(vec![block.clone()]);

        let cards = convert_block_to_review_cards(&ctx, &block, fixed_now()).await.unwrap();
        assert!(cards.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_direction_yields_two_swapped_cards() {
        let mut block = tagged(1, "apple -> 苹果", vec![BlockProperty::text("deck", "English")]);
        block.content = vec![ContentFragment::text("apple "), arrow(), ContentFragment::text(" 苹果")];
        let (_store, ctx) = create_test_context(vec![block.clone()]);

        let cards = convert_block_to_review_cards(&ctx, &block, fixed_now()).await.unwrap();

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].direction, Some(Direction::Forward));
        assert_eq!((cards[0].front.as_str(), cards[0].back.as_str()), ("apple", "苹果"));
        assert_eq!(cards[1].direction, Some(Direction::Backward));
        assert_eq!((cards[1].front.as_str(), cards[1].back.as_str()), ("苹果", "apple"));
        assert_eq!(cards[1].srs.due, day_start_in(fixed_now(), &Local, 1));
        assert!(cards.iter().all(|c| c.deck == "English"));
    }

    #[tokio::test]
    async fn test_suspended_block_yields_nothing() {
        let mut block = tagged(1, "Q #card", vec![BlockProperty::text("status", "suspend")]);
        block.content = vec![cloze(1, "a")];
        let (store, ctx) = create_test_context(vec![block.clone()]);

        let cards = convert_block_to_review_cards(&ctx, &block, fixed_now()).await.unwrap();
        assert!(cards.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_basic_card_initialized_once() {
        let mut block = tagged(1, "Capital of France? #card", vec![]);
        block.children = vec![2];
        let (store, ctx) = create_test_context(vec![block, Block::new(2).with_text("Paris")]);

        let first = collect_review_cards_at(&ctx, fixed_now()).await;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].front, "Capital of France?");
        assert_eq!(first[0].back, "Paris");
        assert_eq!(first[0].deck, "Default");
        assert_eq!(store.write_count(), 1);

        let second = collect_review_cards_at(&ctx, fixed_now()).await;
        assert_eq!(second.len(), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_index_falls_back_to_scan_and_working_set() {
        let indexed = tagged(1, "Indexed #card", vec![]);
        let mut fresh = Block::new(2).with_text("Fresh card");
        fresh.repr = Some(Repr::new("srs.card"));
        let (store, ctx) = create_test_context(vec![indexed.clone()]);
        store.set_stale_tag_index(true);

        let mut edited = indexed.clone();
        edited.text = Some("Edited #card".to_string());
        edited.repr = Some(Repr::new("srs.card"));
        store.set_working_set(vec![fresh, edited]);

        // Position from the first sighting, content from the last
        let blocks = collect_srs_blocks(&ctx).await;
        assert_eq!(blocks.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(blocks[0].text.as_deref(), Some("Edited #card"));
    }

    #[tokio::test]
    async fn test_failing_block_does_not_abort_collection() {
        let good = tagged(1, "Good #card", vec![]);
        let bad = tagged(2, "Bad #card", vec![]);
        let (store, ctx) = create_test_context(vec![good, bad]);
        store.fail_writes_for(2);

        let cards = collect_review_cards_at(&ctx, fixed_now()).await;
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_descendants_and_children_collection() {
        let mut root = Block::new(1).with_text("Chapter");
        root.children = vec![2, 3];
        let mut section = Block::new(2).with_text("Section");
        section.children = vec![4];
        let card_a = tagged(3, "A #card", vec![]);
        let card_b = tagged(4, "B #card", vec![]);
        let (_store, ctx) = create_test_context(vec![root, section, card_a, card_b]);

        let ids = get_all_descendant_ids(ctx.store(), 1).await.unwrap();
        assert_eq!(ids, vec![2, 4, 3]);

        let cards = collect_cards_from_children(&ctx, 1, fixed_now()).await.unwrap();
        let mut card_ids: Vec<DbId> = cards.iter().map(|c| c.id).collect();
        card_ids.sort();
        assert_eq!(card_ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_query_block_results() {
        let query = serde_json::json!({"kind": 100, "conditions": []});
        let mut query_block = Block::new(1);
        query_block.repr = Some(Repr {
            q: Some(query.clone()),
            ..Repr::new("query")
        });
        let (store, ctx) = create_test_context(vec![
            query_block,
            tagged(2, "In results #card", vec![]),
            Block::new(3).with_text("Untagged result"),
        ]);
        store.set_query_result(&query, vec![2, 3]);

        let cards = collect_cards_from_query_block(&ctx, 1, fixed_now()).await.unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].id, 2);

        let not_query = collect_cards_from_query_block(&ctx, 2, fixed_now()).await.unwrap();
        assert!(not_query.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_load_leaves_new_cards_uninitialized() {
        let (store, ctx) = create_test_context(vec![tagged(1, "What is Rust? #card", vec![])]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = load_review_cards(&ctx, fixed_now(), &cancel).await;
        assert!(matches!(outcome, LoadOutcome::Cancelled));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_load_completes_with_live_token() {
        let (_store, ctx) = create_test_context(vec![tagged(1, "What is Rust? #card", vec![])]);

        let outcome = load_review_cards(&ctx, fixed_now(), &CancellationToken::new()).await;
        match outcome {
            LoadOutcome::Completed(cards) => {
                assert_eq!(cards.len(), 1);
                assert!(cards[0].is_new);
            }
            LoadOutcome::Cancelled => panic!("load was not cancelled"),
        }
    }
}
