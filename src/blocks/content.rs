//! Content helpers shared by the card and reading collectors

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use super::models::{Block, ContentFragment};
use super::store::{BlockStore, Result};

pub const NO_QUESTION: &str = "(no question)";
pub const NO_ANSWER: &str = "(no answer)";

fn hash_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#[\w/\u{4e00}-\u{9fa5}]+").unwrap())
}

/// Strip `#tag` tokens from display text
pub fn remove_hash_tags(text: &str) -> String {
    hash_tag_regex().replace_all(text, "").trim().to_string()
}

/// Fragment type of inline cloze markers for a plugin namespace
pub fn cloze_fragment_type(plugin_name: &str) -> String {
    format!("{}.cloze", plugin_name)
}

/// Fragment type of the direction arrow for a plugin namespace
pub fn direction_fragment_type(plugin_name: &str) -> String {
    format!("{}.direction", plugin_name)
}

/// Blank numbers of the cloze fragments in `content`, in encounter order
///
/// Duplicates are yielded as they appear. A marker without a number counts
/// as blank 1.
pub fn cloze_numbers<'a>(
    content: &'a [ContentFragment],
    fragment_type: &'a str,
) -> impl Iterator<Item = u32> + 'a {
    content
        .iter()
        .filter(move |f| f.t == fragment_type)
        .map(|f| f.cloze_number.filter(|n| *n > 0).unwrap_or(1))
}

/// Distinct blank numbers, ascending
pub fn distinct_cloze_numbers(content: &[ContentFragment], fragment_type: &str) -> BTreeSet<u32> {
    cloze_numbers(content, fragment_type).collect()
}

/// The two sides of a direction card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionInfo {
    pub left_text: String,
    pub right_text: String,
}

fn fragment_text(fragments: &[ContentFragment]) -> String {
    let joined: String = fragments
        .iter()
        .filter_map(|f| f.text_value())
        .collect::<Vec<_>>()
        .join("");
    remove_hash_tags(&joined)
}

/// Split content around the direction arrow; `None` without an arrow
pub fn direction_info(content: &[ContentFragment], fragment_type: &str) -> Option<DirectionInfo> {
    let arrow = content.iter().position(|f| f.t == fragment_type)?;
    Some(DirectionInfo {
        left_text: fragment_text(&content[..arrow]),
        right_text: fragment_text(&content[arrow + 1..]),
    })
}

/// A tag-data value as a single string; multi-valued data yields its first element
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Array(items) => items.first().and_then(|first| match first {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }),
        _ => None,
    }
}

/// The `type` field from the block's tag data
pub fn extract_card_type(block: &Block, tag: &str) -> Option<String> {
    block
        .tag_ref(tag)
        .and_then(|r| r.data_value("type"))
        .and_then(scalar_text)
}

/// Deck label from the tag data, falling back to `default_deck`
pub fn extract_deck_name(block: &Block, tag: &str, default_deck: &str) -> String {
    block
        .tag_ref(tag)
        .and_then(|r| r.data_value("deck"))
        .and_then(scalar_text)
        .unwrap_or_else(|| default_deck.to_string())
}

/// Whether the tag data marks the card as suspended
pub fn is_suspended(block: &Block, tag: &str) -> bool {
    block
        .tag_ref(tag)
        .and_then(|r| r.data_value("status"))
        .and_then(scalar_text)
        .map_or(false, |status| status == "suspend")
}

/// Text of the block's first child, or the no-answer placeholder
pub async fn first_child_text(block: &Block, store: &dyn BlockStore) -> Result<String> {
    let Some(first_id) = block.children.first() else {
        return Ok(NO_ANSWER.to_string());
    };
    let child = store.get_block(*first_id).await?;
    Ok(child
        .and_then(|c| c.text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_ANSWER.to_string()))
}

/// Question and answer text of a basic card, tags stripped
pub async fn resolve_front_back(block: &Block, store: &dyn BlockStore) -> Result<(String, String)> {
    let repr = block.repr.as_ref();
    let front_raw = repr
        .and_then(|r| r.front.clone())
        .or_else(|| block.text.clone())
        .unwrap_or_else(|| NO_QUESTION.to_string());
    let back_raw = match repr.and_then(|r| r.back.clone()) {
        Some(back) => back,
        None => first_child_text(block, store).await?,
    };
    Ok((remove_hash_tags(&front_raw), remove_hash_tags(&back_raw)))
}
