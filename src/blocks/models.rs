//! Data models for the host editor's block store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Block identifier as used by the host store
pub type DbId = i64;

/// Reference type the host uses for tag references
pub const REF_TYPE_TAG: i32 = 2;

/// Property value type, numbered the way the host serializes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PropType {
    Json,
    Text,
    BlockRefs,
    Number,
    Boolean,
    DateTime,
    TextChoices,
}

impl From<PropType> for u8 {
    fn from(kind: PropType) -> Self {
        match kind {
            PropType::Json => 0,
            PropType::Text => 1,
            PropType::BlockRefs => 2,
            PropType::Number => 3,
            PropType::Boolean => 4,
            PropType::DateTime => 5,
            PropType::TextChoices => 6,
        }
    }
}

impl TryFrom<u8> for PropType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PropType::Json),
            1 => Ok(PropType::Text),
            2 => Ok(PropType::BlockRefs),
            3 => Ok(PropType::Number),
            4 => Ok(PropType::Boolean),
            5 => Ok(PropType::DateTime),
            6 => Ok(PropType::TextChoices),
            other => Err(format!("unknown property type {}", other)),
        }
    }
}

/// A named property stored on a block (or on a tag reference)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PropType,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl BlockProperty {
    pub fn new(name: impl Into<String>, kind: PropType, value: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropType::Text, serde_json::Value::String(value.into()))
    }

    pub fn number(name: impl Into<String>, value: f64) -> Self {
        let value = serde_json::Number::from_f64(value)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null);
        Self::new(name, PropType::Number, value)
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, PropType::Boolean, serde_json::Value::Bool(value))
    }

    /// Datetime properties are written as RFC 3339 strings; `None` clears the value
    pub fn datetime(name: impl Into<String>, value: Option<DateTime<Utc>>) -> Self {
        let value = value
            .map(|d| serde_json::Value::String(d.to_rfc3339()))
            .unwrap_or(serde_json::Value::Null);
        Self::new(name, PropType::DateTime, value)
    }
}

/// A reference from one block to another; tag references carry tag-scoped data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRef {
    pub id: DbId,
    pub from: DbId,
    pub to: DbId,
    #[serde(rename = "type")]
    pub ref_type: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub data: Vec<BlockProperty>,
}

impl BlockRef {
    /// Create a tag reference from `from` to the tag block `to`
    pub fn tag(id: DbId, from: DbId, to: DbId, alias: impl Into<String>) -> Self {
        Self {
            id,
            from,
            to,
            ref_type: REF_TYPE_TAG,
            alias: Some(alias.into()),
            data: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Vec<BlockProperty>) -> Self {
        self.data = data;
        self
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.ref_type == REF_TYPE_TAG
            && self
                .alias
                .as_deref()
                .map_or(false, |alias| alias.eq_ignore_ascii_case(tag))
    }

    /// Look up a tag-scoped data field by name
    pub fn data_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.iter().find(|d| d.name == name).map(|d| &d.value)
    }
}

/// An inline content fragment (`t` is the fragment type, `v` its value)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFragment {
    pub t: String,
    #[serde(default)]
    pub v: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloze_number: Option<u32>,
}

impl ContentFragment {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            t: "t".to_string(),
            v: serde_json::Value::String(value.into()),
            cloze_number: None,
        }
    }

    pub fn text_value(&self) -> Option<&str> {
        self.v.as_str()
    }
}

/// Cached block representation the host keeps alongside a block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Repr {
    #[serde(rename = "type")]
    pub repr_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    /// Query descriptor for query blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<serde_json::Value>,
}

impl Repr {
    pub fn new(repr_type: impl Into<String>) -> Self {
        Self {
            repr_type: repr_type.into(),
            ..Default::default()
        }
    }
}

/// A block from the host store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: DbId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<DbId>,
    #[serde(default)]
    pub children: Vec<DbId>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub properties: Vec<BlockProperty>,
    #[serde(default)]
    pub refs: Vec<BlockRef>,
    #[serde(default, rename = "_repr", skip_serializing_if = "Option::is_none")]
    pub repr: Option<Repr>,
}

impl Block {
    pub fn new(id: DbId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&BlockProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.property(name).map(|p| &p.value)
    }

    pub fn has_property_prefix(&self, prefix: &str) -> bool {
        self.properties.iter().any(|p| p.name.starts_with(prefix))
    }

    /// First tag reference matching `tag` (case-insensitive alias match)
    pub fn tag_ref(&self, tag: &str) -> Option<&BlockRef> {
        self.refs.iter().find(|r| r.is_tag(tag))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_ref(tag).is_some()
    }

    /// Representation type, from the cached repr or a `_repr` JSON property
    pub fn repr_type(&self) -> Option<&str> {
        if let Some(repr) = &self.repr {
            return Some(repr.repr_type.as_str());
        }
        self.property_value("_repr")
            .and_then(|v| v.get("type"))
            .and_then(|v| v.as_str())
    }

    /// Query descriptor of a query block
    pub fn query_descriptor(&self) -> Option<serde_json::Value> {
        if let Some(q) = self.repr.as_ref().and_then(|r| r.q.clone()) {
            return Some(q);
        }
        self.property_value("_repr").and_then(|v| v.get("q")).cloned()
    }
}

/// A batched property write, as accepted by the store's transactional command
pub type PropertyWrite = BlockProperty;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop_type_serializes_as_host_number() {
        let prop = BlockProperty::number("srs.reps", 3.0);
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(json["type"], 3);

        let parsed: BlockProperty =
            serde_json::from_value(serde_json::json!({"name": "x", "type": 5, "value": null}))
                .unwrap();
        assert_eq!(parsed.kind, PropType::DateTime);
    }

    #[test]
    fn test_tag_ref_matches_case_insensitively() {
        let mut block = Block::new(1);
        block.refs.push(BlockRef::tag(10, 1, 100, "Card"));

        assert!(block.has_tag("card"));
        assert!(!block.has_tag("topic"));
    }

    #[test]
    fn test_repr_type_from_property() {
        let mut block = Block::new(1);
        block.properties.push(BlockProperty::new(
            "_repr",
            PropType::Json,
            serde_json::json!({"type": "query", "q": {"kind": 1}}),
        ));

        assert_eq!(block.repr_type(), Some("query"));
        assert_eq!(block.query_descriptor(), Some(serde_json::json!({"kind": 1})));
    }
}
