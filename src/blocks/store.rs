//! The narrow interface this crate needs from the host block store
//!
//! Reads may suspend; writes go through the host's transactional command so
//! concurrent edits to one block are serialized by the host, not by us.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Block, BlockProperty, DbId, PropertyWrite};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store rejected command on block {id}: {message}")]
    Rejected { id: DbId, message: String },

    #[error("Block not found: {0}")]
    NotFound(DbId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One item of a batch that the store rejected
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FailedUpdate {
    pub id: DbId,
    pub error: String,
}

/// Outcome of a batch of independent per-block writes
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct BulkUpdateResult {
    pub success: Vec<DbId>,
    pub failed: Vec<FailedUpdate>,
}

impl BulkUpdateResult {
    /// Record one item's result
    pub fn record<T, E: std::fmt::Display>(&mut self, id: DbId, result: std::result::Result<T, E>) {
        match result {
            Ok(_) => self.success.push(id),
            Err(e) => self.failed.push(FailedUpdate {
                id,
                error: e.to_string(),
            }),
        }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of running a query block's descriptor
#[derive(Debug, Clone)]
pub enum QueryResult {
    Blocks(Vec<Block>),
    Ids(Vec<DbId>),
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Fetch a block by id; `None` when it does not exist
    async fn get_block(&self, id: DbId) -> Result<Option<Block>>;

    /// Blocks indexed under the given tag
    async fn get_blocks_with_tag(&self, tag: &str) -> Result<Vec<Block>>;

    /// Every block in the store, for the full-scan fallback
    async fn get_all_blocks(&self) -> Result<Vec<Block>>;

    /// Run a query descriptor
    async fn query_blocks(&self, query: &serde_json::Value) -> Result<QueryResult>;

    /// Blocks currently loaded in the editor's in-memory working set
    fn working_set(&self) -> Vec<Block>;

    /// Transactional batched property write
    async fn set_properties(&self, id: DbId, properties: Vec<PropertyWrite>) -> Result<()>;

    async fn delete_properties(&self, id: DbId, names: &[String]) -> Result<()>;

    /// Merge tag-scoped data into the block's reference to `tag`
    async fn set_ref_data(&self, id: DbId, tag: &str, data: Vec<BlockProperty>) -> Result<()>;

    /// Insert a standalone block with the given text and repr type
    async fn insert_block(&self, text: &str, repr_type: &str) -> Result<DbId>;

    async fn get_plugin_data(&self, plugin: &str, key: &str) -> Result<Option<serde_json::Value>>;

    async fn set_plugin_data(&self, plugin: &str, key: &str, value: serde_json::Value)
        -> Result<()>;

    async fn remove_plugin_data(&self, plugin: &str, key: &str) -> Result<()>;
}
