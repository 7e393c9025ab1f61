//! In-process block store
//!
//! Backs the CLI (optionally persisted to a JSON file) and the test suites.
//! File layout:
//! ```text
//! {
//!   "blocks": [ { "id": 1, "text": "...", "properties": [...], "refs": [...] } ],
//!   "pluginData": { "orca-srs": { "flashcardHomeBlockId": 42 } }
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{Block, BlockProperty, ContentFragment, DbId, PropertyWrite, Repr};
use super::store::{BlockStore, QueryResult, Result, StoreError};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    #[serde(default)]
    blocks: Vec<Block>,
    #[serde(default)]
    plugin_data: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<DbId, Block>,
    plugin_data: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    working_set: Vec<Block>,
    queries: HashMap<String, Vec<DbId>>,
    failing_writes: HashSet<DbId>,
    stale_tag_index: bool,
    write_count: usize,
}

/// Block store held entirely in memory
#[derive(Default)]
pub struct MemoryBlockStore {
    inner: Mutex<Inner>,
    persist_path: Option<PathBuf>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: impl IntoIterator<Item = Block>) -> Self {
        let store = Self::new();
        for block in blocks {
            store.insert(block);
        }
        store
    }

    /// Load a store from a JSON file; every write is saved back to it
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file: StoreFile = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            StoreFile::default()
        };

        let inner = Inner {
            blocks: file.blocks.into_iter().map(|b| (b.id, b)).collect(),
            plugin_data: file.plugin_data,
            ..Default::default()
        };

        Ok(Self {
            inner: Mutex::new(inner),
            persist_path: Some(path),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, inner: &Inner) -> Result<()> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let file = StoreFile {
            blocks: inner.blocks.values().cloned().collect(),
            plugin_data: inner.plugin_data.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Swap in the edited block and save; the previous version is restored if saving fails
    fn commit_block(&self, inner: &mut Inner, block: Block) -> Result<()> {
        let id = block.id;
        let previous = inner.blocks.insert(id, block);
        if let Err(e) = self.persist(inner) {
            match previous {
                Some(previous) => inner.blocks.insert(id, previous),
                None => inner.blocks.remove(&id),
            };
            return Err(e);
        }
        inner.write_count += 1;
        Ok(())
    }

    fn commit_plugin_data(
        &self,
        inner: &mut Inner,
        edit: impl FnOnce(&mut BTreeMap<String, BTreeMap<String, serde_json::Value>>),
    ) -> Result<()> {
        let previous = inner.plugin_data.clone();
        edit(&mut inner.plugin_data);
        if let Err(e) = self.persist(inner) {
            inner.plugin_data = previous;
            return Err(e);
        }
        Ok(())
    }

    fn check_writable(inner: &Inner, id: DbId) -> Result<()> {
        if inner.failing_writes.contains(&id) {
            return Err(StoreError::Rejected {
                id,
                message: "block does not exist".to_string(),
            });
        }
        Ok(())
    }

    /// Insert or replace a block
    pub fn insert(&self, block: Block) {
        self.lock().blocks.insert(block.id, block);
    }

    pub fn block(&self, id: DbId) -> Option<Block> {
        self.lock().blocks.get(&id).cloned()
    }

    /// Replace the editor working-set snapshot
    pub fn set_working_set(&self, blocks: Vec<Block>) {
        self.lock().working_set = blocks;
    }

    /// Register the ids a query descriptor resolves to
    pub fn set_query_result(&self, query: &serde_json::Value, ids: Vec<DbId>) {
        self.lock().queries.insert(query.to_string(), ids);
    }

    /// Make every write against `id` fail
    pub fn fail_writes_for(&self, id: DbId) {
        self.lock().failing_writes.insert(id);
    }

    /// Simulate a tag index that has not caught up with the working session
    pub fn set_stale_tag_index(&self, stale: bool) {
        self.lock().stale_tag_index = stale;
    }

    /// Number of successful write commands so far
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn get_block(&self, id: DbId) -> Result<Option<Block>> {
        Ok(self.lock().blocks.get(&id).cloned())
    }

    async fn get_blocks_with_tag(&self, tag: &str) -> Result<Vec<Block>> {
        let inner = self.lock();
        if inner.stale_tag_index {
            return Ok(Vec::new());
        }
        Ok(inner
            .blocks
            .values()
            .filter(|b| b.has_tag(tag))
            .cloned()
            .collect())
    }

    async fn get_all_blocks(&self) -> Result<Vec<Block>> {
        Ok(self.lock().blocks.values().cloned().collect())
    }

    async fn query_blocks(&self, query: &serde_json::Value) -> Result<QueryResult> {
        let ids = self
            .lock()
            .queries
            .get(&query.to_string())
            .cloned()
            .unwrap_or_default();
        Ok(QueryResult::Ids(ids))
    }

    fn working_set(&self) -> Vec<Block> {
        self.lock().working_set.clone()
    }

    async fn set_properties(&self, id: DbId, properties: Vec<PropertyWrite>) -> Result<()> {
        let mut inner = self.lock();
        Self::check_writable(&inner, id)?;
        let mut block = inner.blocks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;

        for prop in properties {
            match block.properties.iter_mut().find(|p| p.name == prop.name) {
                Some(existing) => *existing = prop,
                None => block.properties.push(prop),
            }
        }

        self.commit_block(&mut inner, block)
    }

    async fn delete_properties(&self, id: DbId, names: &[String]) -> Result<()> {
        let mut inner = self.lock();
        Self::check_writable(&inner, id)?;
        let mut block = inner.blocks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        block.properties.retain(|p| !names.contains(&p.name));

        self.commit_block(&mut inner, block)
    }

    async fn set_ref_data(&self, id: DbId, tag: &str, data: Vec<BlockProperty>) -> Result<()> {
        let mut inner = self.lock();
        Self::check_writable(&inner, id)?;
        let mut block = inner.blocks.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let tag_ref = block
            .refs
            .iter_mut()
            .find(|r| r.is_tag(tag))
            .ok_or_else(|| StoreError::Rejected {
                id,
                message: format!("block has no #{} tag", tag),
            })?;

        for item in data {
            match tag_ref.data.iter_mut().find(|d| d.name == item.name) {
                Some(existing) => *existing = item,
                None => tag_ref.data.push(item),
            }
        }

        self.commit_block(&mut inner, block)
    }

    async fn insert_block(&self, text: &str, repr_type: &str) -> Result<DbId> {
        let mut inner = self.lock();
        let id = inner.blocks.keys().next_back().copied().unwrap_or(0) + 1;
        let mut block = Block::new(id).with_text(text);
        block.content.push(ContentFragment::text(text));
        block.repr = Some(Repr::new(repr_type));
        self.commit_block(&mut inner, block)?;
        Ok(id)
    }

    async fn get_plugin_data(&self, plugin: &str, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self
            .lock()
            .plugin_data
            .get(plugin)
            .and_then(|data| data.get(key))
            .cloned())
    }

    async fn set_plugin_data(
        &self,
        plugin: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.lock();
        self.commit_plugin_data(&mut inner, |data| {
            data.entry(plugin.to_string())
                .or_default()
                .insert(key.to_string(), value);
        })
    }

    async fn remove_plugin_data(&self, plugin: &str, key: &str) -> Result<()> {
        let mut inner = self.lock();
        self.commit_plugin_data(&mut inner, |data| {
            if let Some(entries) = data.get_mut(plugin) {
                entries.remove(key);
            }
        })
    }
}
