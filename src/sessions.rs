//! Special blocks that host review panels
//!
//! Each kind is reused across launches: the id is cached in memory, then
//! looked up in plugin data, and only created when neither resolves to a
//! live block.

use std::sync::Arc;

use crate::blocks::store::Result;
use crate::blocks::{BlockProperty, BlockStore, DbId, KeyedCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Review,
    FlashcardHome,
    Reading,
}

impl SessionKind {
    pub const ALL: [SessionKind; 3] = [
        SessionKind::Review,
        SessionKind::FlashcardHome,
        SessionKind::Reading,
    ];

    /// Plugin data key holding the block id
    pub fn storage_key(self) -> &'static str {
        match self {
            SessionKind::Review => "reviewSessionBlockId",
            SessionKind::FlashcardHome => "flashcardHomeBlockId",
            SessionKind::Reading => "incrementalReadingSessionBlockId",
        }
    }

    pub fn repr_type(self) -> &'static str {
        match self {
            SessionKind::Review => "srs.review-session",
            SessionKind::FlashcardHome => "srs.flashcard-home",
            SessionKind::Reading => "srs.ir-session",
        }
    }

    fn marker_properties(self, plugin_name: &str) -> Vec<BlockProperty> {
        let (marker, owner) = match self {
            SessionKind::Review => ("srs.isReviewSessionBlock", "srs.pluginName"),
            SessionKind::FlashcardHome => ("srs.isFlashcardHomeBlock", "srs.pluginName"),
            SessionKind::Reading => ("ir.isSessionBlock", "ir.pluginName"),
        };
        vec![
            BlockProperty::boolean(marker, true),
            BlockProperty::text(owner, plugin_name),
        ]
    }

    fn title(self, plugin_name: &str) -> String {
        match self {
            SessionKind::Review => format!("[SRS Review Session - {}]", plugin_name),
            SessionKind::FlashcardHome => format!("[Flashcard Home - {}]", plugin_name),
            SessionKind::Reading => format!("[Incremental Reading Session - {}]", plugin_name),
        }
    }
}

pub struct SessionBlocks {
    store: Arc<dyn BlockStore>,
    plugin_name: String,
    ids: KeyedCache<SessionKind, DbId>,
}

impl SessionBlocks {
    pub fn new(store: Arc<dyn BlockStore>, plugin_name: impl Into<String>) -> Self {
        Self {
            store,
            plugin_name: plugin_name.into(),
            ids: KeyedCache::new(),
        }
    }

    async fn exists(&self, id: DbId) -> bool {
        match self.store.get_block(id).await {
            Ok(block) => block.is_some(),
            Err(e) => {
                log::warn!("[{}] Could not fetch session block {}: {}", self.plugin_name, id, e);
                false
            }
        }
    }

    /// Id of the session block of `kind`, creating it if needed
    pub async fn get_or_create(&self, kind: SessionKind) -> Result<DbId> {
        if let Some(id) = self.ids.get(&kind) {
            if self.exists(id).await {
                return Ok(id);
            }
            self.ids.invalidate(&kind);
        }

        let stored = self
            .store
            .get_plugin_data(&self.plugin_name, kind.storage_key())
            .await?
            .and_then(|v| v.as_i64());
        if let Some(id) = stored {
            if self.exists(id).await {
                self.ids.insert(kind, id);
                return Ok(id);
            }
        }

        let id = self
            .store
            .insert_block(&kind.title(&self.plugin_name), kind.repr_type())
            .await?;
        self.store
            .set_properties(id, kind.marker_properties(&self.plugin_name))
            .await?;
        self.store
            .set_plugin_data(&self.plugin_name, kind.storage_key(), serde_json::json!(id))
            .await?;
        self.ids.insert(kind, id);

        log::info!("[{}] Created {} block #{}", self.plugin_name, kind.repr_type(), id);
        Ok(id)
    }

    /// Forget the block of `kind`; the block itself is left in place
    pub async fn cleanup(&self, kind: SessionKind) -> Result<()> {
        self.ids.invalidate(&kind);
        self.store
            .remove_plugin_data(&self.plugin_name, kind.storage_key())
            .await
    }

    pub async fn cleanup_all(&self) -> Result<()> {
        for kind in SessionKind::ALL {
            self.cleanup(kind).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, MemoryBlockStore};

    fn create_test_sessions() -> (Arc<MemoryBlockStore>, SessionBlocks) {
        let store = Arc::new(MemoryBlockStore::new());
        let sessions = SessionBlocks::new(store.clone(), "orca-srs");
        (store, sessions)
    }

    #[tokio::test]
    async fn test_creates_once_and_reuses() {
        let (store, sessions) = create_test_sessions();

        let first = sessions.get_or_create(SessionKind::FlashcardHome).await.unwrap();
        let second = sessions.get_or_create(SessionKind::FlashcardHome).await.unwrap();
        assert_eq!(first, second);

        let block = store.block(first).unwrap();
        assert_eq!(block.repr_type(), Some("srs.flashcard-home"));
        assert_eq!(
            block.property_value("srs.isFlashcardHomeBlock"),
            Some(&serde_json::json!(true))
        );
    }

    #[tokio::test]
    async fn test_reuses_id_from_plugin_data() {
        let (store, _) = create_test_sessions();
        store.insert(Block::new(40));
        store
            .set_plugin_data("orca-srs", "incrementalReadingSessionBlockId", serde_json::json!(40))
            .await
            .unwrap();

        let sessions = SessionBlocks::new(store.clone(), "orca-srs");
        assert_eq!(sessions.get_or_create(SessionKind::Reading).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_stale_plugin_data_creates_new_block() {
        let (store, sessions) = create_test_sessions();
        store
            .set_plugin_data("orca-srs", "reviewSessionBlockId", serde_json::json!(999))
            .await
            .unwrap();

        let id = sessions.get_or_create(SessionKind::Review).await.unwrap();
        assert_ne!(id, 999);
        assert_eq!(
            store.get_plugin_data("orca-srs", "reviewSessionBlockId").await.unwrap(),
            Some(serde_json::json!(id))
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_plugin_data() {
        let (store, sessions) = create_test_sessions();
        sessions.get_or_create(SessionKind::Review).await.unwrap();
        sessions.cleanup_all().await.unwrap();

        assert_eq!(
            store.get_plugin_data("orca-srs", "reviewSessionBlockId").await.unwrap(),
            None
        );
    }
}
