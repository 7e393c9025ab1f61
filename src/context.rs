//! Explicit plugin context
//!
//! Built when the plugin is activated and dropped when it is deactivated.
//! Every entry point takes it instead of reading global state.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::blocks::BlockStore;
use crate::config::SrsConfig;
use crate::events::{EventBus, SrsEvent};
use crate::flashcards::storage::SrsStorage;
use crate::reading::IrStorage;
use crate::sessions::SessionBlocks;

pub struct SrsContext {
    config: SrsConfig,
    store: Arc<dyn BlockStore>,
    storage: SrsStorage,
    reading: IrStorage,
    sessions: SessionBlocks,
    events: EventBus,
}

impl SrsContext {
    pub fn new(config: SrsConfig, store: Arc<dyn BlockStore>) -> Self {
        let storage = SrsStorage::new(store.clone(), config.scheduler.clone());
        let reading = IrStorage::new(store.clone(), config.reading.clone(), config.card_tag.clone());
        let sessions = SessionBlocks::new(store.clone(), config.plugin_name.clone());
        log::info!("[{}] SRS context ready (tag #{})", config.plugin_name, config.card_tag);

        Self {
            config,
            store,
            storage,
            reading,
            sessions,
            events: EventBus::default(),
        }
    }

    pub fn config(&self) -> &SrsConfig {
        &self.config
    }

    pub fn plugin_name(&self) -> &str {
        &self.config.plugin_name
    }

    pub fn store(&self) -> &dyn BlockStore {
        self.store.as_ref()
    }

    pub fn storage(&self) -> &SrsStorage {
        &self.storage
    }

    pub fn reading(&self) -> &IrStorage {
        &self.reading
    }

    pub fn sessions(&self) -> &SessionBlocks {
        &self.sessions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SrsEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SrsEvent) {
        self.events.emit(event);
    }

    /// Release session blocks; call on deactivation
    pub async fn shutdown(&self) {
        if let Err(e) = self.sessions.cleanup_all().await {
            log::warn!("[{}] Session cleanup failed: {}", self.plugin_name(), e);
        }
        log::info!("[{}] SRS context shut down", self.plugin_name());
    }
}
