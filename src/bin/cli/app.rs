use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use nous_srs::blocks::MemoryBlockStore;
use nous_srs::{SrsConfig, SrsContext};

const STORE_FILE: &str = "srs-store.json";

/// Shared application state for CLI commands
pub struct App {
    pub ctx: SrsContext,
}

impl App {
    /// Open the block store and config, falling back to the default locations
    pub fn new(store_path: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let store_path = match store_path {
            Some(path) => path.to_path_buf(),
            None => dirs::data_local_dir()
                .context("Failed to get data directory")?
                .join("nous")
                .join(STORE_FILE),
        };

        let config = match config_path {
            Some(path) => SrsConfig::load(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => match SrsConfig::default_path() {
                Some(path) => SrsConfig::load_or_default(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?,
                None => SrsConfig::default(),
            },
        };

        if let Some(parent) = store_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let store = MemoryBlockStore::open(&store_path)
            .with_context(|| format!("Failed to open block store {}", store_path.display()))?;
        log::debug!("Opened block store {}", store_path.display());

        Ok(Self {
            ctx: SrsContext::new(config, Arc::new(store)),
        })
    }
}
