//! Block store access for the SRS engine
//!
//! The host editor owns blocks and their properties. This module models the
//! parts of a block the scheduler reads, the async store interface it writes
//! through, and the content helpers shared by the card and reading collectors.

pub mod cache;
pub mod content;
pub mod memory;
pub mod models;
pub mod store;

pub use cache::KeyedCache;
pub use memory::MemoryBlockStore;
pub use models::*;
pub use store::{BlockStore, BulkUpdateResult, FailedUpdate, QueryResult, StoreError};
