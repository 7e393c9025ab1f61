//! Topic breadcrumb for the reading panel

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::collector::IrCardType;
use super::storage::Result;
use crate::blocks::content::remove_hash_tags;
use crate::blocks::{BlockStore, DbId};
use crate::tasks::{run_cancellable, LoadOutcome};

const UNTITLED: &str = "(untitled)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbItem {
    pub id: DbId,
    pub text: String,
}

/// Walk from `block_id` up through its parents, stopping at the enclosing
/// topic or after `max_depth` blocks. The path runs from the outermost block
/// down to `block_id`.
pub async fn topic_path(
    store: &dyn BlockStore,
    tag: &str,
    block_id: DbId,
    max_depth: usize,
) -> Result<Vec<BreadcrumbItem>> {
    let mut path = Vec::new();
    let mut current = Some(block_id);

    while let Some(id) = current {
        if path.len() >= max_depth {
            break;
        }
        let Some(block) = store.get_block(id).await? else {
            break;
        };

        let text = block
            .text
            .as_deref()
            .map(remove_hash_tags)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        path.push(BreadcrumbItem { id: block.id, text });

        if IrCardType::of_block(&block, tag) == Some(IrCardType::Topic) {
            break;
        }
        current = block.parent;
    }

    path.reverse();
    Ok(path)
}

/// [`topic_path`] bound to a panel's lifetime
pub async fn find_topic_path(
    store: &dyn BlockStore,
    tag: &str,
    block_id: DbId,
    max_depth: usize,
    cancel: &CancellationToken,
) -> LoadOutcome<Result<Vec<BreadcrumbItem>>> {
    run_cancellable(cancel, topic_path(store, tag, block_id, max_depth)).await
}
