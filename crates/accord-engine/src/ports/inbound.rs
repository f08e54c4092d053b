//! Driving port: what clients may ask of a node.

use std::sync::Arc;
use std::time::Duration;

use accord_types::{Approvable, HashId, ItemResult};
use async_trait::async_trait;

use crate::domain::NodeError;

/// Client-facing operations of the approval engine.
#[async_trait]
pub trait ItemApi: Send + Sync {
    /// Check or register an item, non-blocking.
    ///
    /// If the item is new and eligible, an election starts immediately and
    /// the returned result reflects the pending record. If it is already
    /// being processed or already decided, the current (or last known)
    /// result is returned instead.
    async fn register_item(&self, item: Arc<dyn Approvable>) -> Result<ItemResult, NodeError>;

    /// Last known state of an item. Never starts an election; unknown ids
    /// yield `UNDEFINED`.
    async fn check_item(&self, item_id: &HashId) -> Result<ItemResult, NodeError>;

    /// Block until the item's election finishes, up to `timeout`, then
    /// return its result. Items not under election return immediately.
    /// Intended for tests and tooling, not the client path.
    async fn wait_item(
        &self,
        item_id: &HashId,
        timeout: Duration,
    ) -> Result<ItemResult, NodeError>;
}
