//! Driven ports: the transport and the persistent ledger.

use std::sync::Arc;
use std::time::Duration;

use accord_types::{Approvable, HashId, NodeInfo, StateRecord};
use async_trait::async_trait;

use crate::domain::{LedgerError, NetworkError};
use crate::events::ItemNotification;

/// Callback invoked for every inbound notification.
pub type NotificationHandler = Box<dyn Fn(ItemNotification) + Send + Sync>;

/// Opaque peer-to-peer transport.
///
/// Delivery is fire-and-forget and unordered; the engine's poll loop is the
/// recovery mechanism against loss. `get_item` is the only suspending
/// operation and must respect its timeout.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    /// Register the single inbound-notification callback.
    fn subscribe(&self, handler: NotificationHandler);

    /// Unicast to one peer.
    fn deliver(&self, to: &NodeInfo, notification: ItemNotification);

    /// Deliver to every peer except `origin`.
    fn broadcast(&self, origin: &NodeInfo, notification: ItemNotification);

    /// Current peers, the local node included.
    fn peers(&self) -> Vec<NodeInfo>;

    /// Fetch an item body from a peer. `Ok(None)` means the peer has no
    /// copy; errors cover timeout and transport failure.
    async fn get_item(
        &self,
        item_id: &HashId,
        source: &NodeInfo,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn Approvable>>, NetworkError>;
}

/// Persistent store of state records.
///
/// Row-level conditional locking (`lock_to_revoke`, `create_output_lock`)
/// is what prevents double-spend across concurrent elections; its
/// atomicity is the implementation's responsibility. Records are value
/// snapshots: mutate locally, persist with `save`.
pub trait Ledger: Send + Sync + 'static {
    /// The record for `id`, or `None` if the ledger has never seen it.
    fn get_record(&self, id: &HashId) -> Result<Option<StateRecord>, LedgerError>;

    /// The record for `id`, created in `Pending` if absent.
    fn find_or_create(&self, id: &HashId) -> Result<StateRecord, LedgerError>;

    /// Whether `id` may be referenced: its record exists and is `Approved`.
    fn is_approved(&self, id: &HashId) -> Result<bool, LedgerError>;

    /// Reserve `target` for revocation by `owner`. Succeeds only if the
    /// target's record is currently approved and unlocked; returns the
    /// locked snapshot, or `None` when the reservation is unavailable.
    fn lock_to_revoke(
        &self,
        owner: &HashId,
        target: &HashId,
    ) -> Result<Option<StateRecord>, LedgerError>;

    /// Reserve `target` as an output of `owner`. Succeeds only if no record
    /// for `target` exists; creates one in `LockedForCreation`. `None`
    /// signals a collision.
    fn create_output_lock(
        &self,
        owner: &HashId,
        target: &HashId,
    ) -> Result<Option<StateRecord>, LedgerError>;

    /// Persist a record snapshot. Saving an unlocked `LockedForCreation`
    /// snapshot erases the row: a released output reservation leaves no
    /// trace.
    fn save(&self, record: &StateRecord) -> Result<(), LedgerError>;

    /// Remove the row for `id` entirely.
    fn destroy(&self, id: &HashId) -> Result<(), LedgerError>;

    /// Run `f` atomically with respect to other transactions. No partial
    /// effects survive an error.
    fn transaction(
        &self,
        f: &mut dyn FnMut() -> Result<(), LedgerError>,
    ) -> Result<(), LedgerError>;
}
