//! # Core Domain Entities
//!
//! Identifiers, peer identity, item states and the two snapshot types
//! (`StateRecord`, `ItemResult`) that the engine and the ledger exchange.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Current unix timestamp in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Opaque 32-byte content identifier.
///
/// Equality and hashing are defined; no total order is exposed. Built from
/// content via [`HashId::of`] (Keccak-256) or wrapped from raw digest bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashId([u8; 32]);

impl HashId {
    /// Digest arbitrary content into an identifier.
    pub fn of(content: &[u8]) -> Self {
        let digest = Keccak256::digest(content);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..6] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "…")
    }
}

impl fmt::Debug for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashId({self})")
    }
}

/// Peer identity within one Accord network.
///
/// Nodes are numbered; equality is defined over the number alone.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeInfo {
    pub number: u32,
}

impl NodeInfo {
    pub fn new(number: u32) -> Self {
        Self { number }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.number)
    }
}

/// Lifecycle state of an item as tracked by the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ItemState {
    /// Known, consensus not yet attempted.
    Pending,
    /// Local check passed, voting in progress.
    PendingPositive,
    /// Local check failed, voting in progress.
    PendingNegative,
    /// Positive consensus reached.
    Approved,
    /// Negative consensus reached.
    Declined,
    /// Revoked by a later approved item.
    Revoked,
    /// Reserved as the output of a pending item.
    LockedForCreation,
    /// No consensus reached before expiration, or unknown.
    Undefined,
    /// Rejected without election (e.g. created too long ago).
    Discarded,
}

impl ItemState {
    /// Positive for vote tallying: `PendingPositive` or `Approved`.
    pub fn is_positive(self) -> bool {
        matches!(self, ItemState::PendingPositive | ItemState::Approved)
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ItemState::Pending | ItemState::PendingPositive | ItemState::PendingNegative
        )
    }

    pub fn is_approved(self) -> bool {
        self == ItemState::Approved
    }
}

/// Snapshot of a ledger row.
///
/// The ledger owns the authoritative copy; processors mutate a snapshot
/// locally and persist it back with `Ledger::save`. A row is locked when
/// `locked_by` names the item holding the reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub id: HashId,
    pub state: ItemState,
    /// Unix seconds after which the row may be garbage collected.
    pub expires_at: u64,
    pub locked_by: Option<HashId>,
}

impl StateRecord {
    pub fn new(id: HashId, state: ItemState) -> Self {
        Self {
            id,
            state,
            expires_at: 0,
            locked_by: None,
        }
    }

    pub fn set_state(&mut self, state: ItemState) {
        self.state = state;
    }

    pub fn set_expires_at(&mut self, expires_at: u64) {
        self.expires_at = expires_at;
    }

    /// Release a conditional lock held on this row.
    pub fn unlock(&mut self) -> &mut Self {
        self.locked_by = None;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }
}

/// Client- and peer-visible snapshot of an item's standing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub state: ItemState,
    /// Unix seconds; zero when no record backs the result.
    pub expires_at: u64,
    /// Whether the reporting node holds a copy of the item body.
    pub have_copy: bool,
}

impl ItemResult {
    /// Result for an id the node knows nothing about.
    pub const UNDEFINED: ItemResult = ItemResult {
        state: ItemState::Undefined,
        expires_at: 0,
        have_copy: false,
    };

    /// Result for an item rejected without election.
    pub const DISCARDED: ItemResult = ItemResult {
        state: ItemState::Discarded,
        expires_at: 0,
        have_copy: false,
    };

    pub fn from_record(record: &StateRecord, have_copy: bool) -> Self {
        Self {
            state: record.state,
            expires_at: record.expires_at,
            have_copy,
        }
    }
}
