//! # Accord Engine: Item Approval Consensus
//!
//! Per-node consensus engine for item approval in a replicated ledger.
//! Each node independently validates candidate items against its ledger,
//! gossips votes with its peers and, once a positive or negative quorum is
//! reached, commits or rolls back the item's effects atomically.
//!
//! ## Architecture
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `domain` | Leaf services: per-id locking, TTL cache, vote tally, config |
//! | `ports` | `ItemApi` (driving), `Network` and `Ledger` (driven) |
//! | `events` | The `ItemNotification` gossip message |
//! | `service` | `Node` dispatcher and the per-item processors |
//! | `adapters` | In-memory ledger and loopback network |
//!
//! ## Runtime
//!
//! The engine spawns download loops, poll ticks and commit work onto the
//! ambient tokio runtime supplied by the embedder. Hundreds of elections
//! may be live at once (≥256 concurrently scheduled tasks), and remote
//! fetches are async, so slow peers never starve the periodic ticks. Run
//! it on the multi-thread runtime in production.
//!
//! ## Guarantees
//!
//! - At most one processor exists per item id at any time.
//! - A node's vote lives in exactly one of the positive/negative sets.
//! - Exactly one terminal outcome (commit xor rollback) fires per item.
//! - Conditional ledger locks are always finalized or released, never left
//!   dangling.
//! - Votes arriving after consensus change nothing.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use accord_engine::{Config, ItemApi, MemoryLedger, NetworkHub, Node};
//! use accord_types::NodeInfo;
//! use std::sync::Arc;
//!
//! let hub = NetworkHub::new();
//! let me = NodeInfo::new(1);
//! let node = Node::new(
//!     Config::default(),
//!     me.clone(),
//!     Arc::new(MemoryLedger::new()),
//!     LoopbackNetwork::connect(&hub, me),
//! );
//!
//! let result = node.register_item(item).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

pub use adapters::{LoopbackNetwork, MemoryLedger, NetworkHub};
pub use domain::{
    Config, ConsensusOutcome, ItemCache, ItemLock, Latch, LedgerError, NetworkError, NodeError,
    VoteTally,
};
pub use events::ItemNotification;
pub use ports::{ItemApi, Ledger, Network, NotificationHandler};
pub use service::Node;
