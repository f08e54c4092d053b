//! # Shared Types Crate
//!
//! Domain entities shared by every Accord crate: content identifiers, peer
//! identity, item states, ledger record snapshots and client-visible
//! results, plus the [`Approvable`] trait that candidate items implement.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-crate types are defined here.
//! - **Value semantics**: records and results are plain snapshots; the
//!   authoritative copy always lives in the ledger.
//! - **Wire stability**: everything that crosses the network derives serde
//!   with a fixed field set, so mixed-implementation peers interoperate.

pub mod entities;
pub mod errors;
pub mod item;

pub use entities::{now_secs, HashId, ItemResult, ItemState, NodeInfo, StateRecord};
pub use errors::{ErrorCode, ItemError};
pub use item::Approvable;
