//! In-memory adapters for the driven ports.
//!
//! Reference implementations used by the test suites and as the semantic
//! model real backends must match.

mod loopback_network;
mod memory_ledger;

pub use loopback_network::{LoopbackNetwork, NetworkHub};
pub use memory_ledger::MemoryLedger;
