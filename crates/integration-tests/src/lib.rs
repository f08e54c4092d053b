//! # End-to-End Consensus Scenarios
//!
//! Multi-node simulations of the approval engine over the in-process
//! network hub: full-mesh gossip with real body downloads, directed vote
//! injection for boundary cases, and the ledger-level outcomes of commit
//! and rollback.

pub mod fixtures;

#[cfg(test)]
mod consensus_flow;
