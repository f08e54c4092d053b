//! Engine error types.

use accord_types::{HashId, NodeInfo};
use thiserror::Error;

/// Failures of the persistent ledger port.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying storage failed.
    #[error("ledger storage failure: {0}")]
    Storage(String),

    /// A transaction could not be applied atomically.
    #[error("ledger transaction aborted: {0}")]
    Transaction(String),
}

/// Failures of the peer-to-peer transport port.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// A remote fetch did not complete within its budget.
    #[error("timed out fetching {item_id} from {node}")]
    FetchTimeout { item_id: HashId, node: NodeInfo },

    /// Transport-level failure.
    #[error("network transport failure: {0}")]
    Transport(String),
}

/// Failures surfaced to dispatcher callers.
///
/// Item validity problems are never `NodeError`s; they accumulate on the
/// item itself. This type covers infrastructure failures inside the
/// serialized check section.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
