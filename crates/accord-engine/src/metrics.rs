//! # Engine Metrics
//!
//! Prometheus metrics for election outcomes and latency.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! accord-engine = { version = "0.1", features = ["metrics"] }
//! ```
//! Without the feature every recording function compiles to a no-op.

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Elections that ended in a positive quorum and committed.
    pub static ref ITEMS_APPROVED: IntCounter = register_int_counter!(
        "accord_items_approved_total",
        "Total items approved and committed"
    )
    .expect("Failed to create ITEMS_APPROVED metric");

    /// Elections that ended in a negative quorum.
    pub static ref ITEMS_DECLINED: IntCounter = register_int_counter!(
        "accord_items_declined_total",
        "Total items declined by negative consensus"
    )
    .expect("Failed to create ITEMS_DECLINED metric");

    /// Elections cancelled without consensus (expired or body never obtained).
    pub static ref ITEMS_UNDEFINED: IntCounter = register_int_counter!(
        "accord_items_undefined_total",
        "Total elections cancelled without consensus"
    )
    .expect("Failed to create ITEMS_UNDEFINED metric");

    /// Wall-clock seconds from processor start to commit.
    pub static ref ELECTION_SECONDS: Histogram = register_histogram!(
        "accord_election_seconds",
        "Seconds from election start to commit"
    )
    .expect("Failed to create ELECTION_SECONDS metric");
}

#[cfg(feature = "metrics")]
pub fn item_approved() {
    ITEMS_APPROVED.inc();
}

#[cfg(feature = "metrics")]
pub fn item_declined() {
    ITEMS_DECLINED.inc();
}

#[cfg(feature = "metrics")]
pub fn item_undefined() {
    ITEMS_UNDEFINED.inc();
}

#[cfg(feature = "metrics")]
pub fn observe_election_seconds(seconds: f64) {
    ELECTION_SECONDS.observe(seconds);
}

#[cfg(not(feature = "metrics"))]
pub fn item_approved() {}

#[cfg(not(feature = "metrics"))]
pub fn item_declined() {}

#[cfg(not(feature = "metrics"))]
pub fn item_undefined() {}

#[cfg(not(feature = "metrics"))]
pub fn observe_election_seconds(_seconds: f64) {}
