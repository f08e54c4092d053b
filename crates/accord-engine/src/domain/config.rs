//! Engine configuration.

use std::time::Duration;

/// Tuning knobs for one node's approval engine.
///
/// Quorum thresholds count nodes, the local one included. The durations are
/// wall-clock budgets; `max_cache_age` doubles as the initial lifetime of a
/// processor, after which an undecided election is cancelled.
#[derive(Clone, Debug)]
pub struct Config {
    /// Cache TTL and initial processor lifetime.
    pub max_cache_age: Duration,
    /// Items created further in the past than this are discarded without
    /// election.
    pub max_item_creation_age: Duration,
    /// Retransmit interval of the poller and retry interval of the
    /// downloader.
    pub poll_time: Duration,
    /// Per-attempt timeout of a remote item fetch.
    pub max_get_item_time: Duration,
    /// Extended window to fetch the body after a positive quorum.
    pub max_download_on_approve_time: Duration,
    /// Node count that approves an item.
    pub positive_consensus: usize,
    /// Node count that declines an item.
    pub negative_consensus: usize,
    /// Record retention after REVOKED.
    pub revoked_item_expiration: Duration,
    /// Record retention after DECLINED or UNDEFINED.
    pub declined_item_expiration: Duration,
    /// Grace period before a finished processor is dropped from the
    /// dispatcher map; `None` keeps entries forever.
    pub processor_retention: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_cache_age: Duration::from_secs(20 * 60),
            max_item_creation_age: Duration::from_secs(5 * 24 * 3600),
            poll_time: Duration::from_secs(1),
            max_get_item_time: Duration::from_secs(30),
            max_download_on_approve_time: Duration::from_secs(5 * 60),
            positive_consensus: 1,
            negative_consensus: 1,
            revoked_item_expiration: Duration::from_secs(90 * 24 * 3600),
            declined_item_expiration: Duration::from_secs(10 * 24 * 3600),
            processor_retention: Some(Duration::from_secs(5 * 60)),
        }
    }
}
