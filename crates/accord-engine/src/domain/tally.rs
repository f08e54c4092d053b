//! Dual-set vote accumulation with quorum detection.

use std::collections::HashSet;

use accord_types::NodeInfo;

/// Terminal outcome of an election.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConsensusOutcome {
    Positive,
    Negative,
}

/// Accumulates peer votes into disjoint positive and negative sets.
///
/// The latest vote from a peer wins: recording moves the peer into the
/// chosen set and out of the other. Thresholds are checked after every
/// update, negative before positive, and the first quorum freezes the
/// tally: later votes are dropped and no second outcome is ever emitted.
///
/// Callers serialize access externally (the processor's voting mutex), so
/// the set swap and both threshold checks form one atomic step.
pub struct VoteTally {
    positive_quorum: usize,
    negative_quorum: usize,
    positive: HashSet<NodeInfo>,
    negative: HashSet<NodeInfo>,
    consensus_found: bool,
}

impl VoteTally {
    pub fn new(positive_quorum: usize, negative_quorum: usize) -> Self {
        Self {
            positive_quorum,
            negative_quorum,
            positive: HashSet::new(),
            negative: HashSet::new(),
            consensus_found: false,
        }
    }

    /// Record a vote. Returns the outcome iff this vote trips a quorum.
    pub fn record(&mut self, node: NodeInfo, positive: bool) -> Option<ConsensusOutcome> {
        if self.consensus_found {
            return None;
        }
        if positive {
            self.negative.remove(&node);
            self.positive.insert(node);
        } else {
            self.positive.remove(&node);
            self.negative.insert(node);
        }
        if self.negative.len() >= self.negative_quorum {
            self.consensus_found = true;
            Some(ConsensusOutcome::Negative)
        } else if self.positive.len() >= self.positive_quorum {
            self.consensus_found = true;
            Some(ConsensusOutcome::Positive)
        } else {
            None
        }
    }

    /// Freeze the tally without an outcome (expiration path).
    pub fn close(&mut self) {
        self.consensus_found = true;
    }

    pub fn consensus_found(&self) -> bool {
        self.consensus_found
    }

    pub fn has_vote_from(&self, node: &NodeInfo) -> bool {
        self.positive.contains(node) || self.negative.contains(node)
    }

    pub fn positive_count(&self) -> usize {
        self.positive.len()
    }

    pub fn negative_count(&self) -> usize {
        self.negative.len()
    }
}
