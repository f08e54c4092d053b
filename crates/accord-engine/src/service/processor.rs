//! Per-item election processor.
//!
//! One processor drives a single item from arrival to a terminal ledger
//! state: obtain the body, run the local check under conditional ledger
//! locks, vote, gossip, and on quorum commit or roll back atomically. The
//! dispatcher guarantees at most one live processor per item id.
//!
//! Shared state is split across small mutexes: the voting mutex guards the
//! tally, the consensus flag and the expiration deadline as one unit; the
//! sources set has its own lock so notification handlers can add peers
//! while a download is in flight. The `downloaded` and `done` latches fire
//! at most once each, `downloaded` strictly before `done`, and both loops
//! re-check the consensus flag before any side effect so a cancelled
//! iteration cannot alter the outcome.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use accord_types::{
    now_secs, Approvable, ErrorCode, HashId, ItemError, ItemResult, ItemState, NodeInfo,
    StateRecord,
};
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::{Config, ConsensusOutcome, ItemCache, Latch, VoteTally};
use crate::events::ItemNotification;
use crate::metrics;
use crate::ports::{Ledger, Network};

/// Collaborator handles a processor is constructed with.
pub(crate) struct ProcessorDeps<N, L> {
    pub(crate) my_info: NodeInfo,
    pub(crate) config: Config,
    pub(crate) network: Arc<N>,
    pub(crate) ledger: Arc<L>,
    pub(crate) cache: Arc<ItemCache>,
}

/// Tally, consensus flag and deadline, guarded as one unit.
struct Voting {
    tally: VoteTally,
    expires_at: Instant,
}

#[derive(Default)]
struct LockedRecords {
    to_revoke: Vec<StateRecord>,
    to_create: Vec<StateRecord>,
}

enum Expiry {
    Alive,
    TimedOut,
    Decided,
}

pub(crate) struct ItemProcessor<N: Network, L: Ledger> {
    item_id: HashId,
    my_info: NodeInfo,
    config: Config,
    network: Arc<N>,
    ledger: Arc<L>,
    cache: Arc<ItemCache>,
    weak_self: Weak<Self>,
    started_at: std::time::Instant,

    item: Mutex<Option<Arc<dyn Approvable>>>,
    record: Mutex<StateRecord>,
    voting: Mutex<Voting>,
    sources: Mutex<HashSet<NodeInfo>>,
    source_added: Notify,
    locks: Mutex<LockedRecords>,
    downloaded: Latch,
    done: Latch,
}

impl<N: Network, L: Ledger> ItemProcessor<N, L> {
    /// Create the processor and schedule its download task.
    ///
    /// The body may come from the caller or the cache; without either the
    /// processor starts in the downloading phase and waits for sources.
    pub(crate) fn start(
        deps: ProcessorDeps<N, L>,
        item_id: HashId,
        item: Option<Arc<dyn Approvable>>,
    ) -> Result<Arc<Self>, crate::domain::NodeError> {
        let item = item.or_else(|| deps.cache.get(&item_id));
        let record = deps.ledger.find_or_create(&item_id)?;
        let expires_at = Instant::now() + deps.config.max_cache_age;
        let tally = VoteTally::new(
            deps.config.positive_consensus,
            deps.config.negative_consensus,
        );
        let processor = Arc::new_cyclic(|weak_self| Self {
            item_id,
            my_info: deps.my_info,
            config: deps.config,
            network: deps.network,
            ledger: deps.ledger,
            cache: deps.cache,
            weak_self: weak_self.clone(),
            started_at: std::time::Instant::now(),
            item: Mutex::new(item),
            record: Mutex::new(record),
            voting: Mutex::new(Voting { tally, expires_at }),
            sources: Mutex::new(HashSet::new()),
            source_added: Notify::new(),
            locks: Mutex::new(LockedRecords::default()),
            downloaded: Latch::new(),
            done: Latch::new(),
        });
        tokio::spawn(processor.clone().run_download());
        Ok(processor)
    }

    pub(crate) fn item_id(&self) -> &HashId {
        &self.item_id
    }

    pub(crate) fn done_event(&self) -> &Latch {
        &self.done
    }

    /// Current result: the in-memory record plus whether the body is here.
    pub(crate) fn get_result(&self) -> ItemResult {
        ItemResult::from_record(&self.record.lock(), self.item.lock().is_some())
    }

    pub(crate) fn has_vote_from(&self, node: &NodeInfo) -> bool {
        self.voting.lock().tally.has_vote_from(node)
    }

    /// Record a vote; the latest vote from a peer wins. The set update and
    /// the threshold checks happen in one critical section, and the first
    /// quorum triggers the terminal path exactly once.
    pub(crate) fn vote(&self, node: NodeInfo, state: ItemState) {
        let outcome = self.voting.lock().tally.record(node, state.is_positive());
        match outcome {
            Some(ConsensusOutcome::Positive) => self.approve_and_commit(),
            Some(ConsensusOutcome::Negative) => self.rollback(ItemState::Declined),
            None => {}
        }
    }

    /// A peer announced it holds a copy; wake the downloader.
    pub(crate) fn add_to_sources(&self, node: NodeInfo) {
        if self.item.lock().is_some() {
            return;
        }
        let mut sources = self.sources.lock();
        if sources.insert(node) {
            self.source_added.notify_one();
        }
    }

    // === DOWNLOADING ===

    async fn run_download(self: Arc<Self>) {
        loop {
            if self.done.is_fired() || self.downloaded.is_fired() {
                return;
            }
            let present = self.item.lock().clone();
            if let Some(item) = present {
                self.item_downloaded(item);
                return;
            }
            match self.check_expiry() {
                Expiry::Alive => {}
                Expiry::TimedOut => {
                    debug!(item = %self.item_id, "body not obtained in time, cancelling");
                    self.rollback(ItemState::Undefined);
                    return;
                }
                Expiry::Decided => return,
            }
            let source = {
                let sources = self.sources.lock();
                sources.iter().choose(&mut rand::thread_rng()).cloned()
            };
            if let Some(source) = source {
                match self
                    .network
                    .get_item(&self.item_id, &source, self.config.max_get_item_time)
                    .await
                {
                    Ok(Some(item)) => {
                        self.item_downloaded(item);
                        return;
                    }
                    Ok(None) => {
                        debug!(item = %self.item_id, %source, "peer had no copy");
                    }
                    Err(e) => {
                        debug!(item = %self.item_id, %source, error = %e, "fetch failed, will retry");
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_time) => {}
                _ = self.source_added.notified() => {}
                _ = self.done.wait() => return,
            }
        }
    }

    fn item_downloaded(&self, item: Arc<dyn Approvable>) {
        if self.downloaded.is_fired() {
            return;
        }
        self.cache.put(item.clone());
        *self.item.lock() = Some(item);
        let decided = self.voting.lock().tally.consensus_found();
        if !decided {
            // Normal path: validate, lock, vote, then keep polling. After a
            // decision the body is only needed for the commit, so the check
            // must not run again and re-take locks.
            self.check_item();
        }
        self.downloaded.fire();
        if !decided {
            self.start_polling();
        }
    }

    fn check_expiry(&self) -> Expiry {
        let mut voting = self.voting.lock();
        if Instant::now() < voting.expires_at {
            return Expiry::Alive;
        }
        if voting.tally.consensus_found() {
            return Expiry::Decided;
        }
        voting.tally.close();
        Expiry::TimedOut
    }

    // === CHECKING ===

    /// Local validation and conditional locking, then the own vote and its
    /// broadcast. Failures populate the item's error list; the vote is
    /// positive iff that list stays empty.
    fn check_item(&self) {
        let Some(item) = self.item.lock().clone() else {
            return;
        };
        {
            let mut locks = self.locks.lock();
            if self.voting.lock().tally.consensus_found() {
                // Peers decided while the body was in flight; the outcome
                // path owns the record from here.
                return;
            }
            if item.check() {
                for id in item.referenced_items() {
                    match self.ledger.is_approved(&id) {
                        Ok(true) => {}
                        Ok(false) => item.add_error(ItemError::new(
                            ErrorCode::BadRef,
                            id.to_string(),
                            "reference not approved",
                        )),
                        Err(e) => {
                            error!(item = %self.item_id, error = %e, "ledger unavailable during check");
                            return;
                        }
                    }
                }
                for revoking in item.revoking_items() {
                    match self.ledger.lock_to_revoke(&self.item_id, &revoking.id()) {
                        Ok(Some(locked)) => locks.to_revoke.push(locked),
                        Ok(None) => item.add_error(ItemError::new(
                            ErrorCode::BadRevoke,
                            revoking.id().to_string(),
                            "can't revoke",
                        )),
                        Err(e) => {
                            error!(item = %self.item_id, error = %e, "ledger unavailable during check");
                            return;
                        }
                    }
                }
                for new_item in item.new_items() {
                    if !new_item.check() {
                        item.add_error(ItemError::new(
                            ErrorCode::BadNewItem,
                            new_item.id().to_string(),
                            "new item did not pass check",
                        ));
                        continue;
                    }
                    match self.ledger.create_output_lock(&self.item_id, &new_item.id()) {
                        Ok(Some(locked)) => locks.to_create.push(locked),
                        Ok(None) => item.add_error(ItemError::new(
                            ErrorCode::NewItemExists,
                            new_item.id().to_string(),
                            "new item already exists in the ledger",
                        )),
                        Err(e) => {
                            error!(item = %self.item_id, error = %e, "ledger unavailable during check");
                            return;
                        }
                    }
                }
            }
        }
        let own_vote = if item.errors().is_empty() {
            ItemState::PendingPositive
        } else {
            ItemState::PendingNegative
        };
        {
            let mut record = self.record.lock();
            record.set_state(own_vote);
            record.set_expires_at(item.expires_at());
            if let Err(e) = self.ledger.save(&record) {
                error!(item = %self.item_id, error = %e, "failed to persist the checked record");
                return;
            }
        }
        debug!(item = %self.item_id, vote = ?own_vote, "local check finished");
        self.vote(self.my_info.clone(), own_vote);
        self.broadcast_my_state();
    }

    // === POLLING ===

    fn start_polling(&self) {
        if let Some(processor) = self.weak_self.upgrade() {
            tokio::spawn(processor.run_poll());
        }
    }

    async fn run_poll(self: Arc<Self>) {
        let period = self.config.poll_time;
        let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    if !self.poll() {
                        return;
                    }
                }
                _ = self.done.wait() => return,
            }
        }
    }

    /// One poll tick. Returns false when the processor is finished.
    fn poll(&self) -> bool {
        {
            let mut voting = self.voting.lock();
            if voting.tally.consensus_found() {
                return false;
            }
            if Instant::now() >= voting.expires_at {
                debug!(item = %self.item_id, "consensus not reached in the allowed time, cancelling");
                voting.tally.close();
                drop(voting);
                self.rollback(ItemState::Undefined);
                return false;
            }
        }
        // Requery the peers that have not answered yet.
        let notification = ItemNotification::new(
            self.my_info.clone(),
            self.item_id.clone(),
            self.get_result(),
            true,
        );
        let silent: Vec<NodeInfo> = {
            let voting = self.voting.lock();
            self.network
                .peers()
                .into_iter()
                .filter(|peer| !voting.tally.has_vote_from(peer))
                .collect()
        };
        for peer in silent {
            self.network.deliver(&peer, notification.clone());
        }
        true
    }

    fn broadcast_my_state(&self) {
        let notification = ItemNotification::new(
            self.my_info.clone(),
            self.item_id.clone(),
            self.get_result(),
            true,
        );
        self.network.broadcast(&self.my_info, notification);
    }

    // === COMMIT ===

    fn approve_and_commit(&self) {
        debug!(item = %self.item_id, "positive consensus reached");
        self.record.lock().set_state(ItemState::Approved);
        if let Some(processor) = self.weak_self.upgrade() {
            tokio::spawn(async move { processor.download_and_commit().await });
        }
    }

    async fn download_and_commit(self: Arc<Self>) {
        if self.item.lock().is_none() {
            // The vote can outrun the body. Widen the deadline once, treat
            // the whole network as a source and fetch before touching the
            // ledger. This is the only point where the deadline advances.
            let window = self.config.max_download_on_approve_time;
            self.voting.lock().expires_at = Instant::now() + window;
            {
                let mut sources = self.sources.lock();
                for peer in self.network.peers() {
                    if peer != self.my_info {
                        sources.insert(peer);
                    }
                }
            }
            self.source_added.notify_one();
            tokio::spawn(self.clone().run_download());
            if !self.downloaded.wait_timeout(window).await || self.item.lock().is_none() {
                warn!(item = %self.item_id, "no body within the approval window, destroying the record");
                self.record.lock().set_state(ItemState::Undefined);
                if let Err(e) = self.ledger.destroy(&self.item_id) {
                    error!(item = %self.item_id, error = %e, "failed to destroy the record");
                }
                self.done.fire();
                return;
            }
        }
        let Some(item) = self.item.lock().clone() else {
            return;
        };
        // Processor mutexes are never held across ledger calls; snapshot
        // the record first, then mutate rows inside one transaction.
        let record_snapshot = {
            let mut record = self.record.lock();
            record.set_expires_at(item.expires_at());
            record.clone()
        };
        // Dependent records go through find_or_create rather than the
        // locked lists: under conflict those snapshots may differ from what
        // the item yields. The lists are cleared once finalized.
        let commit = self.ledger.transaction(&mut || {
            for revoking in item.revoking_items() {
                let mut target = self.ledger.find_or_create(&revoking.id())?;
                target.set_state(ItemState::Revoked);
                target.set_expires_at(
                    now_secs() + self.config.revoked_item_expiration.as_secs(),
                );
                target.unlock();
                self.ledger.save(&target)?;
            }
            for new_item in item.new_items() {
                let mut output = self.ledger.find_or_create(&new_item.id())?;
                output.set_state(ItemState::Approved);
                output.set_expires_at(new_item.expires_at());
                output.unlock();
                self.ledger.save(&output)?;
            }
            self.ledger.save(&record_snapshot)?;
            Ok(())
        });
        if let Err(e) = commit {
            error!(item = %self.item_id, error = %e, "commit transaction failed");
            panic!("ledger transaction failed while committing {}: {e}", self.item_id);
        }
        {
            let mut locks = self.locks.lock();
            locks.to_revoke.clear();
            locks.to_create.clear();
        }
        metrics::item_approved();
        metrics::observe_election_seconds(self.started_at.elapsed().as_secs_f64());
        info!(
            item = %self.item_id,
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "approved and committed"
        );
        self.done.fire();
    }

    // === ROLLBACK ===

    /// Release every conditional lock and finalize the record as
    /// `new_state`, atomically. Terminal for this processor.
    fn rollback(&self, new_state: ItemState) {
        {
            let voting = self.voting.lock();
            debug!(
                item = %self.item_id,
                state = ?new_state,
                positive = voting.tally.positive_count(),
                negative = voting.tally.negative_count(),
                "rolling back"
            );
        }
        // Drain under the processor mutexes first; no processor lock is
        // held while the ledger lock is.
        let (to_revoke, to_create) = {
            let mut locks = self.locks.lock();
            (
                std::mem::take(&mut locks.to_revoke),
                std::mem::take(&mut locks.to_create),
            )
        };
        let record_snapshot = {
            let mut record = self.record.lock();
            record.set_state(new_state);
            let retention = if new_state == ItemState::Revoked {
                self.config.revoked_item_expiration
            } else {
                self.config.declined_item_expiration
            };
            record.set_expires_at(now_secs() + retention.as_secs());
            record.clone()
        };
        let result = self.ledger.transaction(&mut || {
            for locked in &to_revoke {
                let mut released = locked.clone();
                released.unlock();
                self.ledger.save(&released)?;
            }
            for locked in &to_create {
                let mut released = locked.clone();
                released.unlock();
                self.ledger.save(&released)?;
            }
            self.ledger.save(&record_snapshot)?;
            Ok(())
        });
        if let Err(e) = result {
            error!(item = %self.item_id, error = %e, "rollback transaction failed");
            panic!("ledger transaction failed while rolling back {}: {e}", self.item_id);
        }
        match new_state {
            ItemState::Declined => metrics::item_declined(),
            _ => metrics::item_undefined(),
        }
        self.done.fire();
    }
}
