//! Node dispatcher.
//!
//! The node is always the local one; everything remote goes through the
//! [`Network`] port. The dispatcher routes client requests and inbound
//! notifications to per-item processors, serializing every decision about
//! one item id under [`ItemLock`].

mod processor;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use accord_types::{
    now_secs, Approvable, ErrorCode, HashId, ItemError, ItemResult, NodeInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::{Config, ItemCache, ItemLock, NodeError};
use crate::events::ItemNotification;
use crate::ports::{ItemApi, Ledger, Network};
use self::processor::{ItemProcessor, ProcessorDeps};

/// Outcome of the serialized internal check: either a settled result or the
/// live processor handling the item.
enum Resolution<N: Network, L: Ledger> {
    Final(ItemResult),
    Processing(Arc<ItemProcessor<N, L>>),
}

/// The local node: dispatcher over per-item processors.
pub struct Node<N: Network, L: Ledger> {
    config: Config,
    my_info: NodeInfo,
    ledger: Arc<L>,
    network: Arc<N>,
    cache: Arc<ItemCache>,
    item_lock: ItemLock,
    processors: Arc<Mutex<HashMap<HashId, Arc<ItemProcessor<N, L>>>>>,
}

impl<N: Network, L: Ledger> Node<N, L> {
    /// Build the node and subscribe it to inbound notifications.
    ///
    /// Must be called within a tokio runtime; processors spawn their work
    /// onto it.
    pub fn new(config: Config, my_info: NodeInfo, ledger: Arc<L>, network: Arc<N>) -> Arc<Self> {
        let cache = Arc::new(ItemCache::new(config.max_cache_age));
        let node = Arc::new(Self {
            config,
            my_info,
            ledger,
            network,
            cache,
            item_lock: ItemLock::new(),
            processors: Arc::new(Mutex::new(HashMap::new())),
        });
        let weak = Arc::downgrade(&node);
        node.network.subscribe(Box::new(move |notification| {
            if let Some(node) = weak.upgrade() {
                tokio::spawn(node.on_notification(notification));
            }
        }));
        node
    }

    pub fn my_info(&self) -> &NodeInfo {
        &self.my_info
    }

    pub fn cache(&self) -> &ItemCache {
        &self.cache
    }

    /// Peer gossip entry point.
    ///
    /// Feeds the sender's vote (and source announcement) into the item's
    /// processor, creating one if the item is new to this node, and answers
    /// when the sender asked for an answer.
    async fn on_notification(self: Arc<Self>, notification: ItemNotification) {
        let ItemNotification {
            from,
            item_id,
            result,
            request_answer,
        } = notification;
        match self.check_item_internal(item_id.clone(), None, true).await {
            Err(e) => {
                warn!(item = %item_id, %from, error = %e, "failed to resolve inbound notification");
            }
            Ok(Resolution::Final(final_result)) => {
                // Already decided here; share the outcome if asked.
                if request_answer {
                    self.network.deliver(
                        &from,
                        ItemNotification::new(self.my_info.clone(), item_id, final_result, false),
                    );
                }
            }
            Ok(Resolution::Processing(processor)) => {
                processor.vote(from.clone(), result.state);
                if result.have_copy {
                    processor.add_to_sources(from.clone());
                }
                if request_answer {
                    let reply_wanted = !processor.has_vote_from(&from);
                    self.network.deliver(
                        &from,
                        ItemNotification::new(
                            self.my_info.clone(),
                            item_id,
                            processor.get_result(),
                            reply_wanted,
                        ),
                    );
                }
            }
        }
    }

    /// The one serialized decision path for an item id.
    ///
    /// Under `ItemLock(id)`: an existing processor wins; otherwise a ledger
    /// record settles the answer; otherwise an over-age item is discarded
    /// without a record; otherwise (`auto_start`) an election begins.
    async fn check_item_internal(
        &self,
        item_id: HashId,
        item: Option<Arc<dyn Approvable>>,
        auto_start: bool,
    ) -> Result<Resolution<N, L>, NodeError> {
        self.item_lock
            .synchronize(&item_id, || async {
                if let Some(processor) = self.processors.lock().get(&item_id).cloned() {
                    return Ok(Resolution::Processing(processor));
                }
                if let Some(record) = self.ledger.get_record(&item_id)? {
                    // Already processed; the cache may still hold a copy.
                    return Ok(Resolution::Final(ItemResult::from_record(
                        &record,
                        self.cache.contains(&item_id),
                    )));
                }
                if let Some(body) = &item {
                    let oldest_accepted =
                        now_secs().saturating_sub(self.config.max_item_creation_age.as_secs());
                    if body.created_at() < oldest_accepted {
                        body.add_error(ItemError::new(ErrorCode::Expired, "created_at", "too old"));
                        debug!(item = %item_id, "created too far in the past, discarding");
                        return Ok(Resolution::Final(ItemResult::DISCARDED));
                    }
                }
                if !auto_start {
                    return Ok(Resolution::Final(ItemResult::UNDEFINED));
                }
                if let Some(body) = &item {
                    self.cache.put(body.clone());
                }
                let processor = ItemProcessor::start(self.processor_deps(), item_id.clone(), item)?;
                self.processors
                    .lock()
                    .insert(item_id.clone(), processor.clone());
                self.schedule_eviction(&processor);
                Ok(Resolution::Processing(processor))
            })
            .await
    }

    fn processor_deps(&self) -> ProcessorDeps<N, L> {
        ProcessorDeps {
            my_info: self.my_info.clone(),
            config: self.config.clone(),
            network: self.network.clone(),
            ledger: self.ledger.clone(),
            cache: self.cache.clone(),
        }
    }

    /// Drop the processor from the map a grace period after it finishes,
    /// so `wait_item` stays answerable for a while without the map growing
    /// forever.
    fn schedule_eviction(&self, processor: &Arc<ItemProcessor<N, L>>) {
        let Some(grace) = self.config.processor_retention else {
            return;
        };
        let processors = self.processors.clone();
        let processor = processor.clone();
        tokio::spawn(async move {
            processor.done_event().wait().await;
            tokio::time::sleep(grace).await;
            processors.lock().remove(processor.item_id());
        });
    }

    #[cfg(test)]
    fn processor_count(&self) -> usize {
        self.processors.lock().len()
    }
}

#[async_trait]
impl<N: Network, L: Ledger> ItemApi for Node<N, L> {
    #[instrument(skip(self, item), fields(node = %self.my_info))]
    async fn register_item(&self, item: Arc<dyn Approvable>) -> Result<ItemResult, NodeError> {
        let item_id = item.id();
        match self.check_item_internal(item_id, Some(item), true).await? {
            Resolution::Final(result) => Ok(result),
            Resolution::Processing(processor) => Ok(processor.get_result()),
        }
    }

    #[instrument(skip(self), fields(node = %self.my_info, item = %item_id))]
    async fn check_item(&self, item_id: &HashId) -> Result<ItemResult, NodeError> {
        match self
            .check_item_internal(item_id.clone(), None, false)
            .await?
        {
            Resolution::Final(result) => Ok(result),
            Resolution::Processing(processor) => Ok(processor.get_result()),
        }
    }

    async fn wait_item(
        &self,
        item_id: &HashId,
        timeout: Duration,
    ) -> Result<ItemResult, NodeError> {
        match self
            .check_item_internal(item_id.clone(), None, false)
            .await?
        {
            Resolution::Final(result) => Ok(result),
            Resolution::Processing(processor) => {
                processor.done_event().wait_timeout(timeout).await;
                Ok(processor.get_result())
            }
        }
    }
}

impl<N: Network, L: Ledger> fmt::Display for Node<N, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.my_info.number)
    }
}
