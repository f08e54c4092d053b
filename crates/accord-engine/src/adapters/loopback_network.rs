//! In-process network adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use accord_types::{Approvable, HashId, NodeInfo};
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::NetworkError;
use crate::events::ItemNotification;
use crate::ports::{Network, NotificationHandler};

#[derive(Default)]
struct HubNode {
    handler: Option<NotificationHandler>,
    store: HashMap<HashId, Arc<dyn Approvable>>,
}

/// Shared medium connecting every [`LoopbackNetwork`] endpoint.
///
/// Each node owns an item store the others can fetch from, which stands in
/// for remote body downloads. Delivery is synchronous and lossless;
/// messages to nodes that never subscribed are dropped, matching the
/// fire-and-forget transport contract.
pub struct NetworkHub {
    nodes: RwLock<HashMap<NodeInfo, HubNode>>,
}

impl NetworkHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(HashMap::new()),
        })
    }

    /// Seed `owner`'s store with an item body, making it fetchable.
    pub fn hold_item(&self, owner: &NodeInfo, item: Arc<dyn Approvable>) {
        if let Some(node) = self.nodes.write().get_mut(owner) {
            node.store.insert(item.id(), item);
        }
    }

    fn dispatch(&self, to: &NodeInfo, notification: ItemNotification) {
        let nodes = self.nodes.read();
        if let Some(handler) = nodes.get(to).and_then(|node| node.handler.as_ref()) {
            handler(notification);
        }
    }
}

/// One peer's view of the hub.
pub struct LoopbackNetwork {
    info: NodeInfo,
    hub: Arc<NetworkHub>,
}

impl LoopbackNetwork {
    /// Register `info` on the hub and hand back its endpoint.
    pub fn connect(hub: &Arc<NetworkHub>, info: NodeInfo) -> Arc<Self> {
        hub.nodes.write().entry(info.clone()).or_default();
        Arc::new(Self {
            info,
            hub: hub.clone(),
        })
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }
}

#[async_trait]
impl Network for LoopbackNetwork {
    fn subscribe(&self, handler: NotificationHandler) {
        if let Some(node) = self.hub.nodes.write().get_mut(&self.info) {
            node.handler = Some(handler);
        }
    }

    fn deliver(&self, to: &NodeInfo, notification: ItemNotification) {
        self.hub.dispatch(to, notification);
    }

    fn broadcast(&self, origin: &NodeInfo, notification: ItemNotification) {
        let peers: Vec<NodeInfo> = self.hub.nodes.read().keys().cloned().collect();
        for peer in peers {
            if peer != *origin {
                self.hub.dispatch(&peer, notification.clone());
            }
        }
    }

    fn peers(&self) -> Vec<NodeInfo> {
        self.hub.nodes.read().keys().cloned().collect()
    }

    async fn get_item(
        &self,
        item_id: &HashId,
        source: &NodeInfo,
        _timeout: Duration,
    ) -> Result<Option<Arc<dyn Approvable>>, NetworkError> {
        // Local fetch cannot time out; absence maps to `Ok(None)`.
        let item = self
            .hub
            .nodes
            .read()
            .get(source)
            .and_then(|node| node.store.get(item_id).cloned());
        Ok(item)
    }
}
