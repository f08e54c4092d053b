//! Shared fixtures: a configurable test item and cluster wiring.

use std::sync::Arc;

use accord_engine::{Config, LoopbackNetwork, MemoryLedger, NetworkHub, Node};
use accord_types::{now_secs, Approvable, ErrorCode, HashId, ItemError, NodeInfo};
use parking_lot::Mutex;

/// A scriptable item: validity, references, revocations and outputs are
/// fixed at construction; errors accumulate like on a real contract.
pub struct TestItem {
    id: HashId,
    created_at: u64,
    expires_at: u64,
    valid: bool,
    referenced: Vec<HashId>,
    revoking: Vec<Arc<dyn Approvable>>,
    new_items: Vec<Arc<dyn Approvable>>,
    errors: Mutex<Vec<ItemError>>,
}

impl TestItem {
    pub fn valid(tag: &[u8]) -> Arc<Self> {
        Arc::new(Self::bare(tag))
    }

    pub fn with_reference(tag: &[u8], referenced: HashId) -> Arc<Self> {
        let mut item = Self::bare(tag);
        item.referenced.push(referenced);
        Arc::new(item)
    }

    pub fn with_new_item(tag: &[u8], new_item: Arc<dyn Approvable>) -> Arc<Self> {
        let mut item = Self::bare(tag);
        item.new_items.push(new_item);
        Arc::new(item)
    }

    pub fn revoking(tag: &[u8], target: Arc<dyn Approvable>) -> Arc<Self> {
        let mut item = Self::bare(tag);
        item.revoking.push(target);
        Arc::new(item)
    }

    fn bare(tag: &[u8]) -> Self {
        Self {
            id: HashId::of(tag),
            created_at: now_secs(),
            expires_at: now_secs() + 30 * 24 * 3600,
            valid: true,
            referenced: Vec::new(),
            revoking: Vec::new(),
            new_items: Vec::new(),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors().iter().any(|e| e.code == code)
    }
}

impl Approvable for TestItem {
    fn id(&self) -> HashId {
        self.id.clone()
    }

    fn created_at(&self) -> u64 {
        self.created_at
    }

    fn expires_at(&self) -> u64 {
        self.expires_at
    }

    fn check(&self) -> bool {
        if !self.valid {
            self.add_error(ItemError::new(ErrorCode::FailedCheck, "self", "check failed"));
        }
        self.valid
    }

    fn referenced_items(&self) -> Vec<HashId> {
        self.referenced.clone()
    }

    fn revoking_items(&self) -> Vec<Arc<dyn Approvable>> {
        self.revoking.clone()
    }

    fn new_items(&self) -> Vec<Arc<dyn Approvable>> {
        self.new_items.clone()
    }

    fn errors(&self) -> Vec<ItemError> {
        self.errors.lock().clone()
    }

    fn add_error(&self, error: ItemError) {
        self.errors.lock().push(error);
    }
}

/// One live node of a simulated cluster.
pub struct ClusterNode {
    pub info: NodeInfo,
    pub ledger: Arc<MemoryLedger>,
    pub node: Arc<Node<LoopbackNetwork, MemoryLedger>>,
}

/// A full mesh of live nodes over one hub, numbered from 1.
pub struct Cluster {
    pub hub: Arc<NetworkHub>,
    pub nodes: Vec<ClusterNode>,
}

impl Cluster {
    pub fn start(size: u32, config: Config) -> Self {
        let hub = NetworkHub::new();
        let nodes = (1..=size)
            .map(|number| {
                let info = NodeInfo::new(number);
                let ledger = Arc::new(MemoryLedger::new());
                let node = Node::new(
                    config.clone(),
                    info.clone(),
                    ledger.clone(),
                    LoopbackNetwork::connect(&hub, info.clone()),
                );
                ClusterNode { info, ledger, node }
            })
            .collect();
        Self { hub, nodes }
    }

    pub fn node(&self, number: u32) -> &ClusterNode {
        &self.nodes[(number - 1) as usize]
    }
}

/// A hub with one live node and silent peers: the peers occupy the peer
/// list (and can hold item bodies) but never answer, so tests inject their
/// votes explicitly.
pub struct SoloCluster {
    pub hub: Arc<NetworkHub>,
    pub live: ClusterNode,
    pub silent: Vec<(NodeInfo, Arc<LoopbackNetwork>)>,
}

impl SoloCluster {
    pub fn start(peer_count: u32, config: Config) -> Self {
        let hub = NetworkHub::new();
        let info = NodeInfo::new(1);
        let ledger = Arc::new(MemoryLedger::new());
        let node = Node::new(
            config,
            info.clone(),
            ledger.clone(),
            LoopbackNetwork::connect(&hub, info.clone()),
        );
        let silent = (2..=peer_count)
            .map(|number| {
                let peer = NodeInfo::new(number);
                (peer.clone(), LoopbackNetwork::connect(&hub, peer))
            })
            .collect();
        Self {
            hub,
            live: ClusterNode { info, ledger, node },
            silent,
        }
    }

    /// Endpoint of a silent peer, for injecting its notifications.
    pub fn peer(&self, number: u32) -> &Arc<LoopbackNetwork> {
        &self.silent[(number - 2) as usize].1
    }
}
