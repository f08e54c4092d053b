//! Five-peer consensus scenarios.
//!
//! The live-mesh tests run the whole gossip organically; the boundary
//! tests inject precisely the votes under scrutiny from silent peers.

use std::sync::Arc;
use std::time::Duration;

use accord_engine::{Config, ItemApi, ItemNotification, Ledger, LoopbackNetwork, Network};
use accord_types::{now_secs, Approvable, ErrorCode, HashId, ItemResult, ItemState, NodeInfo};

use crate::fixtures::{Cluster, SoloCluster, TestItem};

fn scenario_config() -> Config {
    Config {
        positive_consensus: 3,
        negative_consensus: 2,
        poll_time: Duration::from_millis(100),
        ..Config::default()
    }
}

fn vote(from: u32, item_id: HashId, state: ItemState, have_copy: bool) -> ItemNotification {
    ItemNotification::new(
        NodeInfo::new(from),
        item_id,
        ItemResult {
            state,
            expires_at: now_secs() + 3600,
            have_copy,
        },
        true,
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn happy_path_converges_on_every_node() {
    // Fresh processors answer the first broadcast with PENDING, which
    // tallies as a negative vote until the peer checks and flips; the
    // negative threshold sits above the peer count so those transients
    // cannot decline the item.
    let cluster = Cluster::start(
        5,
        Config {
            positive_consensus: 3,
            negative_consensus: 6,
            poll_time: Duration::from_millis(100),
            ..Config::default()
        },
    );
    let output = TestItem::valid(b"x-output");
    let item = TestItem::with_new_item(b"x", output.clone());
    let a = cluster.node(1);
    cluster.hub.hold_item(&a.info, item.clone());

    a.node.register_item(item.clone()).await.unwrap();

    for peer in &cluster.nodes {
        let result = peer
            .node
            .wait_item(&item.id(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            result.state,
            ItemState::Approved,
            "{} did not converge",
            peer.info
        );
        let record = peer.ledger.get_record(&item.id()).unwrap().unwrap();
        assert_eq!(record.state, ItemState::Approved);
        let output_record = peer.ledger.get_record(&output.id()).unwrap().unwrap();
        assert_eq!(output_record.state, ItemState::Approved);
        assert!(!output_record.is_locked());
    }
}

#[tokio::test(start_paused = true)]
async fn negative_quorum_declines_without_touching_dependents() {
    let cluster = SoloCluster::start(5, scenario_config());
    let unknown = HashId::of(b"u-unknown");
    let item = TestItem::with_reference(b"y", unknown.clone());
    let a = &cluster.live;

    a.node.register_item(item.clone()).await.unwrap();
    settle().await; // local check votes negative: 1 of 2

    cluster.peer(2).deliver(
        &a.info,
        vote(2, item.id(), ItemState::PendingNegative, false),
    );
    let result = a
        .node
        .wait_item(&item.id(), Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(result.state, ItemState::Declined);
    assert!(item.has_error(ErrorCode::BadRef));
    let record = a.ledger.get_record(&item.id()).unwrap().unwrap();
    assert_eq!(record.state, ItemState::Declined);
    assert!(a.ledger.get_record(&unknown).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn vote_flip_counts_the_latest_side_only() {
    let cluster = SoloCluster::start(5, scenario_config());
    let item = TestItem::valid(b"z");
    let a = &cluster.live;

    a.node.register_item(item.clone()).await.unwrap();
    settle().await; // positive = {A}

    let b = cluster.peer(2);
    b.deliver(&a.info, vote(2, item.id(), ItemState::PendingPositive, false));
    settle().await; // positive = {A, B}
    b.deliver(&a.info, vote(2, item.id(), ItemState::PendingNegative, false));
    settle().await; // positive = {A}, negative = {B}: no quorum either way

    let pending = a.node.check_item(&item.id()).await.unwrap();
    assert_eq!(pending.state, ItemState::PendingPositive);

    cluster.peer(3).deliver(
        &a.info,
        vote(3, item.id(), ItemState::PendingPositive, false),
    );
    settle().await; // positive = {A, C}
    cluster.peer(4).deliver(
        &a.info,
        vote(4, item.id(), ItemState::PendingPositive, false),
    );

    let result = a
        .node
        .wait_item(&item.id(), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(result.state, ItemState::Approved);
}

#[tokio::test(start_paused = true)]
async fn positive_quorum_without_a_body_downloads_then_commits() {
    let cluster = SoloCluster::start(5, scenario_config());
    let item = TestItem::valid(b"never-seen");
    let a = &cluster.live;

    // Three copies-elsewhere votes approve an item this node has no body
    // for; the local vote never happens because the check needs the body.
    for peer in [2u32, 3, 4] {
        cluster.peer(peer).deliver(
            &a.info,
            vote(peer, item.id(), ItemState::PendingPositive, true),
        );
        settle().await;
    }

    // Quorum is reached; the commit is stuck re-downloading. Only now does
    // a peer actually serve the body.
    cluster.hub.hold_item(&NodeInfo::new(2), item.clone());

    let result = a
        .node
        .wait_item(&item.id(), Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(result.state, ItemState::Approved);
    assert!(result.have_copy);
    let record = a.ledger.get_record(&item.id()).unwrap().unwrap();
    assert_eq!(record.state, ItemState::Approved);
}

#[tokio::test(start_paused = true)]
async fn approval_without_any_body_destroys_the_record() {
    let cluster = SoloCluster::start(
        5,
        Config {
            max_download_on_approve_time: Duration::from_secs(2),
            ..scenario_config()
        },
    );
    let item = TestItem::valid(b"vapor");
    let a = &cluster.live;

    for peer in [2u32, 3, 4] {
        cluster.peer(peer).deliver(
            &a.info,
            vote(peer, item.id(), ItemState::PendingPositive, true),
        );
        settle().await;
    }
    // Nobody ever serves the body; the approval window elapses.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let result = a
        .node
        .wait_item(&item.id(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.state, ItemState::Undefined);
    assert!(a.ledger.get_record(&item.id()).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn silent_network_expires_the_election() {
    let cluster = SoloCluster::start(
        5,
        Config {
            max_cache_age: Duration::from_secs(5),
            ..scenario_config()
        },
    );
    let item = TestItem::valid(b"w");
    let a = &cluster.live;

    a.node.register_item(item.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(7)).await;

    let result = a
        .node
        .wait_item(&item.id(), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(result.state, ItemState::Undefined);
    let record = a.ledger.get_record(&item.id()).unwrap().unwrap();
    assert_eq!(record.state, ItemState::Undefined);
}

#[tokio::test(start_paused = true)]
async fn concurrent_revokes_of_one_item_find_a_single_winner() {
    let cluster = SoloCluster::start(5, scenario_config());
    let a = &cluster.live;
    let prior = TestItem::valid(b"r");
    let mut record = a.ledger.find_or_create(&prior.id()).unwrap();
    record.set_state(ItemState::Approved);
    a.ledger.save(&record).unwrap();

    let p = TestItem::revoking(b"p", prior.clone());
    let q = TestItem::revoking(b"q", prior.clone());
    let (p_result, q_result) = tokio::join!(
        a.node.register_item(p.clone()),
        a.node.register_item(q.clone())
    );
    p_result.unwrap();
    q_result.unwrap();
    settle().await;

    let p_state = a.ledger.get_record(&p.id()).unwrap().unwrap().state;
    let q_state = a.ledger.get_record(&q.id()).unwrap().unwrap().state;
    let states = [p_state, q_state];
    assert!(states.contains(&ItemState::PendingPositive));
    assert!(states.contains(&ItemState::PendingNegative));
    assert!(p.has_error(ErrorCode::BadRevoke) ^ q.has_error(ErrorCode::BadRevoke));

    // The target stays approved, locked by the winner, until that election
    // terminates.
    let prior_record = a.ledger.get_record(&prior.id()).unwrap().unwrap();
    assert_eq!(prior_record.state, ItemState::Approved);
    assert!(prior_record.is_locked());
}

#[tokio::test(start_paused = true)]
async fn approved_elsewhere_answers_immediately_from_the_ledger() {
    // Node A approves the item; node B shares the ledger (state already
    // replicated) but has never seen the item.
    let hub_a = accord_engine::NetworkHub::new();
    let info_a = NodeInfo::new(1);
    let ledger = Arc::new(accord_engine::MemoryLedger::new());
    let node_a = accord_engine::Node::new(
        Config {
            positive_consensus: 1,
            negative_consensus: 1,
            ..Config::default()
        },
        info_a.clone(),
        ledger.clone(),
        LoopbackNetwork::connect(&hub_a, info_a.clone()),
    );
    let item = TestItem::valid(b"replicated");
    node_a.register_item(item.clone()).await.unwrap();
    let result = node_a
        .wait_item(&item.id(), Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(result.state, ItemState::Approved);

    let hub_b = accord_engine::NetworkHub::new();
    let info_b = NodeInfo::new(2);
    let node_b = accord_engine::Node::new(
        Config::default(),
        info_b.clone(),
        ledger.clone(),
        LoopbackNetwork::connect(&hub_b, info_b),
    );
    let result = node_b.check_item(&item.id()).await.unwrap();
    assert_eq!(result.state, ItemState::Approved);
    assert!(!result.have_copy);
}
