use hhm_core::codec::{ColumnFamilyUpdate, Mutation};
use hhm_core::collaborators::AckOutcome;
use hhm_core::manager::HintedHandoffManager;
use hhm_core::session::{AbortReason, DeliverySession, Outcome};
use hhm_core::store::RocksDbHintStore;
use hhm_core::testing::{FakeFailureDetector, FakeGossip, FakeMembership, FakeRpc};
use hhm_core::types::Endpoint;
use hhm_utils::config::{Config, Env};
use hhm_utils::dirs::HhmDirs;
use std::sync::Arc;
use uuid::Uuid;

fn test_config(data_dir: &std::path::Path) -> Config {
    test_config_with_limit(data_dir, 16 * 1024 * 1024)
}

fn test_config_with_limit(data_dir: &std::path::Path, in_memory_compaction_limit: usize) -> Config {
    Config {
        env: Env::Dev,
        log_level: log::LevelFilter::Off,
        hhm_dirs: HhmDirs::new(data_dir.to_path_buf()),
        management_listen_ip: "127.0.0.1".to_string(),
        management_port: 7199,
        allowed_origins: vec![],
        max_hint_threads: 2,
        max_hint_ttl_seconds: 3600,
        hinted_handoff_throttle_kb: 0,
        in_memory_compaction_limit,
        tombstone_warn_threshold: 1000,
        ring_delay_ms: 10,
    }
}

fn sample_mutation(family: &str) -> Mutation {
    Mutation {
        partition_key: vec![7, 7],
        column_families: vec![ColumnFamilyUpdate {
            name: family.to_string(),
            grace_window_secs: 600,
            payload: vec![1, 2, 3],
        }],
    }
}

fn two_family_mutation() -> Mutation {
    Mutation {
        partition_key: vec![7, 7],
        column_families: vec![
            ColumnFamilyUpdate {
                name: "a".to_string(),
                grace_window_secs: 600,
                payload: vec![1, 2, 3],
            },
            ColumnFamilyUpdate {
                name: "b".to_string(),
                grace_window_secs: 600,
                payload: vec![4, 5, 6],
            },
        ],
    }
}

struct Harness {
    manager: HintedHandoffManager,
    membership: Arc<FakeMembership>,
    failure_detector: Arc<FakeFailureDetector>,
    gossip: Arc<FakeGossip>,
    rpc: Arc<FakeRpc>,
    _tmp: tempfile::TempDir,
}

fn build_harness() -> Harness {
    build_harness_with_config(|dir| test_config(dir))
}

/// Same as [`build_harness`] but with a page size small enough to force
/// `compute_page_size` to clamp to its floor, so a single page never covers
/// more than two hints.
fn build_harness_with_tiny_pages() -> Harness {
    build_harness_with_config(|dir| test_config_with_limit(dir, 1))
}

fn build_harness_with_config(config: impl FnOnce(&std::path::Path) -> Config) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(RocksDbHintStore::open(tmp.path().join("hints")).unwrap());
    let membership = Arc::new(FakeMembership::new(2));
    let failure_detector = Arc::new(FakeFailureDetector::new());
    let gossip = Arc::new(FakeGossip::new(1));
    let rpc = Arc::new(FakeRpc::new());

    let manager = HintedHandoffManager::new(
        config(tmp.path()),
        store,
        rpc.clone(),
        membership.clone(),
        failure_detector.clone(),
        gossip.clone(),
    );

    Harness {
        manager,
        membership,
        failure_detector,
        gossip,
        rpc,
        _tmp: tmp,
    }
}

#[tokio::test]
async fn delivers_and_removes_a_single_hint() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9042".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("cf1");

    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    match outcome {
        Outcome::Completed { replayed } => assert_eq!(replayed, 1),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(h.rpc.sent_count(&endpoint), 1);
    assert_eq!(h.manager.counters_for(target).hints_replayed, 1);
}

#[tokio::test]
async fn paused_session_aborts_before_paging() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9043".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("cf1");
    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    h.manager.pause();
    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::Paused,
            replayed: 0
        }
    ));
    assert_eq!(h.rpc.sent_count(&endpoint), 0);
}

#[tokio::test]
async fn missing_endpoint_aborts_preflight() {
    let h = build_harness();
    let target = Uuid::new_v4();
    // insert a hint but never register the target with membership
    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::PeerMissingFromGossip,
            ..
        }
    ));
}

#[tokio::test]
async fn write_timeout_aborts_without_deleting_the_hint() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9044".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("cf1");
    h.rpc.set_outcome(endpoint.clone(), AckOutcome::Timeout);

    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::WriteTimeout,
            replayed: 0
        }
    ));

    let pending = h.manager.list_pending_targets().await.unwrap();
    assert_eq!(pending, vec![target]);
}

#[tokio::test]
async fn unknown_column_family_is_dropped_without_replay() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9045".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    // register a different family so the known-families set is non-empty
    // but still excludes "ghost"
    h.gossip.add_known_family("cf1");

    h.manager.insert_hint(target, &sample_mutation("ghost")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    match outcome {
        Outcome::Completed { replayed } => assert_eq!(replayed, 0),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(h.rpc.sent_count(&endpoint), 0);
    assert_eq!(h.manager.counters_for(target).hints_dropped, 1);
}

#[tokio::test]
async fn dead_peer_aborts_preflight() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9046".to_string());

    h.membership.add(target, endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("cf1");
    // never marked alive

    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::PeerDead,
            replayed: 0
        }
    ));
}

#[tokio::test]
async fn pausing_mid_stream_stops_after_the_page_already_in_flight() {
    let h = build_harness_with_tiny_pages();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9047".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("cf1");

    for _ in 0..4 {
        h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();
    }

    let manager = h.manager.clone();
    h.rpc.call_after_nth_send(1, move || manager.pause());

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::Paused,
            replayed: 2
        }
    ));
    assert_eq!(h.manager.counters_for(target).hints_replayed, 2);

    let pending = h.manager.list_pending_targets().await.unwrap();
    assert_eq!(pending, vec![target]);
}

#[tokio::test]
async fn partially_truncated_mutation_delivers_only_the_surviving_family() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9048".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("a");
    h.gossip.add_known_family("b");
    // far in the future relative to any real writetime, so "a" is stripped
    // and "b", with no truncation recorded, survives
    h.gossip.set_truncation("a", 9_999_999_999_999);

    h.manager.insert_hint(target, &two_family_mutation()).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    match outcome {
        Outcome::Completed { replayed } => assert_eq!(replayed, 1),
        other => panic!("expected Completed, got {other:?}"),
    }

    let payloads = h.rpc.sent_payloads(&endpoint);
    assert_eq!(payloads.len(), 1);
    let known = std::collections::HashSet::from(["a".to_string(), "b".to_string()]);
    let decoded = hhm_core::codec::deserialize(&payloads[0], hhm_core::codec::CURRENT_VERSION, &known).unwrap();
    assert_eq!(decoded.column_families.len(), 1);
    assert_eq!(decoded.column_families[0].name, "b");
}

#[tokio::test]
async fn fully_truncated_mutation_is_deleted_without_dispatch() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9049".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    h.gossip.set_schema_state(endpoint.clone(), 1);
    h.gossip.add_known_family("a");
    h.gossip.add_known_family("b");
    h.gossip.set_truncation("a", 9_999_999_999_999);
    h.gossip.set_truncation("b", 9_999_999_999_999);

    h.manager.insert_hint(target, &two_family_mutation()).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    match outcome {
        Outcome::Completed { replayed } => assert_eq!(replayed, 0),
        other => panic!("expected Completed, got {other:?}"),
    }
    assert_eq!(h.rpc.sent_count(&endpoint), 0);
    assert_eq!(h.manager.counters_for(target).hints_dropped, 1);

    let pending = h.manager.list_pending_targets().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn schema_disagreement_times_out_and_leaves_the_hint_pending() {
    let h = build_harness();
    let target = Uuid::new_v4();
    let endpoint = Endpoint("127.0.0.1:9050".to_string());

    h.membership.add(target, endpoint.clone());
    h.failure_detector.mark_alive(endpoint.clone());
    // local schema version is 1 (FakeGossip::new(1) in build_harness); this
    // peer gossips a different version and never converges
    h.gossip.set_schema_state(endpoint.clone(), 2);
    h.gossip.add_known_family("cf1");

    h.manager.insert_hint(target, &sample_mutation("cf1")).await.unwrap();

    let outcome = DeliverySession::new(h.manager.inner(), target).run().await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Aborted {
            reason: AbortReason::SchemaTimeout,
            replayed: 0
        }
    ));

    let pending = h.manager.list_pending_targets().await.unwrap();
    assert_eq!(pending, vec![target]);
}
