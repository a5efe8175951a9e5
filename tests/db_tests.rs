mod common;

use chrono::Duration;
use musicelo_engine::{
    config::EngineConfig,
    database::db::DbClient,
    model::{
        clock::{Clock, ManualClock},
        comparison_service::ComparisonService,
        parameters::ParameterValues,
        structures::{
            comparison::Comparison,
            outcome_level::OutcomeLevel,
            passive_event::{PassiveEventDetails, PassiveEventKind},
            relationship_kind::RelationshipKind
        }
    },
    utils::test_utils::{generate_context, generate_service, test_epoch}
};
use serial_test::serial;

use common::{init_test_env, test_database::TestDatabase};

async fn connect(test_db: &TestDatabase) -> DbClient {
    let client = DbClient::connect(&test_db.connection_string)
        .await
        .expect("Failed to connect");
    client.ensure_schema().await.expect("Failed to create schema");
    client
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_empty_database_loads_empty_snapshot() {
    init_test_env();
    let test_db = TestDatabase::new();
    let client = connect(&test_db).await;

    // Running the schema twice must be harmless
    client.ensure_schema().await.expect("Failed to re-run schema");

    let snapshot = client.load_snapshot().await.expect("Failed to load snapshot");
    assert!(snapshot.is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_snapshot_round_trip() {
    init_test_env();
    let test_db = TestDatabase::new();
    let mut client = connect(&test_db).await;

    let service = generate_service(4);
    service.link_as_canonical_alias(4, 3).unwrap();
    service
        .link_other_relationship(1, 2, RelationshipKind::Acoustic)
        .unwrap();
    let first = service
        .record_comparison(1, 2, OutcomeLevel::SlightA, generate_context("duel"))
        .unwrap();
    service
        .record_comparison(4, 1, OutcomeLevel::StrongB, generate_context("duel"))
        .unwrap();
    service
        .revote(first.id, OutcomeLevel::Tie, generate_context("revote"))
        .unwrap();
    service
        .record_passive_event(4, PassiveEventDetails::new(PassiveEventKind::Skip))
        .unwrap();
    service
        .rotate_parameters(
            ParameterValues {
                system_constant: 0.3,
                ..ParameterValues::default()
            },
            "calmer volatility"
        )
        .unwrap();

    let snapshot = service.snapshot().unwrap();
    client.save_snapshot(&snapshot).await.expect("Failed to save snapshot");

    let loaded = client.load_snapshot().await.expect("Failed to load snapshot");
    assert_eq!(loaded, snapshot);

    let restored = ComparisonService::from_snapshot(loaded, EngineConfig::default(), ManualClock::new(test_epoch()))
        .expect("Failed to restore engine");
    assert!(restored.verify().unwrap().is_consistent());
    assert_eq!(restored.get_rating(4).unwrap().item_id, 3);
    assert_eq!(restored.active_parameters().unwrap().id, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_save_updates_previous_state() {
    init_test_env();
    let test_db = TestDatabase::new();
    let mut client = connect(&test_db).await;

    let service = generate_service(3);
    let comparison = service
        .record_comparison(1, 2, OutcomeLevel::StrongA, generate_context("duel"))
        .unwrap();
    client.save_snapshot(&service.snapshot().unwrap()).await.unwrap();

    service.clock().advance(Duration::seconds(2));
    service.undo(comparison.id, service.clock().now()).unwrap();
    service
        .record_comparison(2, 3, OutcomeLevel::SlightB, generate_context("duel"))
        .unwrap();
    client.save_snapshot(&service.snapshot().unwrap()).await.unwrap();

    let loaded = client.load_snapshot().await.unwrap();
    assert_eq!(loaded.comparisons.len(), 2);
    assert!(!loaded.comparisons[0].is_valid);
    assert_eq!(loaded.comparisons[0].invalidated_at, Some(test_epoch() + Duration::seconds(2)));
    assert_eq!(loaded, service.snapshot().unwrap());
}

/// One CLI-style cycle: lock, load, record, save, unlock
async fn record_under_lock(client: &mut DbClient, item_a: i64, item_b: i64) -> Comparison {
    client.lock_state().await.expect("Failed to take state lock");
    let snapshot = client.load_snapshot().await.expect("Failed to load snapshot");
    let service = ComparisonService::from_snapshot(snapshot, EngineConfig::default(), ManualClock::new(test_epoch()))
        .expect("Failed to restore engine");

    // Give the other client a chance to interleave
    tokio::task::yield_now().await;

    let comparison = service
        .record_comparison(item_a, item_b, OutcomeLevel::StrongA, generate_context("duel"))
        .unwrap();
    client.save_snapshot(&service.snapshot().unwrap()).await.unwrap();
    client.unlock_state().await.unwrap();
    comparison
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_concurrent_clients_keep_both_comparisons() {
    init_test_env();
    let test_db = TestDatabase::new();
    let mut seed_client = connect(&test_db).await;
    seed_client
        .save_snapshot(&generate_service(4).snapshot().unwrap())
        .await
        .unwrap();

    let mut first_client = connect(&test_db).await;
    let mut second_client = connect(&test_db).await;
    let (first, second) = tokio::join!(
        record_under_lock(&mut first_client, 1, 2),
        record_under_lock(&mut second_client, 3, 4)
    );

    let mut ids = vec![first.id, second.id];
    ids.sort();
    assert_eq!(ids, vec![1, 2]);

    let loaded = seed_client.load_snapshot().await.unwrap();
    assert_eq!(loaded.comparisons.len(), 2);

    let restored = ComparisonService::from_snapshot(loaded, EngineConfig::default(), ManualClock::new(test_epoch()))
        .expect("Failed to restore engine");
    for item in 1..=4 {
        assert_eq!(restored.get_rating(item).unwrap().comparisons, 1);
    }
    assert!(restored.get_rating(1).unwrap().state.rating > 1500.0);
    assert!(restored.get_rating(3).unwrap().state.rating > 1500.0);
    assert!(restored.verify().unwrap().is_consistent());
}

#[tokio::test]
#[serial]
#[ignore = "requires a Docker daemon"]
async fn test_save_never_deletes_comparisons() {
    init_test_env();
    let test_db = TestDatabase::new();
    let mut client = connect(&test_db).await;

    let service = generate_service(2);
    client.save_snapshot(&service.snapshot().unwrap()).await.unwrap();
    let stale = service.snapshot().unwrap();

    service
        .record_comparison(1, 2, OutcomeLevel::Tie, generate_context("duel"))
        .unwrap();
    client.save_snapshot(&service.snapshot().unwrap()).await.unwrap();

    // A snapshot taken before the comparison leaves the stored row alone
    client.save_snapshot(&stale).await.unwrap();
    let loaded = client.load_snapshot().await.unwrap();
    assert_eq!(loaded.comparisons.len(), 1);
    assert!(loaded.comparisons[0].is_valid);
}
