/// Shard store contract tests
///
/// Create / Update / Read semantics of the shard record store.
/// Run with: cargo test --test shard_store_tests

use chrono::{Duration, TimeZone, Utc};
use shardstore::{
    InMemoryShardStore, RangeId, ShardId, ShardRecord, ShardStore, StoreError, zero_time,
};

fn full_record(shard_id: i32) -> ShardRecord {
    let mut record = ShardRecord::new(ShardId(shard_id), "host-a", RangeId(17));
    record.stolen_since_renew = 2;
    record.updated_at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
        + Duration::nanoseconds(987_654_321);
    record.replication_ack_level = 1_000;
    record.transfer_ack_level = 2_000;
    record.timer_ack_level = Utc.with_ymd_and_hms(2024, 2, 29, 23, 0, 0).unwrap()
        + Duration::microseconds(15);
    record
        .cluster_transfer_ack_level
        .insert("east".to_string(), 1_990);
    record
        .cluster_transfer_ack_level
        .insert("west".to_string(), 1_500);
    record.cluster_timer_ack_level.insert(
        "east".to_string(),
        Utc.with_ymd_and_hms(2024, 2, 29, 22, 30, 0).unwrap(),
    );
    record
        .cluster_timer_ack_level
        .insert("west".to_string(), zero_time());
    record.domain_notification_version = 42;
    record
}

#[tokio::test]
async fn test_create_then_read_round_trips_every_field() {
    let store = InMemoryShardStore::new();
    let record = full_record(3);

    store.create(&record).await.unwrap();
    let read = store.read(ShardId(3)).await.unwrap();

    assert_eq!(read, record);
    assert_eq!(read.transfer_ack_level_for("west"), Some(1_500));
    assert_eq!(read.timer_ack_level_for("west"), Some(zero_time()));
}

#[tokio::test]
async fn test_zero_timestamps_round_trip() {
    let store = InMemoryShardStore::new();
    let record = ShardRecord::new(ShardId(1), "host-a", RangeId(1));

    store.create(&record).await.unwrap();
    let read = store.read(ShardId(1)).await.unwrap();

    assert_eq!(read.updated_at, zero_time());
    assert_eq!(read.timer_ack_level, zero_time());
    assert_eq!(read, record);
}

#[tokio::test]
async fn test_second_create_fails_with_duplicate_key() {
    let store = InMemoryShardStore::new();
    store.create(&full_record(1)).await.unwrap();

    let mut other = full_record(1);
    other.owner = "host-b".to_string();
    let err = store.create(&other).await.unwrap_err();

    assert_eq!(err, StoreError::DuplicateKey(ShardId(1)));
    assert_eq!(store.read(ShardId(1)).await.unwrap().owner, "host-a");
    assert_eq!(store.row_count().await, 1);
}

#[tokio::test]
async fn test_duplicate_inside_one_transaction() {
    let store = InMemoryShardStore::new();
    let mut txn = store.begin().await.unwrap();
    store.insert_shard(&mut txn, &full_record(5)).await.unwrap();

    let err = store.insert_shard(&mut txn, &full_record(5)).await.unwrap_err();
    assert_eq!(err, StoreError::DuplicateKey(ShardId(5)));
}

#[tokio::test]
async fn test_update_overwrites_every_field() {
    let store = InMemoryShardStore::new();
    store.create(&full_record(1)).await.unwrap();

    let replacement = ShardRecord::new(ShardId(1), "host-b", RangeId(18));
    store.update(&replacement).await.unwrap();

    let read = store.read(ShardId(1)).await.unwrap();
    assert_eq!(read, replacement);
    assert!(read.cluster_transfer_ack_level.is_empty());
}

#[tokio::test]
async fn test_update_missing_shard_fails_and_leaves_no_row() {
    let store = InMemoryShardStore::new();

    let err = store.update(&full_record(9)).await.unwrap_err();

    assert_eq!(err, StoreError::NotFound(ShardId(9)));
    assert_eq!(store.row_count().await, 0);
    assert_eq!(
        store.read(ShardId(9)).await.unwrap_err(),
        StoreError::NotFound(ShardId(9))
    );
}

#[tokio::test]
async fn test_locks_on_missing_shard_report_not_found() {
    let store = InMemoryShardStore::new();
    let mut txn = store.begin().await.unwrap();

    assert_eq!(
        store.read_lock_shard(&mut txn, ShardId(4)).await.unwrap_err(),
        StoreError::NotFound(ShardId(4))
    );
    assert_eq!(
        store.write_lock_shard(&mut txn, ShardId(4)).await.unwrap_err(),
        StoreError::NotFound(ShardId(4))
    );
    assert_eq!(
        store.read_lock_shard(&mut txn, ShardId(4)).await.unwrap_err(),
        StoreError::NotFound(ShardId(4))
    );
    assert_eq!(txn.held_lock_count(), 0);
}

#[tokio::test]
async fn test_unstorable_timestamp_is_refused_before_anything_is_written() {
    let store = InMemoryShardStore::new();
    let mut record = full_record(1);
    record.updated_at = Utc.with_ymd_and_hms(900, 1, 1, 0, 0, 0).unwrap();

    let err = store.create(&record).await.unwrap_err();

    assert!(matches!(err, StoreError::Codec(_)));
    assert_eq!(store.row_count().await, 0);
}

#[tokio::test]
async fn test_handoff_scenario() {
    let store = InMemoryShardStore::new();
    store
        .create(&ShardRecord::new(ShardId(1), "A", RangeId(5)))
        .await
        .unwrap();

    // Process B takes the shard
    let mut txn = store.begin().await.unwrap();
    let observed = store.write_lock_shard(&mut txn, ShardId(1)).await.unwrap();
    assert_eq!(observed, RangeId(5));

    let mut record = store.select_shard(&txn, ShardId(1)).await.unwrap();
    record.owner = "B".to_string();
    record.range_id = RangeId(6);
    store.update_shard(&mut txn, &record).await.unwrap();

    // Not visible to others until commit
    assert_eq!(store.read(ShardId(1)).await.unwrap().owner, "A");
    store.commit(txn).await.unwrap();

    let read = store.read(ShardId(1)).await.unwrap();
    assert_eq!(read.owner, "B");
    assert_eq!(read.range_id, RangeId(6));
}

#[tokio::test]
async fn test_empty_commit_is_counted() {
    let store = InMemoryShardStore::new();
    store.create(&full_record(1)).await.unwrap();

    let txn = store.begin().await.unwrap();
    store.commit(txn).await.unwrap();

    let stats = store.transaction_stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.committed, 2);
}
