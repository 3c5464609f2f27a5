mod common;

use common::harness;
use notesync_core::{
    Record, RecordRepository, RecordServiceError, RemoteOp, StoreError, SyncStatus,
    DEFAULT_RECORD_TITLE,
};
use uuid::Uuid;

#[tokio::test]
async fn create_while_online_syncs_with_one_create_call() {
    let h = harness();
    h.go_online().await;

    let record = h.service.create_record().await.unwrap();

    assert_eq!(record.title, DEFAULT_RECORD_TITLE);
    assert_eq!(record.sync_status, SyncStatus::Synced);
    assert_eq!(h.remote.calls_of(RemoteOp::Create).len(), 1);
    assert_eq!(h.status_on_disk(record.id), SyncStatus::Synced);
    assert_eq!(h.service.snapshot().selected_id, Some(record.id));
}

#[tokio::test]
async fn offline_edit_stays_unsynced_until_connectivity_returns() {
    let h = harness();
    h.go_online().await;
    let record = h.service.create_record().await.unwrap();
    h.go_offline();
    h.remote.clear_calls();

    let edited = h
        .service
        .update_record(record.id, "Groceries", "milk, eggs")
        .await
        .unwrap();

    assert_eq!(edited.sync_status, SyncStatus::Unsynced);
    assert_eq!(h.status_on_disk(record.id), SyncStatus::Unsynced);
    assert!(h.remote.calls().is_empty());

    h.go_online().await;

    assert_eq!(h.status_in_memory(record.id), SyncStatus::Synced);
    assert_eq!(h.remote.calls_of(RemoteOp::Update).len(), 1);
    assert!(h.remote.calls_of(RemoteOp::Create).is_empty());
    assert_eq!(h.remote.records()[0].title, "Groceries");
}

#[tokio::test]
async fn delete_completes_locally_even_when_remote_delete_fails() {
    let h = harness();
    h.go_online().await;
    let record = h.service.create_record().await.unwrap();
    h.remote.fail_next(RemoteOp::Delete, 1);

    h.service.delete_record(record.id).await.unwrap();

    assert!(h.local.get(record.id).unwrap().is_none());
    let state = h.service.snapshot();
    assert!(state.records.is_empty());
    assert_eq!(state.selected_id, None);
    assert_eq!(h.remote.calls_of(RemoteOp::Delete).len(), 1);
    assert_eq!(h.remote.records().len(), 1);
}

#[tokio::test]
async fn delete_while_offline_never_contacts_remote() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();

    h.service.delete_record(record.id).await.unwrap();

    assert!(h.remote.calls().is_empty());
    assert!(h.service.snapshot().records.is_empty());
}

#[tokio::test]
async fn persisted_records_match_in_memory_records_after_mutations() {
    let h = harness();
    let first = h.service.create_record().await.unwrap();
    let second = h.service.create_record().await.unwrap();
    h.service.create_record().await.unwrap();
    h.service.update_record(first.id, "one", "").await.unwrap();
    h.service.delete_record(second.id).await.unwrap();
    h.go_online().await;
    h.service.update_record(first.id, "one again", "").await.unwrap();

    let mut on_disk = h.local.get_all().unwrap();
    let mut in_memory = h.service.snapshot().records;
    on_disk.sort_by_key(|record| record.id);
    in_memory.sort_by_key(|record| record.id);
    assert_eq!(on_disk, in_memory);
}

#[tokio::test]
async fn updated_at_never_moves_backwards_under_clock_skew() {
    let h = harness();
    h.clock.set(10_000);
    let record = h.service.create_record().await.unwrap();

    h.clock.set(4_000);
    let edited = h.service.update_record(record.id, "skewed", "").await.unwrap();

    assert_eq!(edited.updated_at, 10_000);
    assert!(edited.updated_at >= edited.created_at);
}

#[tokio::test]
async fn failed_create_leaves_state_untouched() {
    let h = harness();
    h.local.set_fail_writes(true);
    let before = h.service.snapshot();

    let err = h.service.create_record().await.unwrap_err();

    assert!(matches!(err, RecordServiceError::Store(StoreError::Storage(_))));
    assert_eq!(h.service.snapshot(), before);
}

#[tokio::test]
async fn failed_update_keeps_previous_content_in_memory() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();
    h.local.set_fail_writes(true);

    let err = h
        .service
        .update_record(record.id, "lost", "edit")
        .await
        .unwrap_err();

    assert!(matches!(err, RecordServiceError::Store(_)));
    let state = h.service.snapshot();
    assert_eq!(state.record(record.id), Some(&record));
}

#[tokio::test]
async fn failed_delete_keeps_record_in_memory() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();
    h.local.set_fail_writes(true);

    assert!(h.service.delete_record(record.id).await.is_err());
    assert!(h.service.snapshot().record(record.id).is_some());
    assert!(h.local.get(record.id).unwrap().is_some());
}

#[tokio::test]
async fn update_of_unknown_record_is_rejected() {
    let h = harness();
    let id = Uuid::new_v4();

    let err = h.service.update_record(id, "t", "b").await.unwrap_err();

    assert!(matches!(err, RecordServiceError::RecordNotFound(missing) if missing == id));
    assert!(h.local.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn load_publishes_persisted_records() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();
    h.service.delete_record(record.id).await.unwrap();
    let persisted = Record::new(42).apply_content("kept", "on disk", 43);
    h.local.add(&persisted).unwrap();

    let count = h.service.load().unwrap();

    assert_eq!(count, 1);
    assert_eq!(h.service.snapshot().records, vec![persisted]);
}

#[tokio::test]
async fn search_and_selection_drive_visible_records() {
    let h = harness();
    let shopping = h.service.create_record().await.unwrap();
    h.clock.advance(5);
    let travel = h.service.create_record().await.unwrap();
    h.service
        .update_record(shopping.id, "Shopping", "buy Milk")
        .await
        .unwrap();
    h.service
        .update_record(travel.id, "Travel", "pack bags")
        .await
        .unwrap();

    h.service.set_search_query("milk");
    let state = h.service.snapshot();
    let visible: Vec<_> = state.visible_records().iter().map(|r| r.id).collect();
    assert_eq!(visible, vec![shopping.id]);

    h.service.select_record(Some(shopping.id));
    assert_eq!(
        h.service.snapshot().selected_record().map(|r| r.title.as_str()),
        Some("Shopping")
    );
    h.service.select_record(None);
    assert!(h.service.snapshot().selected_record().is_none());
}

#[tokio::test]
async fn subscribers_observe_committed_mutations() {
    let h = harness();
    let mut updates = h.service.subscribe();

    let record = h.service.create_record().await.unwrap();

    assert!(updates.has_changed().unwrap());
    assert!(updates.borrow_and_update().record(record.id).is_some());
}

#[tokio::test]
async fn load_resets_records_interrupted_mid_sync() {
    let h = harness();
    let interrupted = Record::new(1).with_status(SyncStatus::Syncing);
    h.local.add(&interrupted).unwrap();

    h.service.load().unwrap();

    assert_eq!(h.status_in_memory(interrupted.id), SyncStatus::Unsynced);
    assert_eq!(h.status_on_disk(interrupted.id), SyncStatus::Unsynced);

    h.go_online().await;

    assert_eq!(h.status_in_memory(interrupted.id), SyncStatus::Synced);
    assert_eq!(h.status_on_disk(interrupted.id), SyncStatus::Synced);
    assert_eq!(h.remote.calls_of(RemoteOp::Create).len(), 1);
}

#[tokio::test]
async fn load_fails_without_publishing_when_recovery_cannot_be_persisted() {
    let h = harness();
    h.local
        .add(&Record::new(1).with_status(SyncStatus::Syncing))
        .unwrap();
    h.local.set_fail_status_updates(true);

    let err = h.service.load().unwrap_err();

    assert!(matches!(err, RecordServiceError::Store(_)));
    assert!(h.service.snapshot().records.is_empty());
}
