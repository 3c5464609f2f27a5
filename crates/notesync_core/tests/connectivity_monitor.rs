mod common;

use common::{harness, harness_with_remote};
use notesync_core::{RemoteConfig, RemoteOp, StaticProbe, SyncStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn going_online_starts_exactly_one_pass() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();

    let report = h
        .service
        .set_connectivity(true)
        .expect("pass should start")
        .await
        .unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(h.service.monitor().passes_started(), 1);
    assert!(!h.service.monitor().is_pass_in_flight());
    assert_eq!(h.status_in_memory(record.id), SyncStatus::Synced);
}

#[tokio::test]
async fn reconnect_retries_records_left_in_error() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();
    h.remote.fail_writes_for(record.id);
    h.go_online().await;
    assert_eq!(h.status_in_memory(record.id), SyncStatus::Error);

    h.go_offline();
    h.remote.clear_faults();
    h.go_online().await;

    assert_eq!(h.status_in_memory(record.id), SyncStatus::Synced);
    assert_eq!(h.service.monitor().passes_started(), 2);
}

#[tokio::test]
async fn going_offline_never_starts_a_pass() {
    let h = harness();
    h.service.create_record().await.unwrap();

    assert!(h.service.set_connectivity(false).is_none());

    assert_eq!(h.service.monitor().passes_started(), 0);
    assert!(!h.service.snapshot().is_online);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn triggers_during_a_running_pass_are_dropped() {
    let h = harness_with_remote(RemoteConfig {
        latency_ms: 0,
        write_latency_ms: 1_000,
        failure_rate: 0.0,
    });
    h.service.create_record().await.unwrap();
    let pass = h.service.set_connectivity(true).expect("pass should start");
    let monitor = h.service.monitor();

    assert!(monitor.is_pass_in_flight());
    assert!(monitor.trigger_pass().is_none());
    assert!(h.service.set_connectivity(true).is_none());
    assert!(h.service.sync_all().await.is_none());
    assert_eq!(monitor.triggers_dropped(), 3);

    let report = pass.await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(monitor.passes_started(), 1);
    assert!(!monitor.is_pass_in_flight());
    assert_eq!(h.remote.calls_of(RemoteOp::Create).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn monitor_loop_follows_probe_and_notifications() {
    let h = harness();
    let record = h.service.create_record().await.unwrap();
    let probe = Arc::new(StaticProbe::new(true));

    let (handle, task) = h.service.start_monitor(probe.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(h.service.snapshot().is_online);
    assert_eq!(h.status_in_memory(record.id), SyncStatus::Synced);

    probe.set_online(false);
    tokio::time::sleep(h.service.config().poll_interval()).await;
    assert!(!h.service.snapshot().is_online);

    let edited = h.service.update_record(record.id, "offline", "").await.unwrap();
    assert_eq!(edited.sync_status, SyncStatus::Unsynced);

    assert!(handle.notify(true));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(h.service.snapshot().is_online);
    assert_eq!(h.status_in_memory(record.id), SyncStatus::Synced);
    assert_eq!(h.remote.records()[0].title, "offline");

    assert!(handle.shutdown());
    task.await.unwrap();
    assert!(!handle.notify(false));
}
