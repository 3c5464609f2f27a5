//! Demo entry point.
//!
//! # Responsibility
//! - Wire the core against a SQLite file and the simulated remote mirror.
//! - Show one offline edit followed by an offline -> online reconciliation.

use notesync_core::db::open_db;
use notesync_core::{
    core_version, default_log_level, init_logging, EngineConfig, RecordService, RemoteConfig,
    SimulatedRemoteStore, SqliteRecordRepository,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_DB_FILE_NAME: &str = "notesync_demo.sqlite3";
const DEMO_LOG_DIR_NAME: &str = "notesync_logs";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DEMO_DB_FILE_NAME));

    if let Err(err) = run(db_path).await {
        eprintln!("notesync demo failed: {err}");
        std::process::exit(1);
    }
}

async fn run(db_path: PathBuf) -> Result<(), Box<dyn Error>> {
    println!("notesync_core version={}", core_version());
    println!("database={}", db_path.display());

    let log_dir = std::env::temp_dir().join(DEMO_LOG_DIR_NAME);
    match log_dir.to_str() {
        Some(log_dir) => init_logging(default_log_level(), log_dir)?,
        None => eprintln!("log directory is not valid utf-8; logging disabled"),
    }

    let config = EngineConfig {
        remote: RemoteConfig {
            latency_ms: 50,
            write_latency_ms: 80,
            ..RemoteConfig::default()
        },
        ..EngineConfig::default()
    };
    let local = Arc::new(SqliteRecordRepository::try_new(open_db(&db_path)?)?);
    let remote = Arc::new(SimulatedRemoteStore::new(config.remote.clone()));
    let service = RecordService::new(local, remote.clone(), config);

    println!("loaded={}", service.load()?);

    let record = service.create_record().await?;
    service
        .update_record(record.id, "Demo note", "written while offline")
        .await?;
    println!("offline edit status={}", service.snapshot().records[0].sync_status);

    if let Some(pass) = service.set_connectivity(true) {
        let report = pass.await?;
        println!(
            "pass attempted={} synced={} failed={}",
            report.attempted, report.synced, report.failed
        );
    }

    for record in service.snapshot().visible_records() {
        println!(
            "{} updated_at={} status={} title={}",
            record.id, record.updated_at, record.sync_status, record.title
        );
    }
    println!("remote mirror size={}", remote.records().len());
    Ok(())
}
