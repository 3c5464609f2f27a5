//! Records schema upgrades keyed by `PRAGMA user_version`.
//!
//! Steps run in one transaction: either the database reaches the latest
//! version or it stays where it was.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};
use std::time::Instant;

/// One schema step; `version` is the value `user_version` holds afterwards.
#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    sql: include_str!("0001_records.sql"),
}];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the records schema up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    upgrade(conn, SCHEMA_STEPS)
}

fn upgrade(conn: &mut Connection, steps: &[SchemaStep]) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let target = steps.last().map_or(0, |step| step.version);

    if found > target {
        error!(
            "event=db_migrate module=db status=error from={found} to={target} error_code=schema_too_new"
        );
        return Err(DbError::SchemaTooNew {
            found,
            supported: target,
        });
    }
    if found == target {
        return Ok(());
    }

    let started_at = Instant::now();
    info!("event=db_migrate module=db status=start from={found} to={target}");

    let tx = conn.transaction()?;
    for step in steps.iter().filter(|step| step.version > found) {
        if let Err(source) = run_step(&tx, step) {
            error!(
                "event=db_migrate module=db status=error from={found} to={} duration_ms={} error_code=migration_failed error={source}",
                step.version,
                started_at.elapsed().as_millis()
            );
            return Err(DbError::Migration {
                version: step.version,
                source,
            });
        }
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={found} to={target} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(())
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> rusqlite::Result<()> {
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)
}

#[cfg(test)]
mod tests {
    use super::{upgrade, SchemaStep, SCHEMA_STEPS};
    use crate::db::DbError;
    use rusqlite::Connection;

    fn user_version(conn: &Connection) -> u32 {
        conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn broken_step_rolls_back_every_step_of_the_upgrade() {
        let mut conn = Connection::open_in_memory().unwrap();
        let steps = [
            SCHEMA_STEPS[0],
            SchemaStep {
                version: 2,
                sql: "ALTER TABLE missing_table ADD COLUMN x TEXT;",
            },
        ];

        let err = upgrade(&mut conn, &steps).unwrap_err();

        assert!(matches!(err, DbError::Migration { version: 2, .. }));
        assert_eq!(err.code(), "migration_failed");
        assert_eq!(user_version(&conn), 0);
        let records_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'records';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(records_tables, 0);
    }

    #[test]
    fn upgrade_resumes_from_the_recorded_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        upgrade(&mut conn, &SCHEMA_STEPS[..1]).unwrap();
        assert_eq!(user_version(&conn), 1);

        let steps = [
            SCHEMA_STEPS[0],
            SchemaStep {
                version: 2,
                sql: "CREATE TABLE extra (id TEXT PRIMARY KEY);",
            },
        ];
        upgrade(&mut conn, &steps).unwrap();
        assert_eq!(user_version(&conn), 2);
    }
}
