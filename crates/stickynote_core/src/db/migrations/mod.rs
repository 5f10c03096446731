//! Document-store schema versions.
//!
//! # Responsibility
//! - v1 (`0001_documents.sql`): one `documents` table holding every
//!   collection, keyed by `(collection, doc_id)`, with an autoincrement `seq`
//!   that fixes listing order to insertion order.
//! - Bring older database files up to the newest version in one transaction.
//!
//! # Invariants
//! - Steps are listed in ascending `version` order and never edited once
//!   released; schema changes add a new step.
//! - `PRAGMA user_version` always names the last step applied.
//! - A file written by a newer build is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "documents",
    sql: include_str!("0001_documents.sql"),
}];

/// Returns the schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Upgrades `conn` to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file is newer than this build.
/// - SQLite failures; the transaction is rolled back and the version is
///   left as it was.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if found > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: found,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = STEPS.iter().filter(|step| step.version > found).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    for step in pending {
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    Ok(())
}
