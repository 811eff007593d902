//! Document store migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations atomically, per attached database.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA <schema>.user_version`.
//! - Live-only migrations still advance the history database version, so both
//!   databases always report the same latest version.

use crate::db::{DbError, DbResult, HISTORY_SCHEMA, LIVE_SCHEMA};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Both,
    LiveOnly,
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    scope: Scope,
    /// SQL template; `{schema}` is replaced by the target schema name.
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        scope: Scope::Both,
        sql: include_str!("0001_documents.sql"),
    },
    Migration {
        version: 2,
        scope: Scope::LiveOnly,
        sql: include_str!("0002_natural_keys.sql"),
    },
    Migration {
        version: 3,
        scope: Scope::Both,
        sql: include_str!("0003_legacy_lifecycle.sql"),
    },
    Migration {
        version: 4,
        scope: Scope::LiveOnly,
        sql: include_str!("0004_live_lifecycle_default.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations to the live and history databases.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_for_schema(conn, LIVE_SCHEMA)?;
    apply_for_schema(conn, HISTORY_SCHEMA)?;
    Ok(())
}

/// Returns the recorded migration version of one attached database.
pub fn schema_version(conn: &Connection, schema: &str) -> DbResult<u32> {
    let version = conn.query_row(&format!("PRAGMA {schema}.user_version;"), [], |row| {
        row.get::<_, u32>(0)
    })?;
    Ok(version)
}

fn apply_for_schema(conn: &mut Connection, schema: &'static str) -> DbResult<()> {
    let current_version = schema_version(conn, schema)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            database: schema,
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        if migration.scope == Scope::Both || schema == LIVE_SCHEMA {
            tx.execute_batch(&migration.sql.replace("{schema}", schema))?;
        }
        tx.execute_batch(&format!(
            "PRAGMA {schema}.user_version = {};",
            migration.version
        ))?;
    }
    tx.commit()?;

    Ok(())
}
