//! Connection bootstrap utilities for the document store.
//!
//! # Responsibility
//! - Open file or in-memory live databases.
//! - Attach the history database under [`HISTORY_SCHEMA`].
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have the history database attached.
//! - Returned connections have migrations fully applied on both databases.

use super::migrations::apply_migrations;
use super::{DbError, DbResult, HISTORY_SCHEMA};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens the live and history database files and applies pending migrations.
///
/// # Side effects
/// - Creates both database files when missing.
/// - Emits `store_open` logging events with duration and status.
pub fn open_store(live_path: impl AsRef<Path>, history_path: impl AsRef<Path>) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode=file");

    let history = match history_path.as_ref().to_str() {
        Some(path) => path.to_string(),
        None => {
            let display = history_path.as_ref().display().to_string();
            error!(
                "event=store_open module=db status=error mode=file duration_ms={} error_code=invalid_history_path",
                started_at.elapsed().as_millis()
            );
            return Err(DbError::InvalidPath(display));
        }
    };

    let conn = match Connection::open(live_path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=file duration_ms={} error_code=store_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_bootstrap(conn, &history, "file", started_at)
}

/// Opens in-memory live and history databases and applies pending migrations.
///
/// Every call yields an isolated store; nothing is shared between connections.
pub fn open_store_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode=memory");

    let conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode=memory duration_ms={} error_code=store_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_bootstrap(conn, ":memory:", "memory", started_at)
}

fn finish_bootstrap(
    mut conn: Connection,
    history: &str,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    match bootstrap_connection(&mut conn, history) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={} duration_ms={} error_code=store_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, history: &str) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute(&format!("ATTACH DATABASE ?1 AS {HISTORY_SCHEMA};"), [history])?;
    apply_migrations(conn)?;
    Ok(())
}
