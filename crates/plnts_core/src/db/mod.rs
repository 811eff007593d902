//! Document store bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure the SQLite-backed document store.
//! - Attach the history database next to the live database.
//! - Apply schema migrations to both databases in deterministic order.
//!
//! # Invariants
//! - Live and history databases share one `documents` layout.
//! - Migration version is tracked per database via `PRAGMA <schema>.user_version`.
//! - Core code must not read/write documents before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_store, open_store_in_memory};

/// Schema name of the live database on a store connection.
pub const LIVE_SCHEMA: &str = "main";
/// Schema name of the attached history (banish archive) database.
pub const HISTORY_SCHEMA: &str = "history";

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        database: &'static str,
        db_version: u32,
        latest_supported: u32,
    },
    InvalidPath(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                database,
                db_version,
                latest_supported,
            } => write!(
                f,
                "{database} database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidPath(path) => write!(f, "store path is not valid UTF-8: {path}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::InvalidPath(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
