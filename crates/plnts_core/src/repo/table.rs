//! Typed collection gateway over the document store.
//!
//! # Responsibility
//! - Provide CRUD, filtered listing and archive operations for one
//!   [`Document`] type.
//! - Move banished entities from the live database into history.
//!
//! # Invariants
//! - Write paths reject nil ids and call `Document::validate()` before SQL
//!   mutations.
//! - Read paths reject undecodable persisted documents instead of masking them.
//! - Banish writes history before deleting live, inside one transaction.
//!
//! # See also
//! - `db::migrations` for the natural-key unique indexes behind `Duplicate`.

use super::filter::Filter;
use crate::db::{DbError, HISTORY_SCHEMA, LIVE_SCHEMA};
use crate::model::{EntityId, ValidationError};
use crate::schema::{to_record, Document, SchemaError, WireRecord};
use crate::time::{Clock, SystemClock};
use log::{debug, info, warn};
use rusqlite::types::Value as SqlValue;
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use uuid::Uuid;

static SYSTEM_CLOCK: SystemClock = SystemClock;

pub type RepoResult<T> = Result<T, RepoError>;

/// Step of a banish that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStage {
    HistoryWrite,
    LiveDelete,
    Commit,
}

impl Display for ArchiveStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HistoryWrite => write!(f, "history write"),
            Self::LiveDelete => write!(f, "live delete"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Error for document persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Schema(SchemaError),
    Db(DbError),
    NotFound {
        collection: &'static str,
        id: EntityId,
    },
    /// Raw identifier could not be parsed.
    InvalidIdentifier(String),
    /// Natural-key or primary-key uniqueness violated.
    Duplicate {
        collection: &'static str,
        id: EntityId,
    },
    InvalidData(String),
    InvalidFilter(String),
    /// Banish failed; the transaction was rolled back.
    PartialArchive {
        collection: &'static str,
        id: EntityId,
        stage: ArchiveStage,
        source: DbError,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Schema(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { collection, id } => write!(f, "{collection} not found: {id}"),
            Self::InvalidIdentifier(raw) => write!(f, "invalid identifier: `{raw}`"),
            Self::Duplicate { collection, id } => {
                write!(f, "duplicate {collection} document: {id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted document: {message}"),
            Self::InvalidFilter(message) => write!(f, "invalid filter: {message}"),
            Self::PartialArchive {
                collection,
                id,
                stage,
                source,
            } => write!(
                f,
                "banish of {collection} {id} failed at {stage}: {source}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Schema(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::PartialArchive { source, .. } => Some(source),
            Self::NotFound { .. }
            | Self::InvalidIdentifier(_)
            | Self::Duplicate { .. }
            | Self::InvalidData(_)
            | Self::InvalidFilter(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<SchemaError> for RepoError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Collection gateway for entity type `E`.
///
/// Borrows the store connection; create one per call site, they are cheap.
pub struct Table<'conn, E: Document> {
    conn: &'conn Connection,
    clock: &'conn dyn Clock,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Document> Table<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, &SYSTEM_CLOCK)
    }

    /// Uses `clock` for `updated_on` and `banished_on` stamps.
    pub fn with_clock(conn: &'conn Connection, clock: &'conn dyn Clock) -> Self {
        Self {
            conn,
            clock,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        E::COLLECTION
    }

    /// Counts live documents matching `filter`.
    pub fn count(&self, filter: &Filter) -> RepoResult<u64> {
        self.count_in(LIVE_SCHEMA, filter)
    }

    /// Inserts a new live document and returns its id.
    pub fn create(&self, entity: &E) -> RepoResult<EntityId> {
        self.check_write(entity.id(), entity)?;
        let record = self.encode(entity)?;
        self.insert(entity.id(), &record)?;
        debug!(
            "event=document_create module=repo status=ok collection={} id={}",
            E::COLLECTION,
            entity.id()
        );
        Ok(entity.id())
    }

    pub fn get_one(&self, id: EntityId) -> RepoResult<Option<E>> {
        self.load(LIVE_SCHEMA, id)?
            .map(|body| self.decode(body))
            .transpose()
    }

    /// Parses `raw_id` and loads the live entity it names.
    pub fn find(&self, raw_id: &str) -> RepoResult<E> {
        let id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| RepoError::InvalidIdentifier(raw_id.to_string()))?;
        self.get_one(id)?.ok_or(RepoError::NotFound {
            collection: E::COLLECTION,
            id,
        })
    }

    /// Lists live documents matching `filter` in insertion order.
    pub fn get_many(&self, filter: &Filter, limit: u32) -> RepoResult<Vec<E>> {
        let (clause, binds) = filter.to_sql()?;
        let sql = format!(
            "SELECT body FROM {LIVE_SCHEMA}.documents
             WHERE collection = ? AND ({clause})
             ORDER BY rowid ASC
             LIMIT ?;"
        );

        let mut values = Vec::with_capacity(binds.len() + 2);
        values.push(SqlValue::Text(E::COLLECTION.to_string()));
        values.extend(binds);
        values.push(SqlValue::Integer(i64::from(limit)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            let record = parse_body(E::COLLECTION, &body)?;
            entities.push(self.decode(record)?);
        }
        Ok(entities)
    }

    /// Replaces the document stored under `id`.
    ///
    /// Returns `false` when nothing but `updated_on` would change. The
    /// stored id wins over the one carried by `entity`.
    pub fn update(&self, id: EntityId, entity: &E) -> RepoResult<bool> {
        self.check_write(id, entity)?;
        let Some(stored) = self.load(LIVE_SCHEMA, id)? else {
            return Err(RepoError::NotFound {
                collection: E::COLLECTION,
                id,
            });
        };

        let mut record = self.encode(entity)?;
        record.insert("id".to_string(), Value::String(id.to_string()));
        if let Some(updated_on) = stored.get("updated_on") {
            record.insert("updated_on".to_string(), updated_on.clone());
        }
        if record == stored {
            return Ok(false);
        }

        record.insert("updated_on".to_string(), Value::from(self.clock.now_ms()));
        let body = serde_json::to_string(&record).map_err(SchemaError::from)?;
        self.conn
            .execute(
                &format!(
                    "UPDATE {LIVE_SCHEMA}.documents SET body = ?1
                     WHERE collection = ?2 AND id = ?3;"
                ),
                params![body, E::COLLECTION, id.to_string()],
            )
            .map_err(|err| map_write_error(E::COLLECTION, id, err))?;
        Ok(true)
    }

    /// Inserts or replaces the document under `id`.
    ///
    /// Returns `true` when a document was inserted or modified.
    pub fn upsert(&self, id: EntityId, entity: &E) -> RepoResult<bool> {
        if self.exists(LIVE_SCHEMA, id)? {
            return self.update(id, entity);
        }

        self.check_write(id, entity)?;
        let mut record = self.encode(entity)?;
        record.insert("id".to_string(), Value::String(id.to_string()));
        self.insert(id, &record)?;
        Ok(true)
    }

    /// Hard-deletes the live document; returns `false` if none existed.
    pub fn delete(&self, id: EntityId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            &format!("DELETE FROM {LIVE_SCHEMA}.documents WHERE collection = ?1 AND id = ?2;"),
            params![E::COLLECTION, id.to_string()],
        )?;
        Ok(removed > 0)
    }

    /// Archives the entity in place, leaving it in the live database.
    pub fn deprecate(&self, id: EntityId, cause: Option<&str>) -> RepoResult<bool> {
        let Some(mut entity) = self.get_one(id)? else {
            return Err(RepoError::NotFound {
                collection: E::COLLECTION,
                id,
            });
        };
        entity.meta_mut().banish(self.clock.now_ms(), cause);
        self.update(id, &entity)
    }

    /// Archives the entity and moves it from live into history.
    ///
    /// Returns `false` when the live row vanished before deletion; the
    /// history copy is still written in that case.
    pub fn banish(&self, id: EntityId, cause: Option<&str>) -> RepoResult<bool> {
        let Some(mut entity) = self.get_one(id)? else {
            return Err(RepoError::NotFound {
                collection: E::COLLECTION,
                id,
            });
        };
        entity.meta_mut().banish(self.clock.now_ms(), cause);
        let record = self.encode(&entity)?;
        let body = serde_json::to_string(&record).map_err(SchemaError::from)?;

        let partial = |stage: ArchiveStage| {
            move |err: rusqlite::Error| RepoError::PartialArchive {
                collection: E::COLLECTION,
                id,
                stage,
                source: DbError::Sqlite(err),
            }
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO {HISTORY_SCHEMA}.documents (collection, id, body)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body;"
            ),
            params![E::COLLECTION, id.to_string(), body],
        )
        .map_err(partial(ArchiveStage::HistoryWrite))?;
        let removed = tx
            .execute(
                &format!(
                    "DELETE FROM {LIVE_SCHEMA}.documents WHERE collection = ?1 AND id = ?2;"
                ),
                params![E::COLLECTION, id.to_string()],
            )
            .map_err(partial(ArchiveStage::LiveDelete))?;
        tx.commit().map_err(partial(ArchiveStage::Commit))?;

        if removed == 0 {
            warn!(
                "event=document_banish module=repo status=live_missing collection={} id={id}",
                E::COLLECTION
            );
        } else {
            info!(
                "event=document_banish module=repo status=ok collection={} id={id}",
                E::COLLECTION
            );
        }
        Ok(removed > 0)
    }

    /// Loads a banished entity from history.
    pub fn get_archived(&self, id: EntityId) -> RepoResult<Option<E>> {
        self.load(HISTORY_SCHEMA, id)?
            .map(|body| self.decode(body))
            .transpose()
    }

    /// Counts history documents matching `filter`.
    pub fn count_archived(&self, filter: &Filter) -> RepoResult<u64> {
        self.count_in(HISTORY_SCHEMA, filter)
    }

    fn check_write(&self, id: EntityId, entity: &E) -> RepoResult<()> {
        if id.is_nil() || entity.id().is_nil() {
            return Err(ValidationError::NilId.into());
        }
        entity.validate()?;
        Ok(())
    }

    fn encode(&self, entity: &E) -> RepoResult<WireRecord> {
        Ok(to_record(entity, E::schema())?)
    }

    fn decode(&self, record: WireRecord) -> RepoResult<E> {
        serde_json::from_value(Value::Object(record)).map_err(|err| {
            RepoError::InvalidData(format!("`{}` document: {err}", E::COLLECTION))
        })
    }

    fn insert(&self, id: EntityId, record: &WireRecord) -> RepoResult<()> {
        let body = serde_json::to_string(record).map_err(SchemaError::from)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {LIVE_SCHEMA}.documents (collection, id, body)
                     VALUES (?1, ?2, ?3);"
                ),
                params![E::COLLECTION, id.to_string(), body],
            )
            .map_err(|err| map_write_error(E::COLLECTION, id, err))?;
        Ok(())
    }

    fn load(&self, schema: &str, id: EntityId) -> RepoResult<Option<WireRecord>> {
        let body: Option<String> = self
            .conn
            .query_row(
                &format!(
                    "SELECT body FROM {schema}.documents WHERE collection = ?1 AND id = ?2;"
                ),
                params![E::COLLECTION, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|body| parse_body(E::COLLECTION, &body))
            .transpose()
    }

    fn exists(&self, schema: &str, id: EntityId) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {schema}.documents WHERE collection = ?1 AND id = ?2;"
                ),
                params![E::COLLECTION, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn count_in(&self, schema: &str, filter: &Filter) -> RepoResult<u64> {
        let (clause, binds) = filter.to_sql()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {schema}.documents WHERE collection = ? AND ({clause});"
        );

        let mut values = Vec::with_capacity(binds.len() + 1);
        values.push(SqlValue::Text(E::COLLECTION.to_string()));
        values.extend(binds);

        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative document count {count}")))
    }
}

fn parse_body(collection: &'static str, body: &str) -> RepoResult<WireRecord> {
    match serde_json::from_str(body) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(RepoError::InvalidData(format!(
            "`{collection}` document is not an object"
        ))),
        Err(err) => Err(RepoError::InvalidData(format!("`{collection}` document: {err}"))),
    }
}

fn map_write_error(collection: &'static str, id: EntityId, err: rusqlite::Error) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
        {
            RepoError::Duplicate { collection, id }
        }
        _ => err.into(),
    }
}
