//! Person record store contract and SQLite document implementation.
//!
//! # Responsibility
//! - Serve complete record snapshots to the graph builder.
//! - Persist field-level `RecordUpdate`s atomically.
//!
//! # Invariants
//! - Each row holds one `PersonRecord` as a JSON document keyed by its id.
//! - A batch of updates either lands completely or not at all.
//! - Read paths reject documents whose id disagrees with the row key.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::person::{PersonId, PersonRecord};
use crate::model::update::RecordUpdate;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(PersonId),
    /// Connection schema is not at the version this binary writes.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted document is well-formed JSON but not a valid record.
    InvalidData(String),
    Serialization(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "person not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "person repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "person repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "person repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted person data: {message}"),
            Self::Serialization(err) => write!(f, "person document serialization failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::NotFound(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
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

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Record store adapter consumed by the family service.
pub trait PersonRepository {
    /// Complete snapshot, ordered by id.
    fn read_all(&self) -> RepoResult<Vec<PersonRecord>>;
    fn read_by_id(&self, id: &PersonId) -> RepoResult<Option<PersonRecord>>;
    /// Inserts or replaces one record.
    fn upsert(&self, record: &PersonRecord) -> RepoResult<()>;
    /// Removes one record; `NotFound` when absent.
    fn delete(&self, id: &PersonId) -> RepoResult<()>;
    /// Applies a batch of field-level updates and returns the ids whose
    /// stored record actually changed.
    fn apply_updates(&self, updates: &[RecordUpdate]) -> RepoResult<BTreeSet<PersonId>>;

    /// Writes many records; returns how many were written.
    fn upsert_all(&self, records: &[PersonRecord]) -> RepoResult<usize> {
        for record in records {
            self.upsert(record)?;
        }
        Ok(records.len())
    }
}

/// SQLite-backed person repository over a migrated connection.
pub struct SqlitePersonRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePersonRepository<'conn> {
    /// Wraps a connection after checking its schema.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` for a damaged schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_person_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Records whose collection label equals `collection` exactly.
    pub fn read_collection(&self, collection: &str) -> RepoResult<Vec<PersonRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, document FROM persons
             WHERE collection = ?1
             ORDER BY id ASC;",
        )?;
        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, document) = row?;
            records.push(parse_document(&id, &document)?);
        }
        Ok(records)
    }

    pub fn count(&self) -> RepoResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM persons;", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }
}

impl PersonRepository for SqlitePersonRepository<'_> {
    fn read_all(&self) -> RepoResult<Vec<PersonRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, document FROM persons ORDER BY id ASC;")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, document) = row?;
            records.push(parse_document(&id, &document)?);
        }
        debug!(
            "event=person_read_all module=repo status=ok records={}",
            records.len()
        );
        Ok(records)
    }

    fn read_by_id(&self, id: &PersonId) -> RepoResult<Option<PersonRecord>> {
        load_record(self.conn, id)
    }

    fn upsert(&self, record: &PersonRecord) -> RepoResult<()> {
        write_record(self.conn, record)
    }

    fn delete(&self, id: &PersonId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM persons WHERE id = ?1;", [id.as_str()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn apply_updates(&self, updates: &[RecordUpdate]) -> RepoResult<BTreeSet<PersonId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut pending: BTreeMap<PersonId, PersonRecord> = BTreeMap::new();
        let mut changed = BTreeSet::new();

        for update in updates {
            let target = update.target();
            let record = match pending.entry(target.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let loaded =
                        load_record(&tx, target)?.ok_or_else(|| RepoError::NotFound(target.clone()))?;
                    entry.insert(loaded)
                }
            };
            if record.apply(update) {
                changed.insert(target.clone());
            }
        }

        for id in &changed {
            if let Some(record) = pending.get(id) {
                write_record(&tx, record)?;
            }
        }
        tx.commit()?;

        debug!(
            "event=person_apply_updates module=repo status=ok updates={} changed={}",
            updates.len(),
            changed.len()
        );
        Ok(changed)
    }

    fn upsert_all(&self, records: &[PersonRecord]) -> RepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for record in records {
            write_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(records.len())
    }
}

fn load_record(conn: &Connection, id: &PersonId) -> RepoResult<Option<PersonRecord>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM persons WHERE id = ?1;",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    document
        .map(|document| parse_document(id.as_str(), &document))
        .transpose()
}

fn write_record(conn: &Connection, record: &PersonRecord) -> RepoResult<()> {
    if record.id.as_str().trim().is_empty() {
        return Err(RepoError::InvalidData("person id must not be blank".to_string()));
    }
    let document = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO persons (id, document, collection)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET
            document = excluded.document,
            collection = excluded.collection,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![record.id.as_str(), document, record.collection.as_deref()],
    )?;
    Ok(())
}

fn parse_document(id: &str, document: &str) -> RepoResult<PersonRecord> {
    let record: PersonRecord = serde_json::from_str(document)?;
    if record.id.as_str() != id {
        return Err(RepoError::InvalidData(format!(
            "row `{id}` holds a document for `{}`",
            record.id
        )));
    }
    Ok(record)
}

fn ensure_person_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "persons")? {
        return Err(RepoError::MissingRequiredTable("persons"));
    }
    for column in ["id", "document", "collection", "created_at", "updated_at"] {
        if !table_has_column(conn, "persons", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "persons",
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
