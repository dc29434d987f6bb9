use crate::deduplication::{DeduplicationEngine, StoredSummary};
use crate::error::{LinkError, WriteError};
use crate::record::{Record, Value, NAMED_FIELDS};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ffi, params, params_from_iter, Connection, ErrorCode};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{error, info, warn};

/// Component id linked to every newly inserted regulation unless configured otherwise
pub const DEFAULT_COMPONENT_ID: i64 = 7;

// ============================================================================
// SQL VALUE MAPPING
// ============================================================================

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Sql::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(Sql::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(Sql::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl FromSql for Value {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Ok(Value::Null),
            ValueRef::Integer(i) => Ok(Value::Int(i)),
            ValueRef::Real(f) => Ok(Value::Float(f)),
            ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                .map(|s| Value::String(s.to_string()))
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            ValueRef::Blob(_) => Err(FromSqlError::InvalidType),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Create the `regulations` and `regulations_component` tables if missing
pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // Enable WAL mode for crash recovery
    // (in-memory databases answer "memory")
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS regulations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            created_at TEXT,
            update_at TEXT,
            is_active BOOLEAN,
            entity TEXT,
            external_link TEXT,
            gtype TEXT,
            rtype_id INTEGER,
            summary TEXT,
            classification_id INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS regulations_component (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            regulations_id INTEGER NOT NULL REFERENCES regulations(id),
            components_id INTEGER NOT NULL
        )",
        [],
    )?;

    // Last line of defence against duplicates the resolver could not see
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_regulations_identity
         ON regulations(entity, title, created_at, external_link)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regulations_component_regulation
         ON regulations_component(regulations_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// QUERIES
// ============================================================================

/// Identity projection of every stored regulation for `entity`. Read-only.
pub fn fetch_existing(conn: &Connection, entity: &str) -> rusqlite::Result<Vec<StoredSummary>> {
    let mut stmt = conn.prepare(
        "SELECT title, created_at, entity, COALESCE(external_link, '')
         FROM regulations
         WHERE entity = ?1",
    )?;

    let summaries = stmt
        .query_map([entity], |row| {
            Ok(StoredSummary {
                title: row.get(0)?,
                created_at: row.get(1)?,
                entity: row.get(2)?,
                external_link: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(summaries)
}

/// Column list for a batch: named fields, then the union of extension fields.
/// `id` is always left to the database.
fn insert_columns(records: &[Record]) -> Vec<&str> {
    let extra: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .filter(|name| *name != "id")
        .collect();

    NAMED_FIELDS.iter().copied().chain(extra).collect()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Insert every record and return the generated ids in insertion order.
///
/// Runs on whatever connection or transaction it is given; atomicity is the
/// caller's transaction. Fields a record lacks are written as NULL.
pub fn bulk_insert(conn: &Connection, records: &[Record]) -> rusqlite::Result<Vec<i64>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let columns = insert_columns(records);
    let column_sql = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO regulations ({}) VALUES ({}) RETURNING id",
        column_sql, placeholders
    ))?;

    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let values = columns.iter().map(|c| record.get(c));
        let id: i64 = stmt.query_row(params_from_iter(values), |row| row.get(0))?;
        ids.push(id);
    }

    Ok(ids)
}

/// Link every id to `component_id`, in a transaction of its own
pub fn insert_component_links(
    conn: &mut Connection,
    ids: &[i64],
    component_id: i64,
) -> Result<usize, LinkError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO regulations_component (regulations_id, components_id) VALUES (?1, ?2)",
        )?;
        for id in ids {
            stmt.execute(params![id, component_id])?;
        }
    }
    tx.commit()?;

    Ok(ids.len())
}

/// Unique / primary key violations are recoverable; every other failure is not
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                )
        }
        _ => false,
    }
}

// ============================================================================
// WRITE OUTCOME
// ============================================================================

/// Result of writing one entity batch. Returned even for degenerate outcomes
/// (nothing new, everything duplicate, link failure).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOutcome {
    pub entity: String,
    /// Input records belonging to the entity
    pub processed: usize,
    /// Rows already stored for the entity
    pub existing: usize,
    pub stored_duplicates: usize,
    pub batch_duplicates: usize,
    pub inserted: usize,
    pub new_ids: Vec<i64>,
    pub links_inserted: usize,
    pub link_error: Option<String>,
    pub message: String,
}

impl WriteOutcome {
    fn empty(entity: &str, message: String) -> Self {
        WriteOutcome {
            entity: entity.to_string(),
            message,
            ..Default::default()
        }
    }

    /// `(inserted_count, message)`
    pub fn into_parts(self) -> (usize, String) {
        (self.inserted, self.message)
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub component_id: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            component_id: DEFAULT_COMPONENT_ID,
        }
    }
}

/// Owns one database connection for the duration of a run
pub struct Gateway {
    conn: Connection,
    config: GatewayConfig,
}

impl Gateway {
    /// Open a file-backed database. Failure here aborts before any work.
    pub fn open(path: &Path, config: GatewayConfig) -> Result<Self, WriteError> {
        let conn = Connection::open(path).map_err(WriteError::Connection)?;
        info!(path = %path.display(), "database connection established");
        Ok(Self::from_connection(conn, config))
    }

    pub fn open_in_memory(config: GatewayConfig) -> Result<Self, WriteError> {
        let conn = Connection::open_in_memory().map_err(WriteError::Connection)?;
        Ok(Self::from_connection(conn, config))
    }

    pub fn from_connection(conn: Connection, config: GatewayConfig) -> Self {
        Gateway { conn, config }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn setup_schema(&self) -> rusqlite::Result<()> {
        setup_database(&self.conn)
    }

    /// Run a caller-supplied DDL script (e.g. an `init.sql`)
    pub fn execute_ddl(&self, ddl: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(ddl)?;
        info!("DDL executed");
        Ok(())
    }

    /// Write one entity batch.
    ///
    /// Fetch existing, dedup, insert and id retrieval share one transaction;
    /// component links are inserted after it commits and never roll it back.
    pub fn write_batch(&mut self, entity: &str, records: &[Record]) -> Result<WriteOutcome, WriteError> {
        let persistence = |source: rusqlite::Error| WriteError::Persistence {
            entity: entity.to_string(),
            source,
        };

        let candidates: Vec<Record> = records
            .iter()
            .filter(|r| r.belongs_to(entity))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return Ok(WriteOutcome::empty(
                entity,
                format!("No records for entity {}", entity),
            ));
        }
        info!(entity, count = candidates.len(), "records to process");

        let tx = self.conn.transaction().map_err(persistence)?;

        let existing = fetch_existing(&tx, entity).map_err(persistence)?;
        info!(entity, count = existing.len(), "existing records loaded");

        let resolution = DeduplicationEngine::new().resolve(&candidates, &existing);
        let mut outcome = WriteOutcome {
            entity: entity.to_string(),
            processed: candidates.len(),
            existing: existing.len(),
            stored_duplicates: resolution.stored_duplicates,
            batch_duplicates: resolution.batch_duplicates,
            ..Default::default()
        };

        if resolution.accepted.is_empty() {
            outcome.message = format!(
                "No new records for {} after duplicate check ({} duplicates skipped)",
                entity,
                resolution.total_duplicates()
            );
            info!(entity, "nothing new to insert");
            return Ok(outcome);
        }

        info!(entity, count = resolution.accepted.len(), "inserting records");
        let ids = match bulk_insert(&tx, &resolution.accepted) {
            Ok(ids) => ids,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!(entity, error = %rollback_err, "rollback failed");
                }
                if is_unique_violation(&err) {
                    warn!(entity, error = %err, "unique constraint hit, batch rolled back");
                    outcome.message = format!(
                        "Some records of {} were duplicates and were skipped; nothing inserted",
                        entity
                    );
                    return Ok(outcome);
                }
                error!(entity, error = %err, "bulk insert failed, batch rolled back");
                return Err(persistence(err));
            }
        };
        tx.commit().map_err(persistence)?;

        outcome.inserted = ids.len();
        info!(entity, count = outcome.inserted, "records inserted");

        let link_msg = match insert_component_links(&mut self.conn, &ids, self.config.component_id) {
            Ok(count) => {
                outcome.links_inserted = count;
                format!("Inserted {} component links", count)
            }
            Err(err) => {
                warn!(entity, error = %err, "component links not inserted");
                let msg = format!("Error inserting component links: {}", err);
                outcome.link_error = Some(err.to_string());
                msg
            }
        };
        outcome.new_ids = ids;

        outcome.message = format!(
            "Entity {}: processed: {} | existing: {} | duplicates skipped: {} | inserted: {}. {}",
            entity,
            outcome.processed,
            outcome.existing,
            outcome.stored_duplicates + outcome.batch_duplicates,
            outcome.inserted,
            link_msg
        );
        info!(entity, "{}", outcome.message);

        Ok(outcome)
    }

    pub fn count_regulations(&self, entity: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM regulations WHERE entity = ?1",
            [entity],
            |row| row.get(0),
        )
    }

    pub fn count_component_links(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM regulations_component", [], |row| row.get(0))
    }

    /// Release the connection
    pub fn close(self) -> Result<(), WriteError> {
        self.conn
            .close()
            .map_err(|(_, err)| WriteError::Connection(err))?;
        info!("database connection closed");
        Ok(())
    }
}
