#![allow(clippy::missing_errors_doc)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use shift_telemetry_core::{
    compute_score, format_timestamp, now_utc, parse_timestamp, SessionInput, SessionRecord,
    SessionStore, TelemetryError,
};

const SESSIONS_MIGRATION_VERSION: i64 = 1;

const SCHEMA_SESSIONS_V1: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  recorded_at TEXT NOT NULL,
  actor TEXT NOT NULL,
  sales INTEGER NOT NULL CHECK (sales >= 0),
  errors INTEGER NOT NULL CHECK (errors >= 0),
  score INTEGER NOT NULL CHECK (score >= 0)
);

CREATE TRIGGER IF NOT EXISTS trg_sessions_no_update
BEFORE UPDATE ON sessions
BEGIN
  SELECT RAISE(FAIL, 'sessions records are immutable');
END;
";

/// Append-only session log on a local `SQLite` file.
///
/// Holds only the database path: every operation opens a connection, runs,
/// and releases the handle before returning. Nothing is held across calls.
pub struct SqliteSessionStore {
    path: PathBuf,
}

impl SqliteSessionStore {
    /// Opens the store at `path` and applies the schema. The connection used
    /// for migration is released before this returns.
    pub fn open(path: &Path) -> Result<Self> {
        let store = Self {
            path: path.to_path_buf(),
        };
        store.migrate()?;
        Ok(store)
    }

    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).with_context(|| {
            format!("failed to open sqlite database at {}", self.path.display())
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to configure sqlite pragmas")?;

        Ok(conn)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )
        .context("failed to ensure schema_migrations exists")?;

        conn.execute_batch(SCHEMA_SESSIONS_V1)
            .context("failed to apply sessions schema")?;

        let now = format_timestamp(now_utc()).map_err(|err| anyhow!(err.to_string()))?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, applied_at) VALUES (?1, ?2)",
            params![SESSIONS_MIGRATION_VERSION, now],
        )
        .context("failed to register sessions schema migration")?;

        Ok(())
    }

    /// Scores and persists one submission, returning the stored record with
    /// its assigned id and timestamp.
    pub fn append_session(&self, input: &SessionInput) -> Result<SessionRecord> {
        input
            .validate()
            .map_err(|err| anyhow!("session validation failed: {err}"))?;

        let score = compute_score(input.sales, input.errors);
        // The stored text layout is second-precision; the returned record
        // must carry the persisted value, not the raw clock reading.
        let recorded_at_text =
            format_timestamp(now_utc()).map_err(|err| anyhow!(err.to_string()))?;
        let recorded_at =
            parse_timestamp(&recorded_at_text).map_err(|err| anyhow!(err.to_string()))?;

        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .context("failed to start session transaction")?;

        tx.execute(
            "INSERT INTO sessions(recorded_at, actor, sales, errors, score)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                recorded_at_text,
                input.actor,
                i64::from(input.sales),
                i64::from(input.errors),
                score,
            ],
        )
        .context("failed to append session record")?;

        let id = tx.last_insert_rowid();
        tx.commit().context("failed to commit session transaction")?;

        Ok(SessionRecord {
            id,
            recorded_at,
            actor: input.actor.clone(),
            sales: input.sales,
            errors: input.errors,
            score,
        })
    }

    /// Full scan, newest first.
    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, recorded_at, actor, sales, errors, score
             FROM sessions
             ORDER BY id DESC",
        )?;

        let rows = stmt.query_map([], parse_session_row)?;
        collect_rows(rows)
    }

    /// Deletes every record and rewinds the id sequence, so the next append
    /// after a reset starts over at id 1. Idempotent.
    pub fn reset_sessions(&self) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .context("failed to start reset transaction")?;

        let removed = tx
            .execute("DELETE FROM sessions", [])
            .context("failed to clear session records")?;

        // sqlite_sequence only exists once an AUTOINCREMENT insert happened.
        if table_exists(&tx, "sqlite_sequence")? {
            tx.execute("DELETE FROM sqlite_sequence WHERE name = 'sessions'", [])
                .context("failed to rewind session id sequence")?;
        }

        tx.commit().context("failed to commit reset transaction")?;
        Ok(removed)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| {
                row.get::<_, i64>(0)
            })
            .context("failed to count session records")?;

        usize::try_from(count).with_context(|| format!("invalid session count: {count}"))
    }

    pub fn latest_id(&self) -> Result<Option<i64>> {
        let conn = self.connection()?;
        let value = conn
            .query_row("SELECT MAX(id) FROM sessions", [], |row| {
                row.get::<_, Option<i64>>(0)
            })
            .context("failed to query latest session id")?;
        Ok(value)
    }
}

impl SessionStore for SqliteSessionStore {
    fn append(&mut self, input: &SessionInput) -> Result<SessionRecord, TelemetryError> {
        input.validate()?;
        self.append_session(input).map_err(storage_error)
    }

    fn list_all(&self) -> Result<Vec<SessionRecord>, TelemetryError> {
        self.list_sessions().map_err(storage_error)
    }

    fn reset(&mut self) -> Result<usize, TelemetryError> {
        self.reset_sessions().map_err(storage_error)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn storage_error(err: anyhow::Error) -> TelemetryError {
    TelemetryError::Storage(format!("{err:#}"))
}

fn parse_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let recorded_at_raw: String = row.get(1)?;
    let sales_i64: i64 = row.get(3)?;
    let errors_i64: i64 = row.get(4)?;

    let sales = u32::try_from(sales_i64)
        .map_err(|_| invalid_column(3, format!("invalid sales count: {sales_i64}")))?;
    let errors = u32::try_from(errors_i64)
        .map_err(|_| invalid_column(4, format!("invalid error count: {errors_i64}")))?;
    let recorded_at = parse_timestamp(&recorded_at_raw).map_err(to_sql_error)?;

    Ok(SessionRecord {
        id: row.get(0)?,
        recorded_at,
        actor: row.get(2)?,
        sales,
        errors,
        score: row.get(5)?,
    })
}

fn invalid_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Integer,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

#[allow(clippy::needless_pass_by_value)]
fn to_sql_error(err: TelemetryError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        1,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1
             LIMIT 1",
            params![table_name],
            |_| Ok(()),
        )
        .optional()
        .context("failed to query sqlite_master")?
        .is_some();

    Ok(exists)
}

fn collect_rows<T>(
    rows: rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut values = Vec::new();
    for row in rows {
        values.push(row?);
    }
    Ok(values)
}
