//! SQLite persistence for feedback records and evaluation history.
//!
//! One connection behind a mutex; every call is a short, local, synchronous
//! statement. Feedback timestamps are RFC 3339 with microseconds so that text
//! ordering equals time ordering.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::feedback::{parse_label, FeedbackRecord, FeedbackStore, LookupMode, Provenance};
use crate::history::{now_timestamp, HistoryEntry, HistoryStore, NewHistoryEntry};
use crate::verdict::Label;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    message     TEXT NOT NULL,
    source      TEXT,
    result      TEXT NOT NULL,
    probability TEXT NOT NULL,
    timestamp   TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS feedback (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    message     TEXT NOT NULL,
    label       TEXT NOT NULL,
    provenance  TEXT NOT NULL DEFAULT 'user',
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS feedback_message_idx ON feedback (message);
";

const FEEDBACK_COLUMNS: &str = "id, message, label, provenance, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(target: "store", path = %path.display(), "sqlite store ready");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PipelineError::store("sqlite", "connection mutex poisoned"))
    }

    fn insert_feedback(
        conn: &Connection,
        message: &str,
        label: Label,
        provenance: Provenance,
    ) -> Result<FeedbackRecord> {
        Self::insert_feedback_at(conn, message, label, provenance, Utc::now())
    }

    fn insert_feedback_at(
        conn: &Connection,
        message: &str,
        label: Label,
        provenance: Provenance,
        created_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        conn.execute(
            "INSERT INTO feedback (message, label, provenance, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![message, label.as_str(), provenance.as_str(), fmt_ts(created_at)],
        )?;
        Ok(FeedbackRecord {
            id: conn.last_insert_rowid(),
            message: message.to_string(),
            label,
            provenance,
            created_at,
        })
    }
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Feedback row as stored; converted once the statement is done.
struct RawFeedback {
    id: i64,
    message: String,
    label: String,
    provenance: String,
    created_at: String,
}

impl RawFeedback {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message: row.get(1)?,
            label: row.get(2)?,
            provenance: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_record(self) -> Result<FeedbackRecord> {
        let label = parse_label(&self.label).ok_or_else(|| {
            PipelineError::store("feedback row", format!("bad label {:?}", self.label))
        })?;
        let provenance = Provenance::parse(&self.provenance).ok_or_else(|| {
            PipelineError::store("feedback row", format!("bad provenance {:?}", self.provenance))
        })?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| PipelineError::store("feedback row", e))?
            .with_timezone(&Utc);
        Ok(FeedbackRecord {
            id: self.id,
            message: self.message,
            label,
            provenance,
            created_at,
        })
    }
}

impl FeedbackStore for SqliteStore {
    /// Same ranking as [`crate::feedback::pick_override`], expressed in SQL.
    fn find_override(&self, message: &str, mode: LookupMode) -> Result<Option<FeedbackRecord>> {
        let order = match mode {
            LookupMode::Interactive => {
                "CASE provenance WHEN 'admin' THEN 0 ELSE 1 END, created_at DESC, id DESC"
            }
            LookupMode::Latest => "id DESC",
        };
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE message = ?1 ORDER BY {order} LIMIT 1"
        );
        let conn = self.conn()?;
        let raw = conn
            .query_row(&sql, params![message], RawFeedback::from_row)
            .optional()?;
        raw.map(RawFeedback::into_record).transpose()
    }

    fn record_feedback(&self, message: &str, label: Label) -> Result<FeedbackRecord> {
        let conn = self.conn()?;
        Self::insert_feedback(&conn, message, label, Provenance::User)
    }

    fn verify(&self, message: &str, label: Label) -> Result<FeedbackRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM feedback WHERE message = ?1", params![message])?;
        let rec = Self::insert_feedback(&tx, message, label, Provenance::Admin)?;
        tx.commit()?;
        debug!(target: "store", removed, id = rec.id, "feedback verified");
        Ok(rec)
    }

    fn pending_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE provenance <> 'admin' \
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map([], RawFeedback::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawFeedback::into_record).collect()
    }

    fn delete_feedback(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM feedback WHERE id = ?1", params![id])? > 0)
    }
}

impl HistoryStore for SqliteStore {
    fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        let timestamp = now_timestamp();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO history (message, source, result, probability, timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.message,
                entry.source,
                entry.result.as_str(),
                entry.probability,
                timestamp
            ],
        )?;
        Ok(HistoryEntry {
            id: conn.last_insert_rowid(),
            message: entry.message,
            source: entry.source,
            result: entry.result,
            probability: entry.probability,
            timestamp,
        })
    }

    fn list(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, message, source, result, probability, timestamp FROM history \
             ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Rows written by other tools may carry a result we cannot parse; they
        // are dropped from listings instead of failing the whole read.
        Ok(rows
            .into_iter()
            .filter_map(|(id, message, source, result, probability, timestamp)| {
                let Some(label) = parse_label(&result) else {
                    warn!(target: "store", id, result = %result, "skipping history row with unknown result");
                    return None;
                };
                Some(HistoryEntry {
                    id,
                    message,
                    source,
                    result: label,
                    probability,
                    timestamp,
                })
            })
            .collect())
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM history WHERE id = ?1", params![id])? > 0)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM history", [])?)
    }
}
