//! history.rs: log of evaluated messages, used by the dashboard and listings.
//!
//! Timestamps are kept as the stored text (`YYYY-MM-DD HH:MM:SS`) so that a
//! malformed row can still be listed; only statistics need to parse them.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::verdict::{Label, Verdict};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub message: String,
    /// Free-form channel supplied by the caller ("SMS", "Email", ...).
    pub source: Option<String>,
    pub result: Label,
    /// Display confidence, e.g. `"97.12%"` or `"50% (Verified)"`.
    pub probability: String,
    pub timestamp: String,
}

/// Row to append; id and timestamp are assigned by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub message: String,
    pub source: Option<String>,
    pub result: Label,
    pub probability: String,
}

impl NewHistoryEntry {
    pub fn from_verdict(message: &str, source: Option<&str>, verdict: &Verdict) -> Self {
        Self {
            message: message.to_string(),
            source: source.map(str::to_string),
            result: verdict.label,
            probability: verdict.confidence_text(),
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry>;

    /// Newest first; `limit = None` returns everything.
    fn list(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>>;

    fn delete(&self, id: i64) -> Result<bool>;

    /// Returns the number of removed rows.
    fn clear(&self) -> Result<usize>;
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// In-memory, capped history; oldest entries are dropped first.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<Inner>,
    cap: usize,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: Vec<HistoryEntry>,
}

impl MemoryHistory {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                rows: Vec::with_capacity(cap),
            }),
            cap,
        }
    }

    /// Append a row with an explicit timestamp text (fixtures, imports).
    pub fn append_at(&self, entry: NewHistoryEntry, timestamp: impl Into<String>) -> Result<HistoryEntry> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let row = HistoryEntry {
            id: inner.next_id,
            message: entry.message,
            source: entry.source,
            result: entry.result,
            probability: entry.probability,
            timestamp: timestamp.into(),
        };
        inner.rows.push(row.clone());
        if inner.rows.len() > self.cap {
            let excess = inner.rows.len() - self.cap;
            inner.rows.drain(0..excess);
        }
        Ok(row)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::store("memory history", "mutex poisoned"))
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry> {
        self.append_at(entry, now_timestamp())
    }

    fn list(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        let inner = self.lock()?;
        let n = limit.unwrap_or(inner.rows.len());
        Ok(inner.rows.iter().rev().take(n).cloned().collect())
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.rows.len();
        inner.rows.retain(|r| r.id != id);
        Ok(inner.rows.len() != before)
    }

    fn clear(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let n = inner.rows.len();
        inner.rows.clear();
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(msg: &str, label: Label) -> NewHistoryEntry {
        NewHistoryEntry {
            message: msg.into(),
            source: Some("SMS".into()),
            result: label,
            probability: "12.00%".into(),
        }
    }

    #[test]
    fn list_is_newest_first_and_limited() {
        let h = MemoryHistory::with_capacity(10);
        for m in ["a", "b", "c"] {
            h.append(entry(m, Label::NotSpam)).unwrap();
        }
        let rows = h.list(Some(2)).unwrap();
        let msgs: Vec<_> = rows.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(msgs, vec!["c", "b"]);
        assert_eq!(h.list(None).unwrap().len(), 3);
    }

    #[test]
    fn capacity_drops_oldest() {
        let h = MemoryHistory::with_capacity(2);
        for m in ["a", "b", "c"] {
            h.append(entry(m, Label::Spam)).unwrap();
        }
        let msgs: Vec<_> = h.list(None).unwrap().into_iter().map(|r| r.message).collect();
        assert_eq!(msgs, vec!["c", "b"]);
    }

    #[test]
    fn delete_and_clear() {
        let h = MemoryHistory::with_capacity(10);
        let a = h.append(entry("a", Label::Spam)).unwrap();
        h.append(entry("b", Label::Spam)).unwrap();
        assert!(h.delete(a.id).unwrap());
        assert!(!h.delete(a.id).unwrap());
        assert_eq!(h.clear().unwrap(), 1);
        assert!(h.list(None).unwrap().is_empty());
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = now_timestamp();
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).is_ok());
    }
}
