//! # Override Resolver
//! Human feedback that takes precedence over the classifier for an exact
//! message match.
//!
//! Two lookup modes exist because the two entry points disagree:
//! - [`LookupMode::Interactive`]: admin records outrank user records no matter
//!   how old; inside a tier the most recent record wins.
//! - [`LookupMode::Latest`]: the most recently inserted record wins,
//!   provenance ignored.
//!
//! Provenance is an explicit field. The legacy `ADMIN_` label prefix is only
//! understood when parsing labels coming from older clients.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::verdict::{Label, Source};

const ADMIN_PREFIX: &str = "ADMIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    User,
    Admin,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupMode {
    /// Admin first, then recency. Used by the full verdict path.
    Interactive,
    /// Most recently inserted record. Used by the programmatic predict path.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Insertion order; strictly increasing.
    pub id: i64,
    pub message: String,
    pub label: Label,
    pub provenance: Provenance,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Compatibility rendering: `SPAM`, `NOT SPAM`, `ADMIN_SPAM`, `ADMIN_NOT SPAM`.
    pub fn legacy_label(&self) -> String {
        legacy_label(self.provenance, self.label)
    }

    pub fn as_override(&self) -> Override {
        Override {
            label: self.label,
            provenance: self.provenance,
        }
    }
}

/// Effective label chosen from human feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub label: Label,
    pub provenance: Provenance,
}

impl Override {
    pub const fn source(self) -> Source {
        match self.provenance {
            Provenance::User => Source::UserOverride,
            Provenance::Admin => Source::AdminOverride,
        }
    }
}

/// Read/write access to feedback records, owned by a persistence layer.
pub trait FeedbackStore: Send + Sync {
    /// Highest-ranked record whose message equals `message` exactly.
    fn find_override(&self, message: &str, mode: LookupMode) -> Result<Option<FeedbackRecord>>;

    /// Append a plain user report.
    fn record_feedback(&self, message: &str, label: Label) -> Result<FeedbackRecord>;

    /// Admin verification: drop every record for `message`, keep one admin record.
    fn verify(&self, message: &str, label: Label) -> Result<FeedbackRecord>;

    /// User (non-admin) records, newest first: the admin review queue.
    fn pending_feedback(&self) -> Result<Vec<FeedbackRecord>>;

    /// Remove one record. Returns whether it existed.
    fn delete_feedback(&self, id: i64) -> Result<bool>;
}

/// Look up the override for `message` and reduce it to its effective label.
pub fn resolve_override(
    store: &dyn FeedbackStore,
    message: &str,
    mode: LookupMode,
) -> Result<Option<Override>> {
    Ok(store
        .find_override(message, mode)?
        .map(|r| r.as_override()))
}

/// Rank `records` for `message` under `mode`. Pure; the in-memory store ranks
/// with it and `SqliteStore` mirrors the same order in SQL.
pub fn pick_override<'a>(
    records: impl IntoIterator<Item = &'a FeedbackRecord>,
    message: &str,
    mode: LookupMode,
) -> Option<&'a FeedbackRecord> {
    let candidates = records.into_iter().filter(|r| r.message == message);
    match mode {
        LookupMode::Interactive => {
            candidates.max_by_key(|r| (r.provenance == Provenance::Admin, r.created_at, r.id))
        }
        LookupMode::Latest => candidates.max_by_key(|r| r.id),
    }
}

/// Parse a raw feedback label, including the legacy `ADMIN_` prefix.
///
/// Accepts `SPAM`, `NOT SPAM` (also `NOT_SPAM`, `HAM`), any case, with an
/// optional `ADMIN_` prefix.
pub fn parse_feedback_label(raw: &str) -> Result<(Provenance, Label)> {
    let upper = raw.trim().to_uppercase();
    let (provenance, rest) = match upper.strip_prefix(ADMIN_PREFIX) {
        Some(rest) => (Provenance::Admin, rest.trim_start_matches('_')),
        None => (Provenance::User, upper.as_str()),
    };
    let label = parse_label(rest).ok_or_else(|| PipelineError::InvalidLabel {
        label: raw.to_string(),
    })?;
    Ok((provenance, label))
}

/// Parse a bare label (no provenance prefix).
pub fn parse_label(raw: &str) -> Option<Label> {
    let norm = raw.trim().to_uppercase().replace('_', " ");
    match norm.as_str() {
        "SPAM" => Some(Label::Spam),
        "NOT SPAM" | "HAM" => Some(Label::NotSpam),
        _ => None,
    }
}

pub fn legacy_label(provenance: Provenance, label: Label) -> String {
    match provenance {
        Provenance::User => label.as_str().to_string(),
        Provenance::Admin => format!("{ADMIN_PREFIX}_{}", label.as_str()),
    }
}

/// In-process store for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryFeedbackStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: i64,
    records: Vec<FeedbackRecord>,
}

impl MemoryInner {
    fn push(
        &mut self,
        message: &str,
        label: Label,
        provenance: Provenance,
        created_at: DateTime<Utc>,
    ) -> FeedbackRecord {
        self.next_id += 1;
        let rec = FeedbackRecord {
            id: self.next_id,
            message: message.to_string(),
            label,
            provenance,
            created_at,
        };
        self.records.push(rec.clone());
        rec
    }
}

impl MemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record with an explicit timestamp (replay / fixtures).
    pub fn insert(
        &self,
        message: &str,
        label: Label,
        provenance: Provenance,
        created_at: DateTime<Utc>,
    ) -> Result<FeedbackRecord> {
        let mut inner = self.lock()?;
        Ok(inner.push(message, label, provenance, created_at))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|g| g.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| PipelineError::store("memory feedback", "mutex poisoned"))
    }
}

impl FeedbackStore for MemoryFeedbackStore {
    fn find_override(&self, message: &str, mode: LookupMode) -> Result<Option<FeedbackRecord>> {
        let inner = self.lock()?;
        Ok(pick_override(&inner.records, message, mode).cloned())
    }

    fn record_feedback(&self, message: &str, label: Label) -> Result<FeedbackRecord> {
        self.insert(message, label, Provenance::User, Utc::now())
    }

    fn verify(&self, message: &str, label: Label) -> Result<FeedbackRecord> {
        let mut inner = self.lock()?;
        inner.records.retain(|r| r.message != message);
        Ok(inner.push(message, label, Provenance::Admin, Utc::now()))
    }

    fn pending_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        let inner = self.lock()?;
        let mut out: Vec<FeedbackRecord> = inner
            .records
            .iter()
            .filter(|r| r.provenance == Provenance::User)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    fn delete_feedback(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        Ok(inner.records.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn admin_beats_newer_user_in_interactive_mode() {
        let s = MemoryFeedbackStore::new();
        s.insert("hi", Label::Spam, Provenance::Admin, t(0)).unwrap();
        s.insert("hi", Label::NotSpam, Provenance::User, t(60)).unwrap();

        let o = resolve_override(&s, "hi", LookupMode::Interactive).unwrap().unwrap();
        assert_eq!(o.label, Label::Spam);
        assert_eq!(o.source(), Source::AdminOverride);
    }

    #[test]
    fn latest_mode_ignores_provenance() {
        let s = MemoryFeedbackStore::new();
        s.insert("hi", Label::Spam, Provenance::Admin, t(0)).unwrap();
        s.insert("hi", Label::NotSpam, Provenance::User, t(60)).unwrap();

        let o = resolve_override(&s, "hi", LookupMode::Latest).unwrap().unwrap();
        assert_eq!(o.label, Label::NotSpam);
        assert_eq!(o.source(), Source::UserOverride);
    }

    #[test]
    fn most_recent_wins_within_tier() {
        let s = MemoryFeedbackStore::new();
        s.insert("m", Label::NotSpam, Provenance::User, t(10)).unwrap();
        s.insert("m", Label::Spam, Provenance::User, t(20)).unwrap();
        s.insert("m", Label::NotSpam, Provenance::Admin, t(1)).unwrap();
        s.insert("m", Label::Spam, Provenance::Admin, t(5)).unwrap();

        let r = s.find_override("m", LookupMode::Interactive).unwrap().unwrap();
        assert_eq!((r.provenance, r.label), (Provenance::Admin, Label::Spam));
    }

    #[test]
    fn equal_timestamps_fall_back_to_insertion_order() {
        let s = MemoryFeedbackStore::new();
        s.insert("m", Label::Spam, Provenance::User, t(0)).unwrap();
        s.insert("m", Label::NotSpam, Provenance::User, t(0)).unwrap();
        let r = s.find_override("m", LookupMode::Interactive).unwrap().unwrap();
        assert_eq!(r.label, Label::NotSpam);
    }

    #[test]
    fn match_is_exact() {
        let s = MemoryFeedbackStore::new();
        s.record_feedback("Win a prize", Label::Spam).unwrap();
        for probe in ["win a prize", "Win a prize ", "Win a priz"] {
            assert!(s.find_override(probe, LookupMode::Interactive).unwrap().is_none());
            assert!(s.find_override(probe, LookupMode::Latest).unwrap().is_none());
        }
    }

    #[test]
    fn verify_replaces_all_records_for_message() {
        let s = MemoryFeedbackStore::new();
        s.record_feedback("a", Label::Spam).unwrap();
        s.record_feedback("a", Label::Spam).unwrap();
        s.record_feedback("b", Label::Spam).unwrap();

        let rec = s.verify("a", Label::NotSpam).unwrap();
        assert_eq!(rec.legacy_label(), "ADMIN_NOT SPAM");
        assert_eq!(s.len(), 2);

        let queue = s.pending_feedback().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].message, "b");
    }

    #[test]
    fn delete_reports_existence() {
        let s = MemoryFeedbackStore::new();
        let r = s.record_feedback("x", Label::Spam).unwrap();
        assert!(s.delete_feedback(r.id).unwrap());
        assert!(!s.delete_feedback(r.id).unwrap());
        assert!(s.is_empty());
    }

    #[test]
    fn legacy_labels_parse() {
        assert_eq!(
            parse_feedback_label("SPAM").unwrap(),
            (Provenance::User, Label::Spam)
        );
        assert_eq!(
            parse_feedback_label("NOT SPAM").unwrap(),
            (Provenance::User, Label::NotSpam)
        );
        assert_eq!(
            parse_feedback_label("ADMIN_SPAM").unwrap(),
            (Provenance::Admin, Label::Spam)
        );
        assert_eq!(
            parse_feedback_label("admin_not spam").unwrap(),
            (Provenance::Admin, Label::NotSpam)
        );
        assert!(matches!(
            parse_feedback_label("maybe"),
            Err(PipelineError::InvalidLabel { .. })
        ));
    }

    #[test]
    fn legacy_label_round_trips() {
        for p in [Provenance::User, Provenance::Admin] {
            for l in [Label::Spam, Label::NotSpam] {
                assert_eq!(parse_feedback_label(&legacy_label(p, l)).unwrap(), (p, l));
            }
        }
    }
}
