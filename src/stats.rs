//! Dashboard aggregates over stored history.
//!
//! Category counts are recomputed from the stored message text with the same
//! tagger the pipeline uses. Rows whose timestamp does not parse are left out
//! of the hourly traffic and nothing else.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::debug;

use crate::analyze::categorize;
use crate::history::{HistoryEntry, TIMESTAMP_FORMAT};
use crate::verdict::Tag;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub financial: usize,
    pub urgency: usize,
    pub phishing: usize,
    pub scam: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub spam_count: usize,
    pub ham_count: usize,
    pub categories: CategoryCounts,
    /// `"00:00"` .. `"23:00"` → number of evaluations in that hour of day.
    pub traffic: BTreeMap<String, usize>,
}

pub fn dashboard_stats(rows: &[HistoryEntry]) -> DashboardStats {
    let total = rows.len();
    let spam_count = rows.iter().filter(|r| r.result.is_spam()).count();

    let mut categories = CategoryCounts::default();
    for row in rows {
        let tags = categorize(&row.message);
        if tags.contains(&Tag::FinancialRisk) {
            categories.financial += 1;
        }
        if tags.contains(&Tag::HighUrgency) {
            categories.urgency += 1;
        }
        if tags.contains(&Tag::LinkAnalysis) || row.message.contains("http") {
            categories.phishing += 1;
        }
        if tags.contains(&Tag::PotentialScam) {
            categories.scam += 1;
        }
    }

    let mut traffic: BTreeMap<String, usize> = (0..24).map(|h| (hour_key(h), 0)).collect();
    let mut skipped = 0usize;
    for row in rows {
        match hour_of(&row.timestamp) {
            Some(h) => *traffic.entry(hour_key(h)).or_insert(0) += 1,
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(target: "stats", skipped, "history rows with unparseable timestamps");
    }

    DashboardStats {
        total,
        spam_count,
        ham_count: total - spam_count,
        categories,
        traffic,
    }
}

fn hour_key(h: u32) -> String {
    format!("{h:02}:00")
}

fn hour_of(ts: &str) -> Option<u32> {
    NaiveDateTime::parse_from_str(ts.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.hour())
}
