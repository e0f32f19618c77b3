//! Keyword-rule category tagger.
//!
//! Groups are evaluated independently on the lowercased message. Within the
//! financial group only the first matching rule fires: a hard financial term
//! wins over a generic scam term.

use crate::verdict::{push_tag, Tag};

pub const FINANCIAL_TERMS: &[&str] = &[
    "bank", "transfer", "account", "verify", "credit", "card", "billing",
];

pub const SCAM_TERMS: &[&str] = &[
    "win", "winner", "cash", "prize", "money", "lottery", "100%", "deposit",
];

pub const URGENCY_TERMS: &[&str] = &[
    "urgent",
    "immediate",
    "act now",
    "limited time",
    "expire",
    "warning",
];

pub const LINK_TERMS: &[&str] = &["http", ".com", "click"];

/// Category tags for `message`, deduplicated, in group order.
pub fn categorize(message: &str) -> Vec<Tag> {
    let text = message.to_lowercase();
    let mut tags = Vec::new();

    if contains_any(&text, FINANCIAL_TERMS) {
        push_tag(&mut tags, Tag::FinancialRisk);
    } else if contains_any(&text, SCAM_TERMS) {
        push_tag(&mut tags, Tag::PotentialScam);
    }

    if contains_any(&text, URGENCY_TERMS) {
        push_tag(&mut tags, Tag::HighUrgency);
    }

    if contains_any(&text, LINK_TERMS) {
        push_tag(&mut tags, Tag::LinkAnalysis);
    }

    tags
}

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}
