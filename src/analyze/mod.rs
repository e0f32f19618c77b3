// src/analyze/mod.rs
//! Heuristic analysis stages that run next to the classifier: URL risk
//! scoring, keyword category tags and the informational spam-keyword list.
//! Each stage is independently callable; the dashboard recomputes tags from
//! stored history without running the full pipeline.

pub mod categories;
pub mod keywords;
pub mod urls;

pub use crate::analyze::categories::categorize;
pub use crate::analyze::keywords::{keywords_found, SPAM_KEYWORDS};
pub use crate::analyze::urls::{scan_urls, score_url, UrlScanner};
