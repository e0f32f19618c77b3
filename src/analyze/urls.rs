//! URL risk scanner.
//!
//! Extracts `http://`, `https://` and `www.` tokens from a message and scores
//! each one with three independent, additive heuristics:
//! - suspicious top-level domain      (+50, "Suspicious TLD")
//! - phishing keyword, any case       (+30, "Suspicious Keyword")
//! - literal IPv4 host               (+80, "IP Address URL")
//!
//! Findings come out in order of first occurrence in the text.

use once_cell::sync::Lazy;
use regex::{Matches, Regex};

use crate::verdict::{RiskLevel, UrlFinding};

pub const SUSPICIOUS_TLDS: &[&str] = &[
    ".xyz", ".top", ".club", ".info", ".gq", ".tk", ".ml", ".ga", ".cf",
];

pub const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "login", "verify", "account", "update", "secure", "bank", "prize", "win",
];

pub const TLD_SCORE: u32 = 50;
pub const KEYWORD_SCORE: u32 = 30;
pub const IP_SCORE: u32 = 80;

pub const REASON_TLD: &str = "Suspicious TLD";
pub const REASON_KEYWORD: &str = "Suspicious Keyword";
pub const REASON_IP: &str = "IP Address URL";

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://\S+|www\.\S+)").expect("url regex"));
static HOST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:https?://)?(?:[^/?#@\s]*@)?([^/?#:\s]+)").expect("host regex")
});
static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").expect("ipv4 regex")
});

/// Lazy iterator over the URL findings of one message.
pub struct UrlScanner<'a> {
    matches: Matches<'static, 'a>,
}

impl<'a> UrlScanner<'a> {
    pub fn new(message: &'a str) -> Self {
        Self {
            matches: URL_RE.find_iter(message),
        }
    }
}

impl Iterator for UrlScanner<'_> {
    type Item = UrlFinding;

    fn next(&mut self) -> Option<Self::Item> {
        self.matches.next().map(|m| score_url(m.as_str()))
    }
}

/// Collect every URL finding of `message`. Empty input yields no findings.
pub fn scan_urls(message: &str) -> Vec<UrlFinding> {
    UrlScanner::new(message).collect()
}

/// Score a single, already extracted URL.
pub fn score_url(url: &str) -> UrlFinding {
    let mut risk_score = 0u32;
    let mut reasons = Vec::new();

    if SUSPICIOUS_TLDS.iter().any(|tld| url.contains(tld)) {
        risk_score += TLD_SCORE;
        reasons.push(REASON_TLD.to_string());
    }

    let lower = url.to_lowercase();
    if SUSPICIOUS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        risk_score += KEYWORD_SCORE;
        reasons.push(REASON_KEYWORD.to_string());
    }

    if has_ipv4_host(url) {
        risk_score += IP_SCORE;
        reasons.push(REASON_IP.to_string());
    }

    UrlFinding {
        url: url.to_string(),
        risk_score,
        risk_level: RiskLevel::from_score(risk_score),
        reasons,
    }
}

/// Host part of a `scheme://[user@]host[:port]/...` or bare `www.` token.
fn host_of(url: &str) -> Option<&str> {
    HOST_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// True when the host is a dotted-quad literal with every octet in `0..=255`.
fn has_ipv4_host(url: &str) -> bool {
    let Some(caps) = host_of(url).and_then(|h| IPV4_RE.captures(h)) else {
        return false;
    };
    caps.iter()
        .skip(1)
        .flatten()
        .all(|octet| octet.as_str().parse::<u8>().is_ok())
}
