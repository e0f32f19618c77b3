//! verdict.rs: output shapes of the evaluation pipeline.
//!
//! A `Verdict` is built per request and never retained; persistence of the
//! resulting history row belongs to the store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Confidence reported for every human override.
pub const VERIFIED_CONFIDENCE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "SPAM")]
    Spam,
    #[serde(rename = "NOT SPAM")]
    NotSpam,
}

impl Label {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spam => "SPAM",
            Self::NotSpam => "NOT SPAM",
        }
    }

    pub const fn is_spam(self) -> bool {
        matches!(self, Self::Spam)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the label of a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Model,
    UserOverride,
    AdminOverride,
}

impl Source {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "MODEL",
            Self::UserOverride => "USER_OVERRIDE",
            Self::AdminOverride => "ADMIN_OVERRIDE",
        }
    }

    pub const fn is_override(self) -> bool {
        !matches!(self, Self::Model)
    }
}

/// Semantic risk tags attached to a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    #[serde(rename = "Financial Risk")]
    FinancialRisk,
    #[serde(rename = "Potential Scam")]
    PotentialScam,
    #[serde(rename = "High Urgency")]
    HighUrgency,
    #[serde(rename = "Link Analysis")]
    LinkAnalysis,
    #[serde(rename = "User/Admin Override")]
    Override,
}

impl Tag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FinancialRisk => "Financial Risk",
            Self::PotentialScam => "Potential Scam",
            Self::HighUrgency => "High Urgency",
            Self::LinkAnalysis => "Link Analysis",
            Self::Override => "User/Admin Override",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Push `tag` unless already present, keeping first-insertion order.
pub(crate) fn push_tag(tags: &mut Vec<Tag>, tag: Tag) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

/// Severity bucket over a URL risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    None,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// `>70` critical, `>30` high, `>0` medium, otherwise none.
    pub const fn from_score(score: u32) -> Self {
        if score > 70 {
            Self::Critical
        } else if score > 30 {
            Self::High
        } else if score > 0 {
            Self::Medium
        } else {
            Self::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlFinding {
    pub url: String,
    /// Sum of triggered signal contributions; unbounded above.
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    /// Triggered signal names, in check order.
    pub reasons: Vec<String>,
}

impl UrlFinding {
    /// Comma-joined reasons, or `"None"` when no signal fired.
    pub fn reasons_text(&self) -> String {
        if self.reasons.is_empty() {
            "None".to_string()
        } else {
            self.reasons.join(", ")
        }
    }
}

/// Final decision plus the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub label: Label,
    /// Percentage in `[0, 100]`; exactly [`VERIFIED_CONFIDENCE`] for overrides.
    pub confidence: f64,
    pub source: Source,
    pub tags: Vec<Tag>,
    pub url_findings: Vec<UrlFinding>,
    /// Informational spam keywords found in the message; never affects the label.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Verdict {
    /// Human-readable confidence: `"87.23%"` or `"50% (Verified)"`.
    pub fn confidence_text(&self) -> String {
        if self.source.is_override() {
            "50% (Verified)".to_string()
        } else {
            format!("{:.2}%", self.confidence)
        }
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::None);
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(71), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(160), RiskLevel::Critical);
    }

    #[test]
    fn reasons_text_falls_back_to_none() {
        let mut f = UrlFinding {
            url: "http://example.org".into(),
            risk_score: 0,
            risk_level: RiskLevel::None,
            reasons: vec![],
        };
        assert_eq!(f.reasons_text(), "None");
        f.reasons = vec!["Suspicious TLD".into(), "IP Address URL".into()];
        assert_eq!(f.reasons_text(), "Suspicious TLD, IP Address URL");
    }

    #[test]
    fn serde_uses_display_strings() {
        let v = serde_json::to_value((Label::NotSpam, Tag::Override, Source::AdminOverride)).unwrap();
        assert_eq!(v[0], "NOT SPAM");
        assert_eq!(v[1], "User/Admin Override");
        assert_eq!(v[2], "ADMIN_OVERRIDE");
    }

    #[test]
    fn confidence_text_by_source() {
        let mut v = Verdict {
            label: Label::Spam,
            confidence: 87.2345,
            source: Source::Model,
            tags: vec![],
            url_findings: vec![],
            keywords: vec![],
        };
        assert_eq!(v.confidence_text(), "87.23%");
        v.source = Source::UserOverride;
        v.confidence = VERIFIED_CONFIDENCE;
        assert_eq!(v.confidence_text(), "50% (Verified)");
    }

    #[test]
    fn push_tag_dedups() {
        let mut tags = vec![Tag::LinkAnalysis];
        push_tag(&mut tags, Tag::FinancialRisk);
        push_tag(&mut tags, Tag::LinkAnalysis);
        assert_eq!(tags, vec![Tag::LinkAnalysis, Tag::FinancialRisk]);
    }
}
