//! # Statistical Classifier
//! Opaque, pre-trained spam model loaded once at startup and shared read-only.
//!
//! The artifact is a JSON export of a TF-IDF vectoriser plus a multinomial
//! Naive Bayes model:
//!
//! ```json
//! {
//!   "classes": ["ham", "spam"],
//!   "class_log_prior": [-0.14, -2.01],
//!   "feature_log_prob": [[...], [...]],
//!   "vocabulary": { "free": 0, "prize": 1 },
//!   "idf": [2.3, 3.1]
//! }
//! ```
//!
//! Class order is whatever the exporter wrote; the spam column is found by
//! name. Training is out of scope.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::verdict::Label;

/// Class name that maps to [`Label::Spam`].
pub const SPAM_CLASS: &str = "spam";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token regex"));

/// Output of one classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: Label,
    /// Probability of the spam class, as a percentage in `[0, 100]`.
    pub spam_probability: f64,
}

/// Seam for the evaluation pipeline; tests substitute a fixed double.
pub trait Classifier: Send + Sync {
    fn classify(&self, message: &str) -> Classification;
}

#[derive(Debug, Deserialize)]
struct Artifact {
    classes: Vec<String>,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

#[derive(Debug)]
pub struct NaiveBayesModel {
    classes: Vec<String>,
    spam_index: usize,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl NaiveBayesModel {
    /// Load from a JSON artifact on disk. Any failure is fatal for the caller.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| PipelineError::artifact(path, e))?;
        let model = Self::from_json_str(&raw).map_err(|e| match e {
            PipelineError::ArtifactLoad { details, .. } => PipelineError::artifact(path, details),
            other => other,
        })?;
        info!(
            target: "classifier",
            path = %path.display(),
            classes = ?model.classes,
            vocabulary = model.vocabulary.len(),
            "classifier artifact loaded"
        );
        Ok(model)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let art: Artifact =
            serde_json::from_str(raw).map_err(|e| PipelineError::artifact("<inline>", e))?;
        Self::from_artifact(art)
    }

    fn from_artifact(art: Artifact) -> Result<Self> {
        let bad = |details: String| PipelineError::artifact("<inline>", details);

        let n_classes = art.classes.len();
        if n_classes < 2 {
            return Err(bad(format!("expected at least 2 classes, got {n_classes}")));
        }
        let spam_index = art
            .classes
            .iter()
            .position(|c| c == SPAM_CLASS)
            .ok_or_else(|| bad(format!("no '{SPAM_CLASS}' class in {:?}", art.classes)))?;
        if art.class_log_prior.len() != n_classes || art.feature_log_prob.len() != n_classes {
            return Err(bad("class_log_prior / feature_log_prob do not match classes".into()));
        }
        let n_features = art.idf.len();
        if let Some(row) = art.feature_log_prob.iter().find(|r| r.len() != n_features) {
            return Err(bad(format!(
                "feature_log_prob row has {} features, idf has {n_features}",
                row.len()
            )));
        }
        if let Some((term, idx)) = art.vocabulary.iter().find(|(_, idx)| **idx >= n_features) {
            return Err(bad(format!("vocabulary term {term:?} -> {idx} out of range")));
        }

        Ok(Self {
            classes: art.classes,
            spam_index,
            class_log_prior: art.class_log_prior,
            feature_log_prob: art.feature_log_prob,
            vocabulary: art.vocabulary,
            idf: art.idf,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Sparse L2-normalised TF-IDF vector: `(feature index, weight)`.
    fn vectorize(&self, message: &str) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for m in TOKEN_RE.find_iter(message) {
            let tok = m.as_str().to_lowercase();
            if let Some(&idx) = self.vocabulary.get(&tok) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        let norm = features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut features {
                *w /= norm;
            }
        }
        features.sort_by_key(|(idx, _)| *idx);
        features
    }

    /// Class probabilities in artifact class order.
    pub fn predict_proba(&self, message: &str) -> Vec<f64> {
        let x = self.vectorize(message);
        let jll: Vec<f64> = self
            .class_log_prior
            .iter()
            .zip(&self.feature_log_prob)
            .map(|(prior, row)| prior + x.iter().map(|(i, w)| w * row[*i]).sum::<f64>())
            .collect();

        // log-sum-exp for a stable softmax
        let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = jll.iter().map(|v| (v - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        exps.into_iter().map(|e| e / total).collect()
    }
}

impl Classifier for NaiveBayesModel {
    fn classify(&self, message: &str) -> Classification {
        let proba = self.predict_proba(message);
        let best = proba
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > proba[best] { i } else { best });
        let label = if best == self.spam_index {
            Label::Spam
        } else {
            Label::NotSpam
        };
        Classification {
            label,
            spam_probability: proba[self.spam_index] * 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny two-class artifact; spam column deliberately first.
    const TINY_MODEL: &str = r#"{
        "classes": ["spam", "ham"],
        "class_log_prior": [-1.6094, -0.2231],
        "feature_log_prob": [
            [-0.6931, -0.9163, -3.0, -3.0],
            [-3.0, -3.0, -0.6931, -0.9163]
        ],
        "vocabulary": { "free": 0, "prize": 1, "lunch": 2, "tomorrow": 3 },
        "idf": [1.5, 1.7, 1.4, 1.2]
    }"#;

    #[test]
    fn spam_class_found_by_name_not_index() {
        let m = NaiveBayesModel::from_json_str(TINY_MODEL).unwrap();
        let c = m.classify("FREE prize!!");
        assert_eq!(c.label, Label::Spam);
        assert!(c.spam_probability > 50.0 && c.spam_probability <= 100.0);

        let c = m.classify("lunch tomorrow?");
        assert_eq!(c.label, Label::NotSpam);
        assert!(c.spam_probability < 50.0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let m = NaiveBayesModel::from_json_str(TINY_MODEL).unwrap();
        for text in ["free lunch", "", "unknown words only"] {
            let p = m.predict_proba(text);
            assert_eq!(p.len(), 2);
            assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn unknown_text_falls_back_to_priors() {
        let m = NaiveBayesModel::from_json_str(TINY_MODEL).unwrap();
        let c = m.classify("zzz");
        // priors: spam 0.2, ham 0.8
        assert_eq!(c.label, Label::NotSpam);
        assert!((c.spam_probability - 20.0).abs() < 0.1);
    }

    #[test]
    fn missing_spam_class_is_load_error() {
        let raw = TINY_MODEL.replace("\"spam\", \"ham\"", "\"junk\", \"ham\"");
        let err = NaiveBayesModel::from_json_str(&raw).unwrap_err();
        assert_eq!(err.code(), "SPAM-2001");
    }

    #[test]
    fn shape_mismatch_is_load_error() {
        let raw = TINY_MODEL.replace("[1.5, 1.7, 1.4, 1.2]", "[1.5, 1.7]");
        assert!(matches!(
            NaiveBayesModel::from_json_str(&raw),
            Err(PipelineError::ArtifactLoad { .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = NaiveBayesModel::load("definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.json"));
    }
}
