//! # Evaluation Pipeline
//! Turns one message into a [`Verdict`]. Pure apart from the feedback read;
//! no I/O of its own, no locking, safe to share across request tasks.
//!
//! Order: override lookup → URL scan (always; a risky URL tags the verdict on
//! both paths) → either the override or the classifier plus category tags →
//! informational keyword list.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyze::{categorize, keywords_found, scan_urls};
use crate::classifier::Classifier;
use crate::error::{PipelineError, Result};
use crate::feedback::{resolve_override, FeedbackStore, LookupMode};
use crate::verdict::{push_tag, Source, Tag, Verdict, VERIFIED_CONFIDENCE};

/// Result of the programmatic predict path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// `"spam"` or `"ham"`.
    pub prediction: String,
    pub spam_probability: f64,
    pub is_spam: bool,
    /// Category tags, only when the message is spam.
    pub tags: Vec<Tag>,
}

#[derive(Clone)]
pub struct Evaluator {
    classifier: Arc<dyn Classifier>,
    feedback: Arc<dyn FeedbackStore>,
}

impl Evaluator {
    pub fn new(classifier: Arc<dyn Classifier>, feedback: Arc<dyn FeedbackStore>) -> Self {
        Self {
            classifier,
            feedback,
        }
    }

    pub fn feedback(&self) -> &Arc<dyn FeedbackStore> {
        &self.feedback
    }

    /// Full verdict for the interactive path (admin-first override lookup).
    pub fn evaluate(&self, message: &str) -> Result<Verdict> {
        ensure_message(message)?;
        let started = Instant::now();

        let over = resolve_override(self.feedback.as_ref(), message, LookupMode::Interactive)?;
        let url_findings = scan_urls(message);

        let mut tags = Vec::new();
        if url_findings.iter().any(|f| f.risk_score > 0) {
            push_tag(&mut tags, Tag::LinkAnalysis);
        }

        let (label, confidence, source) = match over {
            Some(o) => {
                push_tag(&mut tags, Tag::Override);
                counter!("spam_overrides_total", "source" => o.source().as_str()).increment(1);
                (o.label, VERIFIED_CONFIDENCE, o.source())
            }
            None => {
                let c = self.classifier.classify(message);
                for tag in categorize(message) {
                    push_tag(&mut tags, tag);
                }
                (c.label, c.spam_probability, Source::Model)
            }
        };

        let verdict = Verdict {
            label,
            confidence,
            source,
            tags,
            url_findings,
            keywords: keywords_found(message),
        };

        counter!(
            "spam_verdicts_total",
            "label" => label.as_str(),
            "source" => source.as_str()
        )
        .increment(1);
        histogram!("spam_evaluate_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
        debug!(
            target: "pipeline",
            label = %verdict.label,
            source = verdict.source.as_str(),
            confidence = verdict.confidence,
            urls = verdict.url_findings.len(),
            "verdict"
        );
        Ok(verdict)
    }

    /// Programmatic path: newest feedback wins regardless of provenance, no URL scan.
    pub fn predict(&self, message: &str) -> Result<Prediction> {
        ensure_message(message)?;

        let (label, spam_probability) =
            match resolve_override(self.feedback.as_ref(), message, LookupMode::Latest)? {
                Some(o) => (o.label, VERIFIED_CONFIDENCE),
                None => {
                    let c = self.classifier.classify(message);
                    (c.label, c.spam_probability)
                }
            };

        let is_spam = label.is_spam();
        Ok(Prediction {
            prediction: if is_spam { "spam" } else { "ham" }.to_string(),
            spam_probability,
            is_spam,
            tags: if is_spam { categorize(message) } else { Vec::new() },
        })
    }
}

fn ensure_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(PipelineError::EmptyMessage);
    }
    Ok(())
}
