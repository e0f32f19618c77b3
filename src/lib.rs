// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod feedback;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod stats;
pub mod store;
pub mod verdict;

// URL scanner, category tagger, keyword list
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{categorize, scan_urls};
pub use crate::api::{router, AppState};
pub use crate::classifier::{Classification, Classifier, NaiveBayesModel};
pub use crate::config::AppConfig;
pub use crate::error::{PipelineError, Result};
pub use crate::feedback::{FeedbackRecord, FeedbackStore, LookupMode, MemoryFeedbackStore, Provenance};
pub use crate::pipeline::{Evaluator, Prediction};
pub use crate::verdict::{Label, RiskLevel, Source, Tag, UrlFinding, Verdict};

use std::fs;
use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::history::{HistoryStore, MemoryHistory};
use crate::store::SqliteStore;

/// Build shared state from config: load the classifier (fatal on failure)
/// and open the feedback/history stores.
pub fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let model = NaiveBayesModel::load(&cfg.model_path)?;
    let classifier: Arc<dyn Classifier> = Arc::new(model);

    let (feedback, history): (Arc<dyn FeedbackStore>, Arc<dyn HistoryStore>) = match &cfg.db_path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let store = Arc::new(SqliteStore::open(path)?);
            let feedback: Arc<dyn FeedbackStore> = store.clone();
            let history: Arc<dyn HistoryStore> = store;
            (feedback, history)
        }
        None => {
            info!("no db_path configured; feedback and history kept in memory");
            let feedback: Arc<dyn FeedbackStore> = Arc::new(MemoryFeedbackStore::new());
            let history: Arc<dyn HistoryStore> =
                Arc::new(MemoryHistory::with_capacity(cfg.history_cap));
            (feedback, history)
        }
    };

    Ok(AppState {
        evaluator: Evaluator::new(classifier, feedback),
        history,
        history_cap: cfg.history_cap,
        admin_routes: cfg.admin_routes,
    })
}

/// Full in-process app from `AppConfig::load()` (env + config file).
/// `/metrics` is mounted by the binary, which owns the global recorder.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    Ok(router(build_state(&cfg)?))
}
