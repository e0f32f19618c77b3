//! SMS Spam Verdict Service: binary entrypoint.
//! Boots the Axum HTTP server: config, classifier artifact, stores, routes.

use shuttle_axum::ShuttleAxum;
use tracing::{error, info};

use sms_spam_verdict::{build_state, logging, metrics::Metrics, router, AppConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    logging::init_tracing();

    let cfg = AppConfig::load()?;
    info!(
        model = %cfg.model_path.display(),
        db = ?cfg.db_path,
        admin_routes = cfg.admin_routes,
        metrics = cfg.metrics,
        "config loaded"
    );

    // Classifier artifact is loaded exactly once; failure aborts startup.
    let state = build_state(&cfg).inspect_err(|e| error!(error = %e, "startup failed"))?;

    let mut app = router(state);
    if cfg.metrics {
        let m = Metrics::init()?;
        app = app.merge(m.router());
    }

    Ok(app.into())
}
