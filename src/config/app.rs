// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const ENV_CONFIG_PATH: &str = "SPAM_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

pub const ENV_MODEL_PATH: &str = "SPAM_MODEL_PATH";
pub const ENV_DB_PATH: &str = "SPAM_DB_PATH";
pub const ENV_ADMIN_ROUTES: &str = "ADMIN_ROUTES";
pub const ENV_METRICS: &str = "METRICS";
pub const ENV_HISTORY_CAP: &str = "HISTORY_CAP";

fn default_model_path() -> PathBuf {
    PathBuf::from("model/spam_model.json")
}
fn default_history_cap() -> usize {
    2000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// JSON classifier artifact, loaded once at startup.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    /// SQLite file for feedback + history. `None` keeps both in memory.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Mount `/admin/*` (review queue, verification). No auth layer of its own.
    #[serde(default)]
    pub admin_routes: bool,
    /// Mount `/metrics` (Prometheus exposition).
    #[serde(default)]
    pub metrics: bool,
    /// Max rows kept by the in-memory history and returned by `/history`.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            db_path: None,
            admin_routes: false,
            metrics: false,
            history_cap: default_history_cap(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading app config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing app config {}", path.display()))?;
        Ok(cfg)
    }

    /// Resolve config:
    /// 1) $SPAM_CONFIG_PATH (must exist)
    /// 2) config/app.toml if present
    /// 3) built-in defaults
    ///
    /// then apply env overrides.
    pub fn load() -> Result<Self> {
        let base = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };
        base.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(p) = non_empty_env(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(p);
        }
        if let Some(p) = non_empty_env(ENV_DB_PATH) {
            self.db_path = if p == ":memory:" {
                None
            } else {
                Some(PathBuf::from(p))
            };
        }
        if let Some(v) = non_empty_env(ENV_ADMIN_ROUTES) {
            self.admin_routes = parse_flag(&v);
        }
        if let Some(v) = non_empty_env(ENV_METRICS) {
            self.metrics = parse_flag(&v);
        }
        if let Some(v) = non_empty_env(ENV_HISTORY_CAP) {
            self.history_cap = v
                .trim()
                .parse()
                .with_context(|| format!("{ENV_HISTORY_CAP}={v:?} is not a number"))?;
        }
        if self.history_cap == 0 {
            self.history_cap = default_history_cap();
        }
        Ok(self)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            ENV_MODEL_PATH,
            ENV_DB_PATH,
            ENV_ADMIN_ROUTES,
            ENV_METRICS,
            ENV_HISTORY_CAP,
        ] {
            env::remove_var(k);
        }
    }

    #[test]
    fn toml_fills_missing_fields_with_defaults() {
        let cfg: AppConfig = toml::from_str(r#"db_path = "data/spam.db""#).unwrap();
        assert_eq!(cfg.db_path, Some(PathBuf::from("data/spam.db")));
        assert_eq!(cfg.model_path, default_model_path());
        assert_eq!(cfg.history_cap, 2000);
        assert!(!cfg.admin_routes);
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_file() {
        clear_env();
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("app.toml");
        fs::write(&p, "admin_routes = true\nhistory_cap = 10\n").unwrap();

        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        env::set_var(ENV_HISTORY_CAP, "25");
        env::set_var(ENV_METRICS, "on");
        env::set_var(ENV_DB_PATH, ":memory:");

        let cfg = AppConfig::load().unwrap();
        assert!(cfg.admin_routes);
        assert!(cfg.metrics);
        assert_eq!(cfg.history_cap, 25);
        assert_eq!(cfg.db_path, None);
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn missing_explicit_config_is_an_error() {
        clear_env();
        env::set_var(ENV_CONFIG_PATH, "no/such/app.toml");
        assert!(AppConfig::load().is_err());
        clear_env();
    }

    #[serial_test::serial]
    #[test]
    fn bad_history_cap_is_an_error() {
        clear_env();
        env::set_var(ENV_HISTORY_CAP, "lots");
        assert!(AppConfig::default().with_env_overrides().is_err());
        clear_env();
    }
}
