//! Application configuration.
//!
//! Loaded from a TOML file; a missing or malformed file falls back to
//! defaults so a fresh checkout runs without any setup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

/// Default timeout for one step-executor call.
const DEFAULT_EXECUTOR_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database URL; empty means the per-user default location.
    pub database_url: String,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Endpoint of the external step-executor service.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090/execute".to_string(),
            timeout_secs: DEFAULT_EXECUTOR_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, defaulting on any problem.
    pub fn load(path: &Path) -> Self {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config file, using defaults");
                Self::default()
            }
        }
    }

    /// The database URL, falling back to the per-user default.
    pub fn database_url(&self) -> String {
        if self.database_url.is_empty() {
            crate::sqlite::default_database_url()
        } else {
            self.database_url.clone()
        }
    }

    pub fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executor.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/formflow.toml"));
        assert_eq!(config.executor.timeout_secs, DEFAULT_EXECUTOR_TIMEOUT_SECS);
        assert!(config.database_url.is_empty());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formflow.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "database_url = \"sqlite://custom.db\"").unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.database_url, "sqlite://custom.db");
        // Unset sections fall back
        assert_eq!(config.executor.timeout_secs, DEFAULT_EXECUTOR_TIMEOUT_SECS);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formflow.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(
            config.executor.endpoint,
            ExecutorConfig::default().endpoint
        );
    }

    #[test]
    fn test_executor_section_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formflow.toml");
        std::fs::write(
            &path,
            "[executor]\nendpoint = \"https://executor.internal/run\"\ntimeout_secs = 30\n",
        )
        .unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.executor.endpoint, "https://executor.internal/run");
        assert_eq!(config.executor_timeout(), Duration::from_secs(30));
    }
}
