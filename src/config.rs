//! TOML configuration.
//!
//! Resolution order: explicit `--config` path, the `POOLPROBE_CONFIG`
//! environment variable, `./poolprobe.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "POOLPROBE_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "poolprobe.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolprobeConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PoolprobeConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration. An explicit path must load; the fallbacks
    /// only warn on failure.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{} set but file could not be loaded, trying fallback",
                        CONFIG_ENV
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// The upload endpoint under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Fixed URL every attempt POSTs to.
    pub endpoint: String,
    /// Multipart field name carrying the artifact.
    pub field_name: String,
    /// Optional transport timeout per attempt. Unset means attempts wait
    /// indefinitely for the server.
    pub request_timeout_secs: Option<u64>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000/UploadInvoice".to_string(),
            field_name: "file".to_string(),
            request_timeout_secs: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Bounds applied by the CLI and API before a run is started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_requests: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_requests: 20 }
    }
}

impl LimitsConfig {
    pub fn check(&self, count: u32) -> std::result::Result<(), String> {
        if count == 0 || count > self.max_requests {
            return Err(format!(
                "request count must be between 1 and {}, got {}",
                self.max_requests, count
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:8090".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = PoolprobeConfig::default();
        assert_eq!(cfg.target.endpoint, "http://localhost:5000/UploadInvoice");
        assert_eq!(cfg.target.field_name, "file");
        assert!(cfg.target.request_timeout_secs.is_none());
        assert_eq!(cfg.limits.max_requests, 20);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: PoolprobeConfig = toml::from_str(
            r#"
            [target]
            endpoint = "http://10.0.0.5:5000/UploadInvoice"
            request_timeout_secs = 90

            [limits]
            max_requests = 50
            "#,
        )
        .unwrap();
        assert_eq!(cfg.target.endpoint, "http://10.0.0.5:5000/UploadInvoice");
        assert_eq!(cfg.target.field_name, "file");
        assert_eq!(cfg.target.request_timeout_secs, Some(90));
        assert_eq!(cfg.limits.max_requests, 50);
        assert_eq!(cfg.api.listen_address, "127.0.0.1:8090");
    }

    #[test]
    fn test_limits_check() {
        let limits = LimitsConfig::default();
        assert!(limits.check(1).is_ok());
        assert!(limits.check(20).is_ok());
        assert!(limits.check(0).is_err());
        assert!(limits.check(21).is_err());
    }

    #[test]
    fn test_explicit_path_must_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\njson = true").unwrap();
        let cfg = PoolprobeConfig::resolve(Some(file.path())).unwrap();
        assert!(cfg.logging.json);

        assert!(PoolprobeConfig::resolve(Some(Path::new("/nonexistent/poolprobe.toml"))).is_err());
    }
}
