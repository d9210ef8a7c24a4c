//! Gateway configuration.
//!
//! Loaded once at startup: defaults, then an optional TOML file named by
//! `GATEWAY_CONFIG`, then `GATEWAY_*` environment overrides.
//!
//! ```toml
//! listen_addr = "0.0.0.0:5000"
//! default_model = "xgboost"
//! relay_timeout_secs = 30
//! probe_timeout_secs = 3
//!
//! [[models]]
//! name = "xgboost"
//! url = "http://localhost:8001"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::registry::{ModelRegistry, RegistryError};

pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG";
const ENV_PREFIX: &str = "GATEWAY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    #[error("probe_timeout_secs must be greater than zero")]
    ZeroProbeTimeout,

    #[error("invalid CORS origin '{0}'")]
    InvalidCorsOrigin(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One `[[models]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    pub url: String,
}

impl ModelConfig {
    fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    /// Model used by `/predict`, which does not name one.
    pub default_model: String,
    /// Upper bound on a prediction call. `0` disables the bound.
    pub relay_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub cors_allow_origin: String,
    pub models: Vec<ModelConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            default_model: "xgboost".to_string(),
            relay_timeout_secs: 30,
            probe_timeout_secs: 3,
            max_body_bytes: 1024 * 1024,
            cors_allow_origin: "*".to_string(),
            models: vec![
                ModelConfig::new("xgboost", "http://localhost:8001"),
                ModelConfig::new("lstm", "http://localhost:8002"),
                ModelConfig::new("gnn", "http://localhost:8003"),
            ],
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from the file named by `GATEWAY_CONFIG`, if
    /// any, and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
        Self::from_figment(Self::figment(path.as_deref())?)
    }

    /// Layers defaults, the optional TOML file at `path` and `GATEWAY_*`
    /// environment variables, later layers winning.
    ///
    /// Environment values use TOML syntax, so models can be replaced with
    /// `GATEWAY_MODELS='[{name="lstm", url="http://lstm:8002"}]'`.
    pub fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = path {
            // Toml::file treats a missing file as empty.
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.to_path_buf()));
            }
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"])))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        self.build_registry()?;
        Ok(())
    }

    /// Builds the immutable model registry from `models`.
    pub fn build_registry(&self) -> Result<ModelRegistry, ConfigError> {
        let entries = self.models.iter().map(|m| (m.name.clone(), m.url.as_str()));
        Ok(ModelRegistry::from_entries(entries)?)
    }

    pub fn relay_timeout(&self) -> Option<Duration> {
        (self.relay_timeout_secs > 0).then(|| Duration::from_secs(self.relay_timeout_secs))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
