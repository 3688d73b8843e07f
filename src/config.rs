//! Configuration management for prompt-router
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section has defaults, so a missing file section (or no file at all)
//! is valid; environment overrides are applied after the file is read.

use crate::error::{AppError, AppResult};
use crate::registry::TargetRegistry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `service.name`
pub const SERVICE_NAME_ENV: &str = "SERVICE_NAME";

/// Environment variable overriding `routing.endpoints`
pub const VLLM_ENDPOINTS_ENV: &str = "VLLM_ENDPOINTS";

/// Upper bound on the backend timeout, in seconds
const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bound on each outbound backend call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

/// Service identity, used only to label telemetry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "prompt-router".to_string()
}

/// Routing configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Route table: comma-separated `id=address` pairs
    ///
    /// Example: `v1=http://vllm1:8001/generate,v2=http://vllm2:8002/generate`
    #[serde(default)]
    pub endpoints: String,
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Optional side port serving `/metrics` in addition to the main listener
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// The file is read, parsed, and validated. Environment overrides are not
    /// applied here; use [`Config::load`] for the full startup sequence.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = Self::read_file(path.as_ref())?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path.as_ref().display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Startup sequence: optional file, then environment overrides, then validation
    ///
    /// Without a file every section takes its defaults, so the route table
    /// must come from `VLLM_ENDPOINTS`.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// [`Config::load`] with an explicit variable lookup in place of the process environment
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => Self::default(),
        };

        config.apply_overrides(lookup);

        config.validate().map_err(|e| match path {
            Some(path) => AppError::ConfigValidationFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
            None => e,
        })?;

        Ok(config)
    }

    fn read_file(path: &Path) -> AppResult<Self> {
        let path_display = path.display().to_string();

        let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
            path: path_display.clone(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
            path: path_display,
            source,
        })
    }

    /// Apply `SERVICE_NAME` and `VLLM_ENDPOINTS` as returned by `lookup`
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(SERVICE_NAME_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(service_name = %name, "Service name overridden from environment");
            self.service.name = name;
        }

        if let Some(endpoints) = lookup(VLLM_ENDPOINTS_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::debug!("Route table overridden from environment");
            self.routing.endpoints = endpoints;
        }
    }

    /// Backend call timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// Build the target registry from the route table
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the table yields no route.
    pub fn registry(&self) -> AppResult<TargetRegistry> {
        TargetRegistry::parse(&self.routing.endpoints).require_routes()
    }

    /// Validate configuration after parsing
    ///
    /// This is called automatically by `from_file()`, but must also be called
    /// explicitly after `apply_overrides()` or when building Config in code.
    pub fn validate(&self) -> AppResult<()> {
        if self.server.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.server.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(AppError::Config(format!(
                "server.request_timeout_seconds cannot exceed {} seconds, got {}",
                MAX_REQUEST_TIMEOUT_SECONDS, self.server.request_timeout_seconds
            )));
        }

        if self.service.name.trim().is_empty() {
            return Err(AppError::Config(
                "service.name cannot be empty".to_string(),
            ));
        }

        if let Some(metrics_port) = self.observability.metrics_port {
            if metrics_port == self.server.port {
                return Err(AppError::Config(format!(
                    "observability.metrics_port ({}) must differ from server.port; \
                    /metrics is already served on the main port",
                    metrics_port
                )));
            }
        }

        let registry = self.registry().map_err(|_| {
            AppError::Config(format!(
                "routing.endpoints must contain at least one 'id=address' entry \
                (set it in the config file or via {}), got '{}'",
                VLLM_ENDPOINTS_ENV, self.routing.endpoints
            ))
        })?;

        for (id, address) in registry.iter() {
            if !address.starts_with("http://") && !address.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "Route '{}' has invalid address '{}'. \
                    Addresses must start with 'http://' or 'https://'.",
                    id, address
                )));
            }
        }

        Ok(())
    }
}
