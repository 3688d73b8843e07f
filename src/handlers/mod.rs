//! HTTP request handlers for the prompt-router API

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::Metrics;
use crate::middleware::request_id_middleware;
use crate::router::{Backend, HttpBackend, PromptRouter, RouteSelector, UniformRandomSelector};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod extractor;
pub mod generate;
pub mod health;
pub mod metrics;

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    router: Arc<PromptRouter>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Create the production state: HTTP backend, uniform random selection
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the route table is empty, or
    /// `AppError::Internal` if metrics or the HTTP client cannot be created.
    pub fn new(config: Arc<Config>) -> AppResult<Self> {
        let metrics = Arc::new(Metrics::new().map_err(|e| {
            AppError::Internal(format!("Failed to initialize metrics: {}", e))
        })?);
        let backend = Arc::new(HttpBackend::new(config.request_timeout())?);

        Self::with_parts(
            config,
            Arc::new(UniformRandomSelector::new()),
            backend,
            metrics,
        )
    }

    /// Create state from explicit collaborators
    ///
    /// Used by tests to substitute a deterministic selector or an in-process backend.
    pub fn with_parts(
        config: Arc<Config>,
        selector: Arc<dyn RouteSelector>,
        backend: Arc<dyn Backend>,
        metrics: Arc<Metrics>,
    ) -> AppResult<Self> {
        let registry = Arc::new(config.registry()?);
        let router = PromptRouter::new(registry, selector, backend, metrics.clone())?;

        Ok(Self {
            config,
            router: Arc::new(router),
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &PromptRouter {
        &self.router
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

/// Build the public HTTP application
///
/// Routes: `POST /generate`, `GET /health`, `GET /metrics`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/generate", post(generate::handler))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the side-port application serving only `GET /metrics`
pub fn metrics_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics::handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        toml::from_str(
            r#"
[server]
host = "127.0.0.1"
port = 8000

[routing]
endpoints = "v1=http://localhost:8001/generate,v2=http://localhost:8002/generate"
"#,
        )
        .expect("should parse test config")
    }

    #[test]
    fn test_appstate_new_creates_state() {
        let state = AppState::new(Arc::new(create_test_config())).expect("should create state");

        assert_eq!(state.config().server.port, 8000);
        assert_eq!(state.router().registry().ids(), vec!["v1", "v2"]);
    }

    #[test]
    fn test_appstate_rejects_empty_route_table() {
        let result = AppState::new(Arc::new(Config::default()));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_appstate_is_clonable() {
        let state = AppState::new(Arc::new(create_test_config())).unwrap();
        let state2 = state.clone();
        assert_eq!(state2.router().registry().len(), 2);
    }
}
