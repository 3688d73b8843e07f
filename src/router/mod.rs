//! Request routing for prompt-router
//!
//! [`PromptRouter`] picks a route for each prompt (explicit override or the
//! configured [`RouteSelector`]), resolves it through the [`TargetRegistry`],
//! forwards the prompt to the backend, and reports every attempt to a
//! [`RouteObserver`].
//!
//! Per-request lifecycle: `Received -> RouteSelected -> Resolved -> Forwarding -> {Succeeded | Failed}`.
//! There is no retry and no fallback to another route.

pub mod backend;
pub mod selector;

pub use backend::{Backend, BackendError, BackendReply, HttpBackend};
pub use selector::{RouteSelector, UniformRandomSelector};

use crate::error::{AppError, AppResult};
use crate::registry::TargetRegistry;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Prompt request from client
///
/// Validation is enforced during deserialization - a request with an empty
/// prompt cannot exist. On the wire the route override is called `version`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    prompt: String,
    #[serde(rename = "version", skip_serializing_if = "Option::is_none")]
    route: Option<String>,
}

impl PromptRequest {
    /// Create a request without a route override
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if the prompt is empty or whitespace-only.
    pub fn new(prompt: impl Into<String>) -> AppResult<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(AppError::Validation(
                "prompt cannot be empty or contain only whitespace".to_string(),
            ));
        }
        Ok(Self {
            prompt,
            route: None,
        })
    }

    /// Pin the request to a specific route id
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The explicit route override, if present and non-empty
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref().filter(|route| !route.is_empty())
    }
}

impl<'de> Deserialize<'de> for PromptRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawPromptRequest {
            prompt: String,
            #[serde(default)]
            version: Option<String>,
        }

        let raw = RawPromptRequest::deserialize(deserializer)?;

        if raw.prompt.trim().is_empty() {
            return Err(serde::de::Error::custom(
                "prompt cannot be empty or contain only whitespace",
            ));
        }

        Ok(PromptRequest {
            prompt: raw.prompt,
            route: raw.version,
        })
    }
}

/// Result of one successful forwarding attempt
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedOutcome {
    route: String,
    text: Option<String>,
    latency: Duration,
}

impl RoutedOutcome {
    pub fn new(route: String, text: Option<String>, latency: Duration) -> Self {
        Self {
            route,
            text,
            latency,
        }
    }

    /// The route id the request was forwarded to
    pub fn route(&self) -> &str {
        &self.route
    }

    /// The backend's `text` field, if it sent one
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Unrounded duration of the outbound call
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Duration of the outbound call in seconds, rounded to milliseconds
    pub fn latency_seconds(&self) -> f64 {
        round_to_millis(self.latency)
    }

    pub fn into_parts(self) -> (String, Option<String>, f64) {
        let latency_seconds = self.latency_seconds();
        (self.route, self.text, latency_seconds)
    }
}

fn round_to_millis(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 1000.0).round() / 1000.0
}

/// How a forwarding attempt ended
#[derive(Debug, Clone, Copy)]
pub enum AttemptStatus<'a> {
    Succeeded,
    Failed(&'a BackendError),
}

/// Receives routing events at fixed points of the request lifecycle
///
/// `route_resolved` fires once the route id has been resolved to an address;
/// `attempt_completed` fires after every forwarding attempt, whether it
/// succeeded or failed. Neither fires for an unknown route override.
pub trait RouteObserver: Send + Sync {
    fn route_resolved(&self, _route: &str, _address: &str) {}

    fn attempt_completed(&self, route: &str, latency: Duration, status: AttemptStatus<'_>);
}

/// Selects, forwards, and measures prompt requests
pub struct PromptRouter {
    registry: Arc<TargetRegistry>,
    selector: Arc<dyn RouteSelector>,
    backend: Arc<dyn Backend>,
    observer: Arc<dyn RouteObserver>,
}

impl std::fmt::Debug for PromptRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRouter")
            .field("registry", &self.registry)
            .field("selector", &self.selector.name())
            .finish_non_exhaustive()
    }
}

impl PromptRouter {
    /// Create a router over a non-empty registry
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the registry is empty.
    pub fn new(
        registry: Arc<TargetRegistry>,
        selector: Arc<dyn RouteSelector>,
        backend: Arc<dyn Backend>,
        observer: Arc<dyn RouteObserver>,
    ) -> AppResult<Self> {
        if registry.is_empty() {
            return Err(AppError::Config(
                "PromptRouter requires at least one registered route".to_string(),
            ));
        }

        Ok(Self {
            registry,
            selector,
            backend,
            observer,
        })
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Pick the route id for a request
    ///
    /// An explicit override is returned verbatim, even if it is not registered;
    /// resolution reports that case. Otherwise the selector chooses among all
    /// registered ids.
    pub fn select_route(&self, request: &PromptRequest) -> AppResult<String> {
        if let Some(route) = request.route() {
            tracing::debug!(route = %route, "Using explicit route override");
            return Ok(route.to_string());
        }

        let candidates = self.registry.ids();
        let route = self.selector.choose(&candidates).ok_or_else(|| {
            AppError::Internal(format!(
                "selector '{}' returned no route from {} candidates",
                self.selector.name(),
                candidates.len()
            ))
        })?;

        tracing::debug!(
            route = %route,
            selector = self.selector.name(),
            candidates = candidates.len(),
            "Selected route"
        );
        Ok(route.to_string())
    }

    /// Route one prompt request to a backend
    ///
    /// # Errors
    ///
    /// - `AppError::UnknownRoute` if the explicit override is not registered
    ///   (nothing is forwarded and nothing is observed)
    /// - `AppError::BackendUnavailable` if the single forwarding attempt fails
    pub async fn handle(&self, request: &PromptRequest) -> AppResult<RoutedOutcome> {
        let route = self.select_route(request)?;
        let address = self.registry.resolve(&route)?;

        self.observer.route_resolved(&route, address);

        let span = tracing::info_span!(
            "generate_text",
            llm.version = %route,
            llm.endpoint = %address,
        );

        let start = Instant::now();
        let result = self
            .backend
            .generate(address, request.prompt())
            .instrument(span.clone())
            .await;
        let latency = start.elapsed();

        match result {
            Ok(reply) => {
                self.observer
                    .attempt_completed(&route, latency, AttemptStatus::Succeeded);

                span.in_scope(|| {
                    tracing::info!(
                        latency_ms = latency.as_millis() as u64,
                        has_text = reply.text.is_some(),
                        "Backend responded"
                    );
                });

                Ok(RoutedOutcome::new(route, reply.text, latency))
            }
            Err(source) => {
                self.observer
                    .attempt_completed(&route, latency, AttemptStatus::Failed(&source));

                span.in_scope(|| {
                    tracing::warn!(
                        latency_ms = latency.as_millis() as u64,
                        error = %source,
                        kind = source.kind(),
                        "Backend request failed"
                    );
                });

                Err(AppError::BackendUnavailable { route, source })
            }
        }
    }
}
