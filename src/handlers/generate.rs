//! Generate endpoint handler
//!
//! Handles POST /generate: routes a prompt to one backend and returns the
//! backend's text together with the route used and the round-trip latency.

use crate::error::AppError;
use crate::handlers::AppState;
use crate::middleware::RequestId;
use crate::router::{PromptRequest, RoutedOutcome};
use crate::handlers::extractor::AppJson;
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

/// Generate response to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Route id the prompt was forwarded to
    pub version: String,
    /// Backend `text` field; `null` when the backend omitted it
    pub response: Option<String>,
    /// Backend round-trip time, rounded to milliseconds
    pub latency_seconds: f64,
}

impl From<RoutedOutcome> for GenerateResponse {
    fn from(outcome: RoutedOutcome) -> Self {
        let (version, response, latency_seconds) = outcome.into_parts();
        Self {
            version,
            response,
            latency_seconds,
        }
    }
}

/// Generate handler
///
/// Request validation happens during deserialization of [`PromptRequest`];
/// rejected bodies produce the usual `{"error"}` JSON response.
///
/// # Errors
///
/// - 400 if `version` names an unregistered route
/// - 502 if the backend fails, 504 if it times out
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    AppJson(request): AppJson<PromptRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let span = tracing::info_span!(
        "generate",
        service = %state.config().service.name,
        request_id = %request_id,
    );

    async move {
        tracing::debug!(
            prompt_length = request.prompt().len(),
            route_override = ?request.route(),
            "Received generate request"
        );

        let outcome = state.router().handle(&request).await.inspect_err(|e| {
            if let AppError::UnknownRoute { route, .. } = e {
                tracing::warn!(route = %route, "Rejected request for unknown route");
            }
        })?;

        tracing::info!(
            route = %outcome.route(),
            latency_seconds = outcome.latency_seconds(),
            "Generate request completed"
        );

        Ok::<_, AppError>(Json(GenerateResponse::from(outcome)))
    }
    .instrument(span)
    .await
}
