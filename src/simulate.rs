//! Traffic generator for exercising a running router
//!
//! Replays prompts from a newline-delimited file against `POST /generate`,
//! pausing a random interval between requests. It is an ordinary HTTP client
//! of the router and shares no state with it.

use crate::error::{AppError, AppResult};
use crate::handlers::generate::GenerateResponse;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Non-empty list of prompts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSource {
    prompts: Vec<String>,
}

impl PromptSource {
    /// Parse newline-delimited prompts; lines are trimmed and blank lines skipped
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no prompt remains.
    pub fn parse(content: &str) -> AppResult<Self> {
        let prompts: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if prompts.is_empty() {
            return Err(AppError::Config(
                "prompt source contains no non-empty lines".to_string(),
            ));
        }

        Ok(Self { prompts })
    }

    /// Read and parse a prompt file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path.as_ref().display().to_string(),
                source,
            })?;
        Self::parse(&content)
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Always false: construction rejects empty sources
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Pick a prompt uniformly at random
    pub fn pick(&self) -> &str {
        let index = rand::rng().random_range(0..self.prompts.len());
        &self.prompts[index]
    }
}

/// Generator settings
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateOptions {
    /// Router base URL without trailing slash
    pub target: String,
    /// Route override sent as `version`
    pub version: Option<String>,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Stop after this many requests; `None` runs forever
    pub requests: Option<u64>,
}

/// Why a simulated request failed
#[derive(Debug, Error)]
pub enum SimulateError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("router returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Totals collected over a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub sent: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Successful responses by the route the router reported
    pub per_route: BTreeMap<String, u64>,
}

#[derive(Serialize)]
struct SimulatedRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

/// Sends prompts to the router at a paced interval
pub struct TrafficGenerator {
    client: reqwest::Client,
    source: PromptSource,
    options: SimulateOptions,
}

impl TrafficGenerator {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(source: PromptSource, options: SimulateOptions) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            source,
            options,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.options.target)
    }

    fn next_wait(&self) -> Duration {
        let (min, max) = (self.options.min_wait, self.options.max_wait);
        if min >= max {
            return min;
        }
        Duration::from_secs_f64(rand::rng().random_range(min.as_secs_f64()..max.as_secs_f64()))
    }

    /// Send a single prompt and decode the router's response
    pub async fn send_one(&self, prompt: &str) -> Result<GenerateResponse, SimulateError> {
        let response = self
            .client
            .post(self.generate_url())
            .json(&SimulatedRequest {
                prompt,
                version: self.options.version.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimulateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<GenerateResponse>().await?)
    }

    /// Run until the request limit is reached (or forever without one)
    ///
    /// Individual failures are logged and counted; they never stop the run.
    pub async fn run(&self) -> SimulationReport {
        let mut report = SimulationReport::default();

        tracing::info!(
            target_url = %self.generate_url(),
            prompts = self.source.len(),
            version = ?self.options.version,
            limit = ?self.options.requests,
            "Starting traffic generator"
        );

        while self
            .options
            .requests
            .is_none_or(|limit| report.sent < limit)
        {
            let prompt = self.source.pick();
            report.sent += 1;

            match self.send_one(prompt).await {
                Ok(response) => {
                    report.succeeded += 1;
                    *report.per_route.entry(response.version.clone()).or_insert(0) += 1;
                    tracing::info!(
                        route = %response.version,
                        latency_seconds = response.latency_seconds,
                        has_response = response.response.is_some(),
                        "Prompt served"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(error = %e, "Prompt failed");
                }
            }

            let finished = self
                .options
                .requests
                .is_some_and(|limit| report.sent >= limit);
            if !finished {
                tokio::time::sleep(self.next_wait()).await;
            }
        }

        tracing::info!(
            sent = report.sent,
            succeeded = report.succeeded,
            failed = report.failed,
            "Traffic generator finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(target: &str, requests: u64) -> SimulateOptions {
        SimulateOptions {
            target: target.to_string(),
            version: None,
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            requests: Some(requests),
        }
    }

    #[test]
    fn test_parse_skips_blank_lines_and_trims() {
        let source = PromptSource::parse("  first prompt \n\n\t\nsecond prompt\n").unwrap();
        assert_eq!(source.prompts(), ["first prompt", "second prompt"]);
    }

    #[test]
    fn test_parse_rejects_empty_source() {
        assert!(matches!(
            PromptSource::parse("\n  \n"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_pick_returns_a_known_prompt() {
        let source = PromptSource::parse("a\nb\nc").unwrap();
        for _ in 0..50 {
            assert!(source.prompts().iter().any(|p| p == source.pick()));
        }
    }

    #[test]
    fn test_next_wait_stays_in_bounds() {
        let generator = TrafficGenerator::new(
            PromptSource::parse("a").unwrap(),
            SimulateOptions {
                min_wait: Duration::from_millis(100),
                max_wait: Duration::from_millis(300),
                ..options("http://localhost:8000", 1)
            },
        )
        .unwrap();

        for _ in 0..50 {
            let wait = generator.next_wait();
            assert!(wait >= Duration::from_millis(100) && wait <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_request_body_omits_absent_version() {
        let body = serde_json::to_value(SimulatedRequest {
            prompt: "hi",
            version: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"prompt": "hi"}));
    }
}
