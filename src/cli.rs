//! Command-line interface for prompt-router
//!
//! Provides argument parsing and subcommand handling for the prompt-router binary.

use crate::error::{AppError, AppResult};
use crate::simulate::SimulateOptions;
use clap::{Args, Parser, Subcommand};
use std::time::Duration;

/// Default config file, used when `--config` is not given and the file exists
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// A/B routing proxy for backend inference services
#[derive(Parser)]
#[command(name = "prompt-router")]
#[command(version)]
#[command(about = "A/B routing proxy for backend inference services")]
#[command(
    long_about = "prompt-router spreads POST /generate requests across a table of backend \
    inference services, picking a route uniformly at random unless the request names one, \
    and records per-route request counts and latency for Prometheus."
)]
pub struct Cli {
    /// Path to configuration file (defaults to ./config.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replay prompts from a file against a running router
    Simulate(SimulateArgs),
}

/// Arguments for the `simulate` subcommand
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Newline-delimited prompt file (blank lines are ignored)
    #[arg(long, env = "PROMPT_FILE_PATH", default_value = "prompts.txt")]
    pub prompts: String,

    /// Base URL of the router
    #[arg(long, env = "VLLM_PROXY_HOST", default_value = "http://localhost:8000")]
    pub target: String,

    /// Pin every request to this route instead of letting the router choose
    #[arg(long)]
    pub version: Option<String>,

    /// Minimum pause between requests, in seconds
    #[arg(long, default_value_t = 1.0)]
    pub min_wait: f64,

    /// Maximum pause between requests, in seconds
    #[arg(long, default_value_t = 3.0)]
    pub max_wait: f64,

    /// Stop after this many requests (runs until interrupted if omitted)
    #[arg(long)]
    pub requests: Option<u64>,
}

impl SimulateArgs {
    /// Convert parsed arguments into validated generator options
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if a wait is negative, not finite, too
    /// large for a `Duration`, or if `min_wait` exceeds `max_wait`.
    pub fn options(&self) -> AppResult<SimulateOptions> {
        for (name, value) in [("min-wait", self.min_wait), ("max-wait", self.max_wait)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "--{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }

        if self.min_wait > self.max_wait {
            return Err(AppError::Validation(format!(
                "--min-wait ({}) cannot exceed --max-wait ({})",
                self.min_wait, self.max_wait
            )));
        }

        Ok(SimulateOptions {
            target: self.target.trim_end_matches('/').to_string(),
            version: self.version.clone().filter(|v| !v.is_empty()),
            min_wait: wait_duration("min-wait", self.min_wait)?,
            max_wait: wait_duration("max-wait", self.max_wait)?,
            requests: self.requests,
        })
    }
}

fn wait_duration(name: &str, seconds: f64) -> AppResult<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        AppError::Validation(format!("--{} {} is out of range: {}", name, seconds, e))
    })
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# prompt-router configuration
# ===========================
#
# Every section is optional; missing values fall back to the defaults shown here.
# SERVICE_NAME and VLLM_ENDPOINTS in the environment override the file.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port serving POST /generate, GET /health and GET /metrics
port = 8000

# Timeout for each backend call in seconds (1-300)
request_timeout_seconds = 30

# ─────────────────────────────────────────────────────────────────────────────
# SERVICE
# ─────────────────────────────────────────────────────────────────────────────

[service]
# Name attached to every request span
name = "prompt-router"

# ─────────────────────────────────────────────────────────────────────────────
# ROUTING
# ─────────────────────────────────────────────────────────────────────────────
#
# Comma-separated id=address pairs. Requests without a "version" field are
# spread uniformly at random across all routes. Entries without '=' are ignored.

[routing]
endpoints = "v1=http://vllm1:8001/generate,v2=http://vllm2:8002/generate"

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error" (RUST_LOG takes precedence)
log_level = "info"

# Also serve /metrics on a separate port (uncomment to enable)
# metrics_port = 9100
"#
}
