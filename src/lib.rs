//! prompt-router - A/B routing proxy for backend inference services
//!
//! This library routes prompt requests across a table of named backends,
//! choosing uniformly at random unless the caller pins a route, and records
//! per-route request counts and latency.

pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod simulate;
pub mod telemetry;
