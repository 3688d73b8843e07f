//! Target registry mapping route identifiers to backend addresses
//!
//! The registry is built once at startup from a route table string of
//! comma-separated `id=address` pairs and is read-only afterwards. It is
//! shared by every request handler through an `Arc` without locking.

use crate::error::{AppError, AppResult};
use std::collections::BTreeMap;

/// Immutable mapping of route id to backend address
///
/// Backed by a `BTreeMap` so `ids()` and `iter()` yield routes in a stable
/// order (logs, error messages, and deterministic selectors rely on it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRegistry {
    routes: BTreeMap<String, String>,
}

impl TargetRegistry {
    /// Parse a route table such as `v1=http://vllm1:8001/generate,v2=http://vllm2:8002/generate`
    ///
    /// Each entry is split on its first `=`; identifier and address are trimmed.
    /// Entries without `=` or with an empty identifier are skipped, not rejected.
    /// A repeated identifier keeps the address of its last occurrence.
    ///
    /// An empty input yields an empty registry. Use [`TargetRegistry::require_routes`]
    /// before serving traffic.
    pub fn parse(table: &str) -> Self {
        let mut routes = BTreeMap::new();

        for entry in table.split(',') {
            let Some((id, address)) = entry.split_once('=') else {
                if !entry.trim().is_empty() {
                    tracing::debug!(entry = %entry.trim(), "Skipping route entry without '='");
                }
                continue;
            };

            let id = id.trim();
            if id.is_empty() {
                tracing::debug!(entry = %entry.trim(), "Skipping route entry with empty id");
                continue;
            }

            if let Some(previous) = routes.insert(id.to_string(), address.trim().to_string()) {
                tracing::debug!(
                    route = %id,
                    previous_address = %previous,
                    "Route id repeated in route table, later entry wins"
                );
            }
        }

        Self { routes }
    }

    /// Build a registry from explicit `(id, address)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            routes: pairs
                .into_iter()
                .map(|(id, address)| (id.into(), address.into()))
                .collect(),
        }
    }

    /// Resolve a route id to its backend address
    ///
    /// # Errors
    ///
    /// Returns `AppError::UnknownRoute` if `id` is not registered.
    pub fn resolve(&self, id: &str) -> AppResult<&str> {
        self.routes
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| AppError::UnknownRoute {
                route: id.to_string(),
                available: self.ids().into_iter().map(str::to_string).collect(),
            })
    }

    /// All registered route ids, in sorted order
    pub fn ids(&self) -> Vec<&str> {
        self.routes.keys().map(String::as_str).collect()
    }

    /// Iterate over `(id, address)` pairs in sorted id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|(id, address)| (id.as_str(), address.as_str()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.routes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Reject an empty registry
    ///
    /// The router cannot select a route from an empty set, so an empty route
    /// table must stop the process before the listener is bound.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no route was registered.
    pub fn require_routes(self) -> AppResult<Self> {
        if self.is_empty() {
            return Err(AppError::Config(
                "route table contains no valid 'id=address' entries".to_string(),
            ));
        }
        Ok(self)
    }
}
