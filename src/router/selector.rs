//! Route selection strategies
//!
//! The router asks a [`RouteSelector`] for a route whenever a request carries
//! no explicit override. Selection is a trait so tests can substitute a
//! deterministic strategy for the uniform random default.

use rand::Rng;

/// Chooses one route id among the registered candidates
pub trait RouteSelector: Send + Sync {
    /// Pick a route id from `candidates`
    ///
    /// Returns `None` only when `candidates` is empty.
    fn choose<'a>(&self, candidates: &[&'a str]) -> Option<&'a str>;

    /// Strategy name used in logs
    fn name(&self) -> &'static str;
}

/// Uniform random selection: every registered route has probability `1/N`
#[derive(Debug, Default, Clone, Copy)]
pub struct UniformRandomSelector;

impl UniformRandomSelector {
    pub fn new() -> Self {
        Self
    }
}

impl RouteSelector for UniformRandomSelector {
    fn choose<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }

        let mut rng = rand::rng();
        let index = rng.random_range(0..candidates.len());
        Some(candidates[index])
    }

    fn name(&self) -> &'static str {
        "uniform_random"
    }
}
