//! Health projection over circuit breaker state
//!
//! Read-only report intended for logging and monitoring, never for
//! programmatic control flow. Building a report must not mutate breaker
//! state, so it works from a snapshot rather than `is_open` queries.

use std::collections::HashMap;

use serde::Serialize;

use crate::breaker::CircuitBreaker;
use crate::strategy::Strategy;

/// Per-strategy health entry
#[derive(Debug, Clone, Serialize)]
pub struct StrategyHealth {
    /// "healthy", "warning" or "circuit_open"
    pub status: String,
    pub failures: u32,
    pub circuit_open: bool,
}

/// Aggregate health report across all strategies
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// "healthy" unless any circuit is open, then "degraded"
    pub overall_status: String,
    pub strategies: HashMap<Strategy, StrategyHealth>,
    /// Human-readable guidance for each non-healthy strategy
    pub recommendations: Vec<String>,
}

impl HealthReport {
    pub fn from_breaker(breaker: &CircuitBreaker) -> Self {
        let threshold = breaker.failure_threshold();
        let mut overall_status = "healthy".to_string();
        let mut strategies = HashMap::new();
        let mut recommendations = Vec::new();

        for (strategy, snapshot) in breaker.snapshot() {
            let status = if snapshot.is_open {
                overall_status = "degraded".to_string();
                recommendations.push(format!(
                    "Circuit breaker open for {} - fallback active",
                    strategy
                ));
                "circuit_open"
            } else if snapshot.failure_count > threshold / 2 {
                recommendations.push(format!(
                    "High failure rate for {} - monitor closely",
                    strategy
                ));
                "warning"
            } else {
                "healthy"
            };

            strategies.insert(
                strategy,
                StrategyHealth {
                    status: status.to_string(),
                    failures: snapshot.failure_count,
                    circuit_open: snapshot.is_open,
                },
            );
        }

        Self {
            overall_status,
            strategies,
            recommendations,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == "healthy"
    }
}
