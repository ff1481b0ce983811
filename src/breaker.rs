//! Per-strategy circuit breaker
//!
//! Tracks consecutive failures per execution strategy and temporarily
//! excludes a strategy once its failure count reaches the threshold.
//! Recovery is lazy: the open/closed question is re-evaluated whenever the
//! circuit is queried, there is no probe timer.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use crate::strategy::Strategy;

/// Circuit breaker tuning knobs
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Failures required to open a circuit
    pub failure_threshold: u32,
    /// How long an open circuit stays open without further failures
    pub recovery_timeout: Duration,
    /// Recovery back-off per recorded failure when all circuits are open
    pub recovery_delay_step: Duration,
    /// Cap on the recovery back-off
    pub max_recovery_delay: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(300),
            recovery_delay_step: Duration::from_secs(10),
            max_recovery_delay: Duration::from_secs(60),
        }
    }
}

/// State tracked for one strategy
#[derive(Debug, Clone, Default)]
struct CircuitState {
    failure_count: u32,
    last_failure: Option<Instant>,
    is_open: bool,
}

/// Read-only copy of one circuit, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub is_open: bool,
    pub failure_count: u32,
    /// Seconds since the last recorded failure, if any
    pub seconds_since_failure: Option<u64>,
}

/// Failure-tracking state machine shared across all in-flight operations
pub struct CircuitBreaker {
    config: BreakerConfig,
    circuits: RwLock<HashMap<Strategy, CircuitState>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            circuits: RwLock::new(HashMap::new()),
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.config.failure_threshold
    }

    /// Whether the strategy should currently be avoided
    ///
    /// Performs the lazy open -> closed transition: an open circuit whose
    /// recovery timeout has elapsed is closed here, with its failure count
    /// reset to zero.
    pub fn is_open(&self, strategy: Strategy) -> bool {
        {
            let circuits = self.circuits.read().unwrap();
            match circuits.get(&strategy) {
                Some(circuit) if circuit.is_open => {}
                _ => return false,
            }
        }

        // Circuit was open on the read pass; recheck under the write lock
        // since another caller may have recovered it in between.
        let mut circuits = self.circuits.write().unwrap();
        let circuit = circuits.entry(strategy).or_default();
        if !circuit.is_open {
            return false;
        }

        let expired = circuit
            .last_failure
            .map(|t| t.elapsed() > self.config.recovery_timeout)
            .unwrap_or(true);
        if expired {
            info!(
                "Circuit breaker timeout expired for {}, attempting recovery",
                strategy
            );
            circuit.is_open = false;
            circuit.failure_count = 0;
            return false;
        }

        true
    }

    /// Record a failed attempt; opens the circuit at the threshold
    pub fn record_failure(&self, strategy: Strategy) {
        let mut circuits = self.circuits.write().unwrap();
        let circuit = circuits.entry(strategy).or_default();
        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());

        if circuit.failure_count >= self.config.failure_threshold && !circuit.is_open {
            circuit.is_open = true;
            warn!(
                "Circuit breaker opened for {} after {} failures",
                strategy, circuit.failure_count
            );
        }
    }

    /// Record a successful attempt
    ///
    /// Decrements the failure count; a circuit whose count reaches zero is
    /// force-closed immediately rather than waiting out the timeout.
    pub fn record_success(&self, strategy: Strategy) {
        let mut circuits = self.circuits.write().unwrap();
        let circuit = circuits.entry(strategy).or_default();
        circuit.failure_count = circuit.failure_count.saturating_sub(1);

        if circuit.failure_count == 0 && circuit.is_open {
            info!("Circuit breaker closed for {} after success", strategy);
            circuit.is_open = false;
        }
    }

    /// Back-off to apply before forcing an attempt on an open circuit
    pub fn recovery_delay(&self, strategy: Strategy) -> Duration {
        let circuits = self.circuits.read().unwrap();
        let failures = circuits
            .get(&strategy)
            .map(|c| c.failure_count)
            .unwrap_or(0)
            .max(1);
        (self.config.recovery_delay_step * failures).min(self.config.max_recovery_delay)
    }

    /// Operator intervention: close every circuit and zero all counters
    pub fn reset(&self) {
        info!("Resetting all circuit breakers");
        self.circuits.write().unwrap().clear();
    }

    /// Owned per-strategy copies for diagnostics; never mutates state
    ///
    /// Both concrete strategies are always present, even if never used.
    pub fn snapshot(&self) -> HashMap<Strategy, CircuitSnapshot> {
        let circuits = self.circuits.read().unwrap();
        [Strategy::Direct, Strategy::Browser]
            .into_iter()
            .map(|strategy| {
                let state = circuits.get(&strategy).cloned().unwrap_or_default();
                (
                    strategy,
                    CircuitSnapshot {
                        is_open: state.is_open,
                        failure_count: state.failure_count,
                        seconds_since_failure: state.last_failure.map(|t| t.elapsed().as_secs()),
                    },
                )
            })
            .collect()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: timeout,
            ..Default::default()
        })
    }

    #[test]
    fn test_opens_at_threshold() {
        let breaker = breaker(3, Duration::from_secs(300));
        breaker.record_failure(Strategy::Direct);
        breaker.record_failure(Strategy::Direct);
        assert!(!breaker.is_open(Strategy::Direct));
        breaker.record_failure(Strategy::Direct);
        assert!(breaker.is_open(Strategy::Direct));
        // Other strategy unaffected
        assert!(!breaker.is_open(Strategy::Browser));
    }

    #[test]
    fn test_success_decrements_and_closes() {
        let breaker = breaker(2, Duration::from_secs(300));
        breaker.record_failure(Strategy::Browser);
        breaker.record_failure(Strategy::Browser);
        assert!(breaker.is_open(Strategy::Browser));

        // One success: count 1, still open
        breaker.record_success(Strategy::Browser);
        assert!(breaker.is_open(Strategy::Browser));

        // Count reaches zero: force-closed immediately
        breaker.record_success(Strategy::Browser);
        assert!(!breaker.is_open(Strategy::Browser));

        // Floor at zero
        breaker.record_success(Strategy::Browser);
        let snap = breaker.snapshot();
        assert_eq!(snap[&Strategy::Browser].failure_count, 0);
    }

    #[test]
    fn test_lazy_recovery_after_timeout() {
        let breaker = breaker(1, Duration::from_millis(20));
        breaker.record_failure(Strategy::Direct);
        assert!(breaker.is_open(Strategy::Direct));

        std::thread::sleep(Duration::from_millis(40));
        assert!(!breaker.is_open(Strategy::Direct));
        // Recovery resets the count as a side effect
        assert_eq!(breaker.snapshot()[&Strategy::Direct].failure_count, 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let breaker = breaker(1, Duration::from_secs(300));
        breaker.record_failure(Strategy::Direct);
        breaker.record_failure(Strategy::Browser);
        assert!(breaker.is_open(Strategy::Direct));

        breaker.reset();
        assert!(!breaker.is_open(Strategy::Direct));
        assert!(!breaker.is_open(Strategy::Browser));
        let snap = breaker.snapshot();
        assert_eq!(snap[&Strategy::Direct].failure_count, 0);
        assert_eq!(snap[&Strategy::Browser].failure_count, 0);
    }

    #[test]
    fn test_recovery_delay_scales_and_caps() {
        let breaker = CircuitBreaker::default();
        // No failures yet: one step minimum
        assert_eq!(breaker.recovery_delay(Strategy::Direct), Duration::from_secs(10));

        for _ in 0..3 {
            breaker.record_failure(Strategy::Direct);
        }
        assert_eq!(breaker.recovery_delay(Strategy::Direct), Duration::from_secs(30));

        for _ in 0..10 {
            breaker.record_failure(Strategy::Direct);
        }
        assert_eq!(breaker.recovery_delay(Strategy::Direct), Duration::from_secs(60));
    }

    #[test]
    fn test_snapshot_covers_both_strategies() {
        let breaker = CircuitBreaker::default();
        let snap = breaker.snapshot();
        assert_eq!(snap.len(), 2);
        assert!(!snap[&Strategy::Direct].is_open);
        assert!(snap[&Strategy::Direct].seconds_since_failure.is_none());
    }
}
