//! Fallback orchestration across execution strategies
//!
//! Top-level entry point: picks a primary strategy, lets the circuit
//! breaker veto it, runs the operation, classifies failures and retries
//! with the alternate strategy. One orchestrator instance is shared by all
//! in-flight operations in the process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitSnapshot};
use crate::config::HybridConfig;
use crate::context::OperationContext;
use crate::error::ExecError;
use crate::health::HealthReport;
use crate::selector::{SelectorStats, StrategySelector};
use crate::strategy::Strategy;

/// Transient-failure indicators for otherwise unclassified errors
const TRANSIENT_INDICATORS: &[&str] = &[
    "connection",
    "timeout",
    "network",
    "503",
    "502",
    "500",
    "429",
    "temporary",
    "rate limit",
    "too many requests",
];

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Configured strategy preference; `Auto` enables per-operation selection
    pub preferred: Strategy,
    /// Inter-attempt backoff schedule, clamped to the last entry
    pub retry_delays: Vec<Duration>,
    pub breaker: BreakerConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            preferred: Strategy::Auto,
            retry_delays: vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(5),
            ],
            breaker: BreakerConfig::default(),
        }
    }
}

/// Executes operations with automatic strategy fallback
pub struct FallbackOrchestrator {
    selector: Mutex<StrategySelector>,
    breaker: CircuitBreaker,
    retry_delays: Vec<Duration>,
}

impl FallbackOrchestrator {
    pub fn new(config: &HybridConfig) -> anyhow::Result<Self> {
        Ok(Self::with_config(config.orchestrator_config()?))
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self {
            selector: Mutex::new(StrategySelector::new(config.preferred)),
            breaker: CircuitBreaker::new(config.breaker),
            retry_delays: config.retry_delays,
        }
    }

    /// Execute `operation` with automatic fallback between strategies
    ///
    /// The operation receives the chosen strategy and reports its outcome
    /// as a classified `ExecError`. On total failure the most recent error
    /// is propagated verbatim.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        operation: &str,
        context: &OperationContext,
        op: F,
    ) -> Result<T, ExecError>
    where
        F: Fn(Strategy) -> Fut,
        Fut: Future<Output = Result<T, ExecError>>,
    {
        let mut primary = self.selector.lock().unwrap().select(operation, context);

        if self.breaker.is_open(primary) {
            warn!("Circuit breaker open for {}, looking for fallback", primary);
            let fallback = self.selector.lock().unwrap().fallback_of(primary);
            match fallback {
                Some(f) if !self.breaker.is_open(f) => primary = f,
                _ => {
                    // Every circuit is open. Back off briefly and try the
                    // primary anyway - refusing to try anything would wedge
                    // the caller forever.
                    let delay = self.breaker.recovery_delay(primary);
                    info!(
                        "All circuits open; waiting {:?} before forcing {} for {}",
                        delay, primary, operation
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let mut attempts = vec![primary];
        if let Some(fallback) = self.selector.lock().unwrap().fallback_of(primary) {
            if !self.breaker.is_open(fallback) {
                attempts.push(fallback);
            }
        }

        let total = attempts.len();
        let mut last_error: Option<ExecError> = None;
        let mut last_strategy = primary;

        for (attempt, strategy) in attempts.into_iter().enumerate() {
            info!(
                "Attempting {} with {} (attempt {}/{})",
                operation,
                strategy,
                attempt + 1,
                total
            );
            last_strategy = strategy;

            match op(strategy).await {
                Ok(result) => {
                    self.selector
                        .lock()
                        .unwrap()
                        .record_success(operation, strategy);
                    self.breaker.record_success(strategy);
                    if attempt > 0 {
                        info!(
                            "Fallback successful: {} completed with {}",
                            operation, strategy
                        );
                    }
                    return Ok(result);
                }
                Err(err) => {
                    warn!("{} failed with {}: {}", operation, strategy, err);
                    self.selector
                        .lock()
                        .unwrap()
                        .record_failure(operation, strategy, &err);
                    self.breaker.record_failure(strategy);

                    let is_last = attempt + 1 == total;
                    let retry = !is_last && should_retry(&err, strategy, operation);
                    last_error = Some(err);

                    if is_last || !retry {
                        break;
                    }

                    let delay = self.retry_delay(attempt);
                    debug!("Waiting {:?} before fallback attempt", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        error!(
            "All strategies failed for {}. Last error: {:?}",
            operation, last_error
        );
        self.selector
            .lock()
            .unwrap()
            .record_exhausted(operation, last_strategy);

        Err(last_error
            .unwrap_or_else(|| ExecError::Other(format!("no strategy available for {}", operation))))
    }

    /// Backoff for the given attempt index, clamped to the schedule's tail
    fn retry_delay(&self, attempt: usize) -> Duration {
        self.retry_delays
            .get(attempt)
            .or_else(|| self.retry_delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Force a specific strategy for subsequent selections
    pub fn force_strategy(&self, strategy: Strategy) {
        self.selector.lock().unwrap().set_forced(Some(strategy));
    }

    /// Restore the configured preference
    pub fn clear_forced_strategy(&self) {
        self.selector.lock().unwrap().set_forced(None);
    }

    /// Close every circuit and zero all failure counters
    pub fn reset_breakers(&self) {
        self.breaker.reset();
    }

    /// Clear selection history and the momentum counter
    pub fn reset_history(&self) {
        self.selector.lock().unwrap().reset();
    }

    /// Read-only health projection over the circuit breaker
    pub fn health_check(&self) -> HealthReport {
        HealthReport::from_breaker(&self.breaker)
    }

    /// Raw per-strategy circuit state for diagnostics
    pub fn circuit_status(&self) -> HashMap<Strategy, CircuitSnapshot> {
        self.breaker.snapshot()
    }

    pub fn selector_stats(&self) -> SelectorStats {
        self.selector.lock().unwrap().stats()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

/// Whether a failed attempt should be retried with the fallback strategy
pub fn should_retry(error: &ExecError, strategy: Strategy, operation: &str) -> bool {
    if error.is_validation() {
        debug!(
            "Not retrying validation error for {} via {}",
            operation, strategy
        );
        return false;
    }

    if error.always_retryable() {
        debug!("Retrying {} with fallback after: {}", operation, error);
        return true;
    }

    // Unclassified errors: retry only on recognized transient indicators
    let message = error.to_string().to_lowercase();
    let transient = TRANSIENT_INDICATORS.iter().any(|i| message.contains(i));
    if transient {
        debug!("Retrying {} based on error message: {}", operation, message);
    }
    transient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry_validation_never() {
        let err = ExecError::Validation("quantity must be positive".into());
        assert!(!should_retry(&err, Strategy::Direct, "trading"));
        assert!(!should_retry(&err, Strategy::Browser, "market_data"));
    }

    #[test]
    fn test_should_retry_fallback_classes_always() {
        for err in [
            ExecError::ChallengeRequired("captcha shown".into()),
            ExecError::AutomationBlocked("bot detected".into()),
            ExecError::RateLimited("too fast".into()),
            ExecError::Authentication("session gone".into()),
        ] {
            assert!(should_retry(&err, Strategy::Direct, "login"), "{}", err);
        }
    }

    #[test]
    fn test_should_retry_unclassified_by_message() {
        assert!(should_retry(
            &ExecError::Other("connection reset by peer".into()),
            Strategy::Direct,
            "market_data"
        ));
        assert!(should_retry(
            &ExecError::Other("HTTP 503 Service Unavailable".into()),
            Strategy::Direct,
            "market_data"
        ));
        assert!(!should_retry(
            &ExecError::Other("instrument not found".into()),
            Strategy::Direct,
            "market_data"
        ));
        // Order rejects retry only on transient wording
        assert!(!should_retry(
            &ExecError::OrderReject("insufficient margin".into()),
            Strategy::Browser,
            "order_placement"
        ));
    }

    #[test]
    fn test_from_hybrid_config() {
        assert!(FallbackOrchestrator::new(&HybridConfig::default()).is_ok());

        let bad = HybridConfig {
            preferred_method: "selenium".to_string(),
            ..Default::default()
        };
        assert!(FallbackOrchestrator::new(&bad).is_err());
    }

    #[test]
    fn test_retry_delay_clamps_to_tail() {
        let orchestrator = FallbackOrchestrator::with_config(OrchestratorConfig::default());
        assert_eq!(orchestrator.retry_delay(0), Duration::from_secs(1));
        assert_eq!(orchestrator.retry_delay(1), Duration::from_secs(2));
        assert_eq!(orchestrator.retry_delay(2), Duration::from_secs(5));
        assert_eq!(orchestrator.retry_delay(9), Duration::from_secs(5));
    }
}
