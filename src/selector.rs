//! Strategy selection policy
//!
//! Decides which execution strategy an operation should try first, based on
//! operator overrides, caller-observed signals, accumulated failure
//! momentum, and per-operation-class defaults. Advisory only - the circuit
//! breaker has the authoritative veto.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::OperationContext;
use crate::error::ExecError;
use crate::strategy::Strategy;

/// Momentum threshold at which auto-selection escalates to the browser
const MOMENTUM_ESCALATION: u32 = 2;

/// Outcome half of a history key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Outcome {
    Success,
    Failure,
}

/// Per-(operation, strategy, outcome) marker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HistoryKey {
    operation: String,
    strategy: Strategy,
    outcome: Outcome,
}

/// Advisory selection history, distinct from the circuit breaker
#[derive(Debug, Default)]
struct SelectionHistory {
    seen: HashSet<HistoryKey>,
    /// Operations that exhausted their direct attempt without recovering
    direct_exhausted: HashSet<String>,
    /// Running direct-executor friction counter
    failure_count: u32,
    challenge_seen: bool,
    block_seen: bool,
}

/// Diagnostic projection of selector state
#[derive(Debug, Clone, Serialize)]
pub struct SelectorStats {
    pub preferred: Strategy,
    pub forced: Option<Strategy>,
    pub failure_count: u32,
    pub history_entries: usize,
    pub challenge_seen: bool,
    pub block_seen: bool,
}

/// Picks the primary strategy for each operation
pub struct StrategySelector {
    /// Configured preference; `Auto` means no pin
    preferred: Strategy,
    /// Operator override; wins over everything when set
    forced: Option<Strategy>,
    history: SelectionHistory,
}

impl StrategySelector {
    pub fn new(preferred: Strategy) -> Self {
        Self {
            preferred,
            forced: None,
            history: SelectionHistory::default(),
        }
    }

    /// Select the strategy to try first for this operation
    pub fn select(&self, operation: &str, context: &OperationContext) -> Strategy {
        if let Some(forced) = self.forced {
            info!("Using {} for {} (operator override)", forced, operation);
            return forced;
        }

        if self.preferred.is_concrete() {
            info!("Using {} for {} (configured preference)", self.preferred, operation);
            return self.preferred;
        }

        self.auto_select(operation, context)
    }

    fn auto_select(&self, operation: &str, context: &OperationContext) -> Strategy {
        if context.challenge_detected() {
            info!("Challenge detected for {}, using browser", operation);
            return Strategy::Browser;
        }

        if context.block_detected() {
            info!("Anti-automation signals for {}, using browser", operation);
            return Strategy::Browser;
        }

        if self.history.failure_count >= MOMENTUM_ESCALATION
            || self.history.direct_exhausted.contains(operation)
        {
            info!("Using browser for {} based on failure history", operation);
            return Strategy::Browser;
        }

        match operation {
            "login" | "initial_auth" => {
                // Try the cheap strategy first, escalate after friction
                if self.history.failure_count > 1 {
                    info!(
                        "Using browser for {} after {} direct failures",
                        operation, self.history.failure_count
                    );
                    Strategy::Browser
                } else {
                    info!("Trying direct for {} first", operation);
                    Strategy::Direct
                }
            }
            "trading" | "order_placement" => {
                // Money-moving operations always go through the browser
                info!("Using browser for critical operation: {}", operation);
                Strategy::Browser
            }
            "market_data" | "account_info" | "positions" => {
                info!("Using direct for data operation: {}", operation);
                Strategy::Direct
            }
            _ => {
                info!("Using browser as default for unknown operation: {}", operation);
                Strategy::Browser
            }
        }
    }

    /// The strategy to try if `current` fails; browser is last resort
    pub fn fallback_of(&self, current: Strategy) -> Option<Strategy> {
        match current {
            Strategy::Direct | Strategy::Auto => Some(Strategy::Browser),
            Strategy::Browser => None,
        }
    }

    pub fn record_success(&mut self, operation: &str, strategy: Strategy) {
        self.history.seen.insert(HistoryKey {
            operation: operation.to_string(),
            strategy,
            outcome: Outcome::Success,
        });

        if strategy == Strategy::Direct {
            self.history.failure_count = self.history.failure_count.saturating_sub(1);
        }

        debug!("Recorded success: {} with {}", operation, strategy);
    }

    pub fn record_failure(&mut self, operation: &str, strategy: Strategy, error: &ExecError) {
        self.history.seen.insert(HistoryKey {
            operation: operation.to_string(),
            strategy,
            outcome: Outcome::Failure,
        });

        if strategy == Strategy::Direct {
            self.history.failure_count += 1;
        }

        match error {
            ExecError::ChallengeRequired(_) => self.history.challenge_seen = true,
            ExecError::AutomationBlocked(_) => self.history.block_seen = true,
            _ => {}
        }

        warn!("Recorded failure: {} with {}: {}", operation, strategy, error);
    }

    /// Record that an orchestration exhausted all attempts for `operation`
    ///
    /// Only a terminal direct failure marks the operation for future
    /// browser routing; failures that were recovered by fallback feed the
    /// momentum counter instead.
    pub fn record_exhausted(&mut self, operation: &str, strategy: Strategy) {
        if strategy == Strategy::Direct {
            self.history
                .direct_exhausted
                .insert(operation.to_string());
        }
    }

    /// Operator override for subsequent selections; `None` restores the
    /// configured preference
    pub fn set_forced(&mut self, strategy: Option<Strategy>) {
        match strategy {
            Some(s) if s.is_concrete() => {
                info!("Forcing strategy: {}", s);
                self.forced = Some(s);
            }
            Some(_) | None => {
                info!("Clearing forced strategy");
                self.forced = None;
            }
        }
    }

    /// Clear all selection history and the momentum counter
    pub fn reset(&mut self) {
        self.history = SelectionHistory::default();
        info!("Strategy selection history reset");
    }

    pub fn stats(&self) -> SelectorStats {
        SelectorStats {
            preferred: self.preferred,
            forced: self.forced,
            failure_count: self.history.failure_count,
            history_entries: self.history.seen.len(),
            challenge_seen: self.history.challenge_seen,
            block_seen: self.history.block_seen,
        }
    }
}
