//! Hybrid Execution Orchestrator
//!
//! Automation against a platform that resists it cannot rely on a single
//! execution path. This crate picks between a direct-HTTP executor and a
//! browser-driven executor per operation, retries failed operations with
//! the alternate strategy, and keeps a per-strategy circuit breaker so a
//! strategy under sustained blocking is temporarily avoided.
//!
//! The two concrete executors live outside this crate; operations are
//! passed in as closures that accept the chosen [`Strategy`] and report
//! their outcome as a classified [`ExecError`].

pub mod breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod selector;
pub mod session;
pub mod strategy;

// Re-export main types for convenience
pub use breaker::{BreakerConfig, CircuitBreaker, CircuitSnapshot};
pub use config::HybridConfig;
pub use context::OperationContext;
pub use error::ExecError;
pub use health::{HealthReport, StrategyHealth};
pub use orchestrator::{should_retry, FallbackOrchestrator, OrchestratorConfig};
pub use selector::{SelectorStats, StrategySelector};
pub use session::{CookieRecord, SessionSnapshot, SessionSummary, SessionValidation};
pub use strategy::Strategy;
