//! Error taxonomy for executed operations
//!
//! Operations wrapped by the orchestrator fail with one of these classes.
//! The retry policy keys off the class; the orchestrator itself never
//! invents new errors - the last operation error is propagated verbatim.

use thiserror::Error;

/// Classified failure of an operation attempt
#[derive(Debug, Error)]
pub enum ExecError {
    /// Malformed arguments or business-rule violations - a different
    /// strategy cannot fix these
    #[error("validation error: {0}")]
    Validation(String),

    /// The platform demands human verification (captcha/bot check)
    #[error("human verification required: {0}")]
    ChallengeRequired(String),

    /// The platform detected and blocked the automation
    #[error("automation blocked: {0}")]
    AutomationBlocked(String),

    /// Too many requests
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Login/session failure
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The platform rejected an order
    #[error("order rejected: {0}")]
    OrderReject(String),

    /// Anything the strategy could not classify
    #[error("{0}")]
    Other(String),
}

impl ExecError {
    /// Errors the fallback mechanism exists to route around
    pub fn always_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ChallengeRequired(_)
                | ExecError::AutomationBlocked(_)
                | ExecError::RateLimited(_)
                | ExecError::Authentication(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ExecError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ExecError::ChallengeRequired("captcha".into()).always_retryable());
        assert!(ExecError::AutomationBlocked("bot detected".into()).always_retryable());
        assert!(ExecError::RateLimited("slow down".into()).always_retryable());
        assert!(ExecError::Authentication("session expired".into()).always_retryable());
        assert!(!ExecError::Validation("bad qty".into()).always_retryable());
        assert!(!ExecError::Other("boom".into()).always_retryable());
    }

    #[test]
    fn test_display() {
        let err = ExecError::RateLimited("429 from /trade".into());
        assert_eq!(err.to_string(), "rate limited: 429 from /trade");
    }
}
