//! Caller-supplied signals about the current attempt
//!
//! The orchestrator never mutates a context; callers are expected to
//! surface fresh signals (status codes, challenge markers) on each call.

use serde::{Deserialize, Serialize};

/// Anti-automation indicators scanned for in error messages
const BLOCK_INDICATORS: &[&str] = &[
    "blocked",
    "forbidden",
    "access denied",
    "security check",
    "unusual activity",
    "automated",
    "bot detected",
    "rate limit",
];

/// Challenge indicators scanned for in error messages
const CHALLENGE_INDICATORS: &[&str] = &["captcha", "challenge", "human verification"];

/// Signal bag describing what the caller observed about the operation
///
/// All fields default to "not observed"; unrecognized keys in serialized
/// input are ignored, not rejected.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OperationContext {
    /// A human-verification challenge is currently displayed
    pub challenge_present: bool,
    /// A prior attempt failed with a challenge-class error
    pub challenge_error: bool,
    /// HTTP status observed on a prior attempt
    pub status_code: Option<u16>,
    /// The platform signalled rate limiting
    pub rate_limited: bool,
    /// A network-level interstitial (CDN challenge page) was served
    pub network_challenge: bool,
    /// The platform explicitly blocked the request
    pub blocked: bool,
    /// Free-text error message from a prior attempt
    pub error_message: Option<String>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a plain key/value map, ignoring unknown keys
    pub fn from_value(value: serde_json::Value) -> anyhow::Result<Self> {
        serde_json::from_value(value).map_err(|e| anyhow::anyhow!("Invalid context: {}", e))
    }

    pub fn with_challenge(mut self) -> Self {
        self.challenge_present = true;
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// True when any signal indicates a human-verification challenge
    pub fn challenge_detected(&self) -> bool {
        if self.challenge_present || self.challenge_error {
            return true;
        }
        self.message_contains(CHALLENGE_INDICATORS)
    }

    /// True when any signal indicates the platform is blocking automation
    pub fn block_detected(&self) -> bool {
        if matches!(self.status_code, Some(403) | Some(429) | Some(503)) {
            return true;
        }
        if self.rate_limited || self.network_challenge || self.blocked {
            return true;
        }
        self.message_contains(BLOCK_INDICATORS)
    }

    fn message_contains(&self, indicators: &[&str]) -> bool {
        match &self.error_message {
            Some(msg) => {
                let msg = msg.to_lowercase();
                indicators.iter().any(|i| msg.contains(i))
            }
            None => false,
        }
    }
}
