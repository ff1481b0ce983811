//! Client configuration
//!
//! Loaded from an optional YAML file in the home directory with environment
//! variable overrides, then turned into the orchestrator's tuning knobs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::breaker::BreakerConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::strategy::Strategy;

/// Default config file name under the home directory
const DEFAULT_CONFIG_FILE: &str = ".hybrid-executor.yaml";

/// User-facing configuration surface
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HybridConfig {
    /// "direct", "browser" or "auto" (case-insensitive)
    pub preferred_method: String,
    /// Failures before a strategy's circuit opens
    pub circuit_breaker_threshold: u32,
    /// Seconds an open circuit stays open without further failures
    pub circuit_breaker_timeout_secs: u64,
    /// Inter-attempt backoff schedule in seconds
    pub retry_delays_secs: Vec<u64>,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            preferred_method: "auto".to_string(),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout_secs: 300,
            retry_delays_secs: vec![1, 2, 5],
        }
    }
}

impl HybridConfig {
    /// Load from `~/.hybrid-executor.yaml` if present, then apply
    /// environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = default_config_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Environment overrides; each knob has a variable
    fn apply_env(&mut self) {
        if let Ok(method) = std::env::var("HYBRID_PREFERRED_METHOD") {
            self.preferred_method = method;
        }
        if let Some(threshold) = env_parse("HYBRID_BREAKER_THRESHOLD") {
            self.circuit_breaker_threshold = threshold;
        }
        if let Some(timeout) = env_parse("HYBRID_BREAKER_TIMEOUT_SECS") {
            self.circuit_breaker_timeout_secs = timeout;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.preferred_strategy()?;
        if self.circuit_breaker_threshold == 0 {
            anyhow::bail!("circuit_breaker_threshold must be at least 1");
        }
        Ok(())
    }

    /// The configured preference as a strategy; rejects unknown values
    pub fn preferred_strategy(&self) -> anyhow::Result<Strategy> {
        self.preferred_method.parse()
    }

    pub fn orchestrator_config(&self) -> anyhow::Result<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            preferred: self.preferred_strategy()?,
            retry_delays: self
                .retry_delays_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            breaker: BreakerConfig {
                failure_threshold: self.circuit_breaker_threshold,
                recovery_timeout: Duration::from_secs(self.circuit_breaker_timeout_secs),
                ..Default::default()
            },
        })
    }
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(DEFAULT_CONFIG_FILE)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
