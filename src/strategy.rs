//! Execution strategy identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available execution strategies
///
/// `Auto` is a configuration sentinel only - it must be resolved to one of
/// the two concrete strategies before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Direct HTTP execution - cheapest, least detectable
    Direct,
    /// Browser-driven execution - can surface human-verification challenges
    Browser,
    /// Let the selector decide per operation
    #[default]
    Auto,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct => "direct",
            Strategy::Browser => "browser",
            Strategy::Auto => "auto",
        }
    }

    /// True for strategies an operation can actually run under
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Strategy::Auto)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Strategy::Direct),
            "browser" => Ok(Strategy::Browser),
            "auto" => Ok(Strategy::Auto),
            other => Err(anyhow::anyhow!(
                "Invalid strategy '{}' (expected direct, browser or auto)",
                other
            )),
        }
    }
}
