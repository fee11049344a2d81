pub mod classifier;
pub mod control;
pub mod engine;
pub mod generator;
pub mod result_aggregator;
pub mod template;
pub mod throttle;

use serde::{Deserialize, Serialize};

/// Value given to every inactive parameter in independent mode.
pub const SENTINEL_VALUE: &str = "BASELINE_VALUE";

/// Builds the placeholder token for a parameter name: `<<FUZZ_name>>`.
pub fn token_for(name: &str) -> String {
    format!("<<FUZZ_{}>>", name)
}

/// How payloads are spread across the selected parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzMode {
    /// One parameter varied at a time, the rest pinned to [`SENTINEL_VALUE`].
    Independent,
    /// Full cross-product over every selected parameter.
    Combinatorial,
}

impl FuzzMode {
    pub fn from_flag(combinatorial: bool) -> Self {
        if combinatorial {
            FuzzMode::Combinatorial
        } else {
            FuzzMode::Independent
        }
    }
}

impl std::fmt::Display for FuzzMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuzzMode::Independent => write!(f, "independent"),
            FuzzMode::Combinatorial => write!(f, "combinatorial"),
        }
    }
}
