//! Run configuration for the plan-execution core.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Lower bound for the evaluation log window.
pub const MIN_EVALUATION_WINDOW: usize = 5;

/// Upper bound for the evaluation log window.
pub const MAX_EVALUATION_WINDOW: usize = 12;

/// Knobs governing a single run of the execution core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Maximum repair passes after the first execution.
    pub max_repair_attempts: usize,
    /// Number of most-recent step records shown to the oracle when
    /// evaluating; clamped to 5..=12 so a superseded early failure is never
    /// confused with a later success for the same step.
    pub evaluation_window: usize,
    /// Maximum supplemental actions the reflection pass may propose.
    pub max_supplements: usize,
    /// Whether the reflection pass runs after the retry loop settles.
    pub reflection_enabled: bool,
    /// Corrective re-prompts allowed per oracle request before the request
    /// is treated as a hard failure.
    pub oracle_retry_limit: usize,
    /// Whether draft arguments are refined by the oracle before invocation.
    pub refine_arguments: bool,
    /// Deadline for a single tool invocation, in milliseconds.
    pub tool_timeout_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 3,
            evaluation_window: 8,
            max_supplements: 3,
            reflection_enabled: true,
            oracle_retry_limit: 2,
            refine_arguments: true,
            tool_timeout_ms: 60_000,
        }
    }
}

impl RunConfig {
    /// Parses a configuration from a TOML string, clamping the evaluation
    /// window into its allowed range.
    ///
    /// # Errors
    /// Returns an error if the TOML is malformed or a value is out of range.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(input)?;
        config.validate()?;
        config.evaluation_window = config
            .evaluation_window
            .clamp(MIN_EVALUATION_WINDOW, MAX_EVALUATION_WINDOW);
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    /// Returns an error if a value cannot be clamped into validity.
    pub fn validate(&self) -> Result<()> {
        if self.tool_timeout_ms == 0 {
            return Err(Error::Config("tool_timeout_ms must be positive".to_owned()));
        }
        if self.max_supplements == 0 && self.reflection_enabled {
            return Err(Error::Config(
                "reflection_enabled requires max_supplements >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}
