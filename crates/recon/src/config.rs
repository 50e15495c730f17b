use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::matcher::PrefixMode;

// ---------------------------------------------------------------------------
// Engine config
// ---------------------------------------------------------------------------

/// Tunables for matching and the batch loop. Appears as `[engine]` in a run
/// config; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Persist the full record set after this many evaluated records.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    /// Cap on reference entries sent to the classifier per product.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// How many leading words of the product name select candidates.
    #[serde(default = "default_candidate_tokens")]
    pub candidate_tokens: usize,
    #[serde(default)]
    pub prefix_mode: PrefixMode,
}

fn default_checkpoint_every() -> usize {
    100
}

fn default_max_candidates() -> usize {
    10
}

fn default_candidate_tokens() -> usize {
    2
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            max_candidates: default_max_candidates(),
            candidate_tokens: default_candidate_tokens(),
            prefix_mode: PrefixMode::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.checkpoint_every == 0 {
            return Err(ReconError::ConfigValidation(
                "checkpoint_every must be at least 1".into(),
            ));
        }
        if self.candidate_tokens == 0 {
            return Err(ReconError::ConfigValidation(
                "candidate_tokens must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
