//! Configuration loading for the autonomy engine.
//!
//! All tunables live in one immutable `AutonomyConfig` that is handed to each
//! evaluation pass. It can be loaded from a TOML file; missing sections and
//! fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::curve::Curve;

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutonomyConfig {
    /// Motive widening and candidate sampling
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Utility multipliers
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Tuned response curves
    #[serde(default)]
    pub curves: CurveConfig,
    /// Cooperative time-slicing
    #[serde(default)]
    pub time_slicing: TimeSlicingConfig,
    /// Mixer selection
    #[serde(default)]
    pub mixer: MixerConfig,
}

impl AutonomyConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, TomlSerializeError> {
        toml::to_string_pretty(self).map_err(TomlSerializeError)
    }

    /// Returns a copy with time-slicing disabled, for harnesses that want a pass
    /// to run to completion in one step.
    pub fn without_time_slicing(mut self) -> Self {
        self.time_slicing.enabled = false;
        self
    }

    pub fn with_duplicate_group_cap(mut self, cap: usize) -> Self {
        self.selection.duplicate_group_cap = cap;
        self
    }

    pub fn with_motive_variance(mut self, variance: f32) -> Self {
        self.selection.motive_variance = variance;
        self
    }
}

/// Motive widening and duplicate sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Fraction of the top motive's urgency a motive must reach to be pursued this round
    pub motive_variance: f32,
    /// Maximum candidates scored per duplicate group
    pub duplicate_group_cap: usize,
    /// Scores at or below this value are reported as exactly zero
    pub zero_score_epsilon: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            motive_variance: 0.9,
            duplicate_group_cap: 3,
            zero_score_epsilon: 1e-5,
        }
    }
}

/// Multipliers applied while scoring a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Applied to a motive the actor is already solving through a running activity
    pub already_solving_dampener: f32,
    /// Applied to the opportunity cost when the candidate needs a posture change
    pub posture_change_opportunity_multiplier: f32,
    /// Applied when the candidate targets the actor's preferred object
    pub object_preference_multiplier: f32,
    /// Applied when the target is off the active lot while the actor is on it
    pub off_lot_multiplier: f32,
    /// Applied once per player-controlled member of the target's group
    pub player_member_penalty: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            already_solving_dampener: 0.25,
            posture_change_opportunity_multiplier: 1.5,
            object_preference_multiplier: 1.5,
            off_lot_multiplier: 0.5,
            player_member_penalty: 1.0,
        }
    }
}

/// Tuned curves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Total attention cost -> base multitasking percentage
    pub attention_cost_to_percentage: Curve,
    /// Motive urgency -> multitasking bonus (and symmetric penalty)
    pub desire_to_bonus: Curve,
    /// Social group size -> utility multiplier
    pub group_size_utility: Curve,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            attention_cost_to_percentage: Curve::new(vec![(0.0, 1.0), (1.0, 1.0), (3.0, 0.0)]),
            desire_to_bonus: Curve::new(vec![(0.0, 0.0), (10.0, 0.1)]),
            group_size_utility: Curve::constant(1.0),
        }
    }
}

/// Cooperative time-slicing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSlicingConfig {
    pub enabled: bool,
    /// Work budget between yields, in milliseconds
    pub budget_ms: u64,
    /// Real-time ceiling per pass after which slicing is switched off, in milliseconds
    pub ceiling_ms: u64,
}

impl TimeSlicingConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }
}

impl Default for TimeSlicingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            budget_ms: 2,
            ceiling_ms: 1000,
        }
    }
}

/// Mixer selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Lowest score a provider or mixer action can get
    pub floor_score: f32,
    /// Weights of named mixer groups; untuned groups weigh 1.0
    pub group_weights: HashMap<String, f32>,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            floor_score: 0.1,
            group_weights: HashMap::new(),
        }
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Error that can occur during TOML serialization.
#[derive(Debug, Error)]
#[error("TOML serialize error: {0}")]
pub struct TomlSerializeError(#[source] pub toml::ser::Error);

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Autonomy Engine Configuration

[selection]
motive_variance = 0.9
duplicate_group_cap = 3
zero_score_epsilon = 0.00001

[scoring]
already_solving_dampener = 0.25
posture_change_opportunity_multiplier = 1.5
object_preference_multiplier = 1.5
off_lot_multiplier = 0.5
player_member_penalty = 1.0

[curves]
attention_cost_to_percentage = [[0.0, 1.0], [1.0, 1.0], [3.0, 0.0]]
desire_to_bonus = [[0.0, 0.0], [10.0, 0.1]]
group_size_utility = [[0.0, 1.0]]

[time_slicing]
enabled = true
budget_ms = 2
ceiling_ms = 1000

[mixer]
floor_score = 0.1

[mixer.group_weights]
"#
    .to_string()
}
