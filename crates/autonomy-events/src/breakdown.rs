//! Score Breakdown
//!
//! Observational record of every term that went into a candidate's utility.
//! The numeric score itself lives on the scored candidate; this structure is
//! attached alongside it for diagnostics only.

use serde::{Deserialize, Serialize};

use crate::MotiveId;

/// Contribution of one advertised motive to the base utility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotiveContribution {
    pub motive: MotiveId,
    /// Fulfillment rate from the advertisement
    pub fulfillment_rate: f32,
    /// Object-specific use multiplier
    pub use_multiplier: f32,
    /// Dampener applied when the motive is already being solved elsewhere
    pub solving_dampener: f32,
    /// Current urgency from the motive table
    pub urgency: f32,
    /// Static autonomy weight of the motive
    pub weight: f32,
    /// Resulting contribution
    pub value: f32,
}

/// Full breakdown of a scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub route_time: f32,
    pub posture_change: bool,
    pub efficiency: f32,
    pub preference_multiplier: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contributions: Vec<MotiveContribution>,
    pub base_utility: f32,
    pub relationship_multiplier: f32,
    pub group_multiplier: f32,
    pub buff_multiplier: f32,
    pub crafted_adjustment: f32,
    pub off_lot_multiplier: f32,
    pub opportunity_cost: f32,
    pub kept_utility: f32,
    pub attention_total: f32,
    pub multitask_percentage: f32,
    pub final_score: f32,
}

impl Default for ScoreBreakdown {
    fn default() -> Self {
        Self {
            route_time: 0.0,
            posture_change: false,
            efficiency: 1.0,
            preference_multiplier: 1.0,
            contributions: Vec::new(),
            base_utility: 0.0,
            relationship_multiplier: 1.0,
            group_multiplier: 1.0,
            buff_multiplier: 1.0,
            crafted_adjustment: 0.0,
            off_lot_multiplier: 1.0,
            opportunity_cost: 0.0,
            kept_utility: 0.0,
            attention_total: 0.0,
            multitask_percentage: 1.0,
            final_score: 0.0,
        }
    }
}

impl ScoreBreakdown {
    /// Product of all social and placement multipliers applied to the base utility.
    pub fn combined_multiplier(&self) -> f32 {
        self.relationship_multiplier
            * self.group_multiplier
            * self.buff_multiplier
            * (1.0 + self.crafted_adjustment)
            * self.off_lot_multiplier
    }
}
