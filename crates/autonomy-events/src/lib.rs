//! Shared identifier, score-breakdown and diagnostics types for the autonomy engine.
//!
//! This crate contains pure data structures with no selection logic.
//! It is a dependency for every other crate in the workspace.

pub mod breakdown;
pub mod ids;
pub mod record;

// Re-export identifier types
pub use ids::{ActionId, ActivityId, MotiveId, ObjectId, PriorityTier};

// Re-export breakdown types
pub use breakdown::{MotiveContribution, ScoreBreakdown};

// Re-export diagnostics records
pub use record::{
    generate_pass_id, CandidateOutcome, CandidateRecord, FailureStage, PassRecord, PassStatus,
};
