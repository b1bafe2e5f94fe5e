//! Diagnostics Records
//!
//! Structured records emitted for every candidate and every evaluation pass.
//! Consumers (JSONL files, test harnesses, debug overlays) only observe these;
//! they never feed back into scoring.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ActionId, ObjectId, PriorityTier, ScoreBreakdown};

/// Generates a fresh evaluation pass ID.
pub fn generate_pass_id() -> String {
    format!("pass_{}", Uuid::new_v4().simple())
}

/// Stage at which a candidate dropped out of consideration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// A candidate filter predicate rejected it
    Filter,
    /// The runtime action could not be instantiated
    Execution,
    /// No feasible route or posture solution
    PostureSearch,
    /// Final score was not positive and zero scores were not allowed
    BelowThreshold,
    /// The same action identity already holds a better winner
    Superseded,
    /// The target disappeared before the candidate could be used
    TargetDestroyed,
    /// The pass was abandoned while the candidate was held
    Aborted,
}

/// What happened to a single candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Dropped. Candidates that were already scored keep their breakdown.
    Rejected {
        stage: FailureStage,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        breakdown: Option<ScoreBreakdown>,
    },
    /// Survived to the end of the pass as a winner of its tier.
    Scored { breakdown: ScoreBreakdown },
}

impl CandidateOutcome {
    pub fn is_scored(&self) -> bool {
        matches!(self, CandidateOutcome::Scored { .. })
    }

    pub fn stage(&self) -> Option<FailureStage> {
        match self {
            CandidateOutcome::Rejected { stage, .. } => Some(*stage),
            CandidateOutcome::Scored { .. } => None,
        }
    }

    /// The score trace, if the candidate got as far as scoring.
    pub fn breakdown(&self) -> Option<&ScoreBreakdown> {
        match self {
            CandidateOutcome::Rejected { breakdown, .. } => breakdown.as_ref(),
            CandidateOutcome::Scored { breakdown } => Some(breakdown),
        }
    }
}

/// One diagnostics line per candidate considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub pass_id: String,
    pub round: u32,
    pub action: ActionId,
    pub target: ObjectId,
    pub tier: PriorityTier,
    #[serde(flatten)]
    pub outcome: CandidateOutcome,
}

impl CandidateRecord {
    /// Serializes the record to a JSON line (for JSONL format).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// How an evaluation pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Winners,
    NoMotivesToScore,
    NoCandidates,
    Aborted,
}

/// Summary line written when a pass finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub pass_id: String,
    pub actor: ObjectId,
    pub status: PassStatus,
    pub rounds: u32,
    pub yields: u32,
    pub candidates_scored: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<PriorityTier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub winners: Vec<(ActionId, ObjectId, f32)>,
}

impl PassRecord {
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
