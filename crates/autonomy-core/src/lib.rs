//! Autonomy Engine: utility-based action selection.
//!
//! Given an actor with needs, the objects around it, and a time budget, the
//! engine picks the best-scoring legal action(s) to run next, or reports that
//! nothing qualifies. The host owns the world; the engine talks to it only
//! through the collaborator traits in [`world`].
//!
//! # Pipeline
//!
//! ```text
//! motives ─▶ objects in range ─▶ filter chain ─▶ duplicate limiter ─▶ scorer ─▶ tiered winners
//!    ▲                                                                               │
//!    └────────────── widen motive subset when a round finds nothing ◀────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Immutable tuning loaded from TOML
//! - [`motive`]: Motive snapshot and widening rounds
//! - [`filter`]: Ordered candidate predicates
//! - [`limiter`]: Duplicate group sampling
//! - [`scorer`]: Utility math
//! - [`winners`]: Per-tier winner tables with weak target handles
//! - [`slicing`]: Cooperative time budget
//! - [`scheduler`]: The resumable evaluation pass
//! - [`mixer`]: Weighted-random mixer selection
//! - [`diagnostics`]: Observational record sinks
//! - [`scenario`]: In-memory world for tools and tests

pub mod candidate;
pub mod config;
pub mod curve;
pub mod diagnostics;
pub mod filter;
pub mod limiter;
pub mod mixer;
pub mod motive;
pub mod request;
pub mod scenario;
pub mod scheduler;
pub mod scorer;
pub mod slicing;
pub mod winners;
pub mod world;

pub use autonomy_events::{ActionId, ActivityId, MotiveId, ObjectId, PriorityTier, ScoreBreakdown};

pub use candidate::{Aabb, ActionDef, Advertisement, Candidate, DuplicateGroup, ObjectPreference};
pub use config::{default_config_toml, AutonomyConfig, ConfigError};
pub use curve::Curve;
pub use diagnostics::{DiagnosticsError, DiagnosticsSink, JsonlSink, MemorySink, NullSink};
pub use filter::{run_filters, FilterContext, FilterPass, RejectReason};
pub use limiter::DuplicateGroupLimiter;
pub use mixer::{MixerAction, MixerChoice, MixerProvider, MixerSelector};
pub use motive::{Motive, MotiveRounds, MotiveScope, MotiveScoreTable};
pub use request::{AutonomyRequest, RequestHandle, RequestSource};
pub use scenario::{ScenarioError, ScenarioRuntime, ScenarioSpec, ScenarioWorld};
pub use scheduler::{
    AutonomyResult, ContractViolation, EvaluationPass, NoResultReason, PassOutcome, PassPoll,
};
pub use scorer::{ScoredCandidate, ScoringFailure, UtilityScorer};
pub use slicing::{Clock, ManualClock, SystemClock, YieldKind};
pub use winners::{TieredWinners, WinnerDecision, WinnerTable};
pub use world::{
    ActionRuntime, ActorState, Collaborators, EstimationPolicy, InstantiateError, InstantiatedAction,
    PostureError, PostureEstimate, PostureEstimator, RunningActivity, RuntimeHandle, SocialModel,
    WorldModel,
};
