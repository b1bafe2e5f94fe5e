//! Collaborator Interfaces
//!
//! The engine never owns the world. Object enumeration, social queries, routing
//! and action instantiation are provided by the host through these traits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use autonomy_events::{ActionId, ActivityId, MotiveId, ObjectId};

use crate::candidate::{Advertisement, Candidate};
use crate::diagnostics::DiagnosticsSink;
use crate::mixer::MixerProvider;
use crate::motive::Motive;

/// An activity currently running on the actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningActivity {
    pub id: ActivityId,
    pub action: ActionId,
    #[serde(default)]
    pub target: Option<ObjectId>,
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,
    /// Canceling costs nothing (idle, waiting)
    #[serde(default)]
    pub cancel_free: bool,
    /// Already wrapping up; canceling it loses nothing
    #[serde(default)]
    pub finishing: bool,
    #[serde(default = "one")]
    pub cancellation_cost_multiplier: f32,
    #[serde(default)]
    pub attention_cost: f32,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn one() -> f32 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl RunningActivity {
    pub fn new(id: u32, action: impl Into<String>) -> Self {
        Self {
            id: ActivityId(id),
            action: ActionId::new(action),
            target: None,
            advertisements: Vec::new(),
            cancel_free: false,
            finishing: false,
            cancellation_cost_multiplier: 1.0,
            attention_cost: 0.0,
            visible: true,
        }
    }

    pub fn advertise(mut self, motive: impl Into<String>, rate: f32) -> Self {
        self.advertisements.push(Advertisement::new(motive, rate));
        self
    }

    pub fn with_cancellation_cost(mut self, multiplier: f32) -> Self {
        self.cancellation_cost_multiplier = multiplier;
        self
    }

    pub fn with_attention_cost(mut self, cost: f32) -> Self {
        self.attention_cost = cost;
        self
    }

    pub fn on_target(mut self, target: ObjectId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn advertised_motives(&self) -> impl Iterator<Item = &MotiveId> {
        self.advertisements.iter().map(|ad| &ad.motive)
    }
}

/// Read-only view of the actor the engine decides for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActorState {
    pub id: ObjectId,
    pub motives: Vec<Motive>,
    pub running: Vec<RunningActivity>,
    /// Preference tag -> the object the actor prefers for it
    pub preferred_objects: HashMap<String, ObjectId>,
    /// Inside a guaranteed activity that forbids posture changes
    pub posture_locked: bool,
}

impl ActorState {
    pub fn is_running(&self, action: &ActionId, target: Option<ObjectId>) -> bool {
        self.running
            .iter()
            .any(|a| &a.action == action && (target.is_none() || a.target == target))
    }

    pub fn has_visible_activity(&self) -> bool {
        self.running.iter().any(|a| a.visible)
    }

    pub fn preferred_object(&self, tag: &str) -> Option<ObjectId> {
        self.preferred_objects.get(tag).copied()
    }
}

/// Object and world queries.
pub trait WorldModel {
    /// The actor's live state, or `None` once the actor has been destroyed.
    fn actor(&self, actor: ObjectId) -> Option<&ActorState>;

    /// Whether the handle still refers to a live object.
    fn is_alive(&self, object: ObjectId) -> bool;

    /// Candidate objects in range of the actor, in a stable order.
    fn objects_in_range(&self, actor: ObjectId) -> Vec<ObjectId>;

    /// Objects the actor carries. Scanned regardless of range.
    fn inventory(&self, _actor: ObjectId) -> Vec<ObjectId> {
        Vec::new()
    }

    /// Potential (action, target) pairs an object offers the actor.
    fn potential_candidates(&self, actor: ObjectId, object: ObjectId) -> Vec<Candidate>;

    /// The target is exclusively held by someone else.
    fn is_locked_out(&self, _actor: ObjectId, _target: ObjectId) -> bool {
        false
    }

    /// The object hides this interaction from this actor.
    fn is_suppressed(&self, _actor: ObjectId, _candidate: &Candidate) -> bool {
        false
    }

    /// Action-specific prerequisites.
    fn test_candidate(&self, _actor: ObjectId, _candidate: &Candidate) -> bool {
        true
    }

    /// Creator of a crafted object.
    fn creator_of(&self, _object: ObjectId) -> Option<ObjectId> {
        None
    }

    /// Whether the object is inside the active simulation area.
    fn is_on_active_lot(&self, _object: ObjectId) -> bool {
        true
    }

    /// Short in-place action sources attached to the actor's activities and traits.
    fn mixer_providers(&self, _actor: ObjectId) -> Vec<MixerProvider> {
        Vec::new()
    }
}

/// Relationship and group queries.
pub trait SocialModel {
    /// Whether the object is an agent that relationships apply to.
    fn is_agent(&self, _object: ObjectId) -> bool {
        false
    }

    /// How desirable `other` is to `actor`, if tracked.
    fn relationship_desirability(&self, _actor: ObjectId, _other: ObjectId) -> Option<f32> {
        None
    }

    /// Members of the agent's current social group, excluding the agent.
    fn social_group(&self, _agent: ObjectId) -> Vec<ObjectId> {
        Vec::new()
    }

    fn is_player_controlled(&self, _agent: ObjectId) -> bool {
        false
    }

    /// Buff-driven multiplier for this candidate.
    fn buff_multiplier(&self, _actor: ObjectId, _candidate: &Candidate) -> f32 {
        1.0
    }

    /// Preference adjustment for objects crafted by `creator`.
    fn crafter_adjustment(&self, _actor: ObjectId, _creator: ObjectId) -> f32 {
        0.0
    }

    /// Attention already committed by another agent.
    fn attention_load(&self, _agent: ObjectId) -> Option<f32> {
        None
    }
}

/// Caller-selected routing estimation policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationPolicy {
    /// Use the best-case estimate instead of the expected one
    pub always_best: bool,
    pub ignore_other_actors: bool,
    /// Treat every candidate as zero travel time
    pub ignore_distance: bool,
    /// Score unreachable targets as if they were adjacent
    pub allow_unreachable: bool,
}

/// Routing and posture feasibility of a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct PostureEstimate {
    pub route_time: f32,
    pub posture_change: bool,
    /// Running activities compatible with the new action
    pub kept: Vec<ActivityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostureError {
    #[error("target is unreachable")]
    Unreachable,
    #[error("no posture solution: {0}")]
    NoSolution(String),
}

/// Route and posture estimation.
pub trait PostureEstimator {
    fn estimate(
        &self,
        actor: &ActorState,
        candidate: &Candidate,
        action: &InstantiatedAction,
        policy: EstimationPolicy,
    ) -> Result<PostureEstimate, PostureError>;
}

/// Opaque handle of a runtime action owned by the execution runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeHandle(pub u64);

/// A runtime action instantiated for scoring. Must be handed back through
/// `ActionRuntime::release` unless it is returned as a winner.
#[derive(Debug, PartialEq, Eq)]
pub struct InstantiatedAction {
    pub handle: RuntimeHandle,
    pub action: ActionId,
    /// Concrete target after instantiation; may differ from the candidate's
    pub target: ObjectId,
    pub is_super: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to instantiate {action}: {reason}")]
pub struct InstantiateError {
    pub action: ActionId,
    pub reason: String,
}

/// Interaction execution runtime.
pub trait ActionRuntime {
    fn instantiate(
        &mut self,
        actor: ObjectId,
        candidate: &Candidate,
    ) -> Result<InstantiatedAction, InstantiateError>;

    fn release(&mut self, action: InstantiatedAction);
}

/// Everything a pass step needs from the host.
pub struct Collaborators<'a> {
    pub world: &'a dyn WorldModel,
    pub social: &'a dyn SocialModel,
    pub posture: &'a dyn PostureEstimator,
    pub runtime: &'a mut dyn ActionRuntime,
    pub sink: &'a mut dyn DiagnosticsSink,
}

impl<'a> Collaborators<'a> {
    pub fn new(
        world: &'a dyn WorldModel,
        social: &'a dyn SocialModel,
        posture: &'a dyn PostureEstimator,
        runtime: &'a mut dyn ActionRuntime,
        sink: &'a mut dyn DiagnosticsSink,
    ) -> Self {
        Self {
            world,
            social,
            posture,
            runtime,
            sink,
        }
    }
}
