//! Candidate Actions
//!
//! Static action tuning and the transient (action, target) pairs discovered from objects.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use autonomy_events::{ActionId, MotiveId, ObjectId, PriorityTier};

/// Tag limiting how many near-identical candidates get scored per round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DuplicateGroup(pub String);

/// A (motive, contribution) pair an action advertises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub motive: MotiveId,
    /// How much of the motive the action fulfills
    pub fulfillment_rate: f32,
    /// Object-specific multiplier (a nicer bed restores more energy)
    #[serde(default = "one")]
    pub use_multiplier: f32,
}

fn one() -> f32 {
    1.0
}

impl Advertisement {
    pub fn new(motive: impl Into<String>, fulfillment_rate: f32) -> Self {
        Self {
            motive: MotiveId::new(motive),
            fulfillment_rate,
            use_multiplier: 1.0,
        }
    }

    pub fn with_use_multiplier(mut self, multiplier: f32) -> Self {
        self.use_multiplier = multiplier;
        self
    }
}

/// Preference for a specific object, keyed by a tag the actor carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPreference {
    pub tag: String,
    /// Scoring preferences multiply utility; non-scoring ones decide winner ties
    #[serde(default = "default_scoring")]
    pub scoring: bool,
}

fn default_scoring() -> bool {
    true
}

/// Static tuning of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    pub id: ActionId,
    /// Expected duration in simulated minutes
    pub duration: f32,
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,
    #[serde(default)]
    pub priority: PriorityTier,
    #[serde(default)]
    pub duplicate_group: Option<DuplicateGroup>,
    #[serde(default = "default_true")]
    pub allow_autonomous: bool,
    #[serde(default = "default_true")]
    pub allow_user_directed: bool,
    /// Super actions are top-level activities rather than mixers
    #[serde(default = "default_true")]
    pub is_super: bool,
    /// May replace a running instance of itself on the actor
    #[serde(default)]
    pub allow_overwrite_running: bool,
    /// Attention this action needs while multitasking
    #[serde(default)]
    pub attention_cost: f32,
    #[serde(default)]
    pub preference: Option<ObjectPreference>,
}

fn default_true() -> bool {
    true
}

impl ActionDef {
    pub fn new(id: impl Into<String>, duration: f32) -> Self {
        Self {
            id: ActionId::new(id),
            duration,
            advertisements: Vec::new(),
            priority: PriorityTier::NORMAL,
            duplicate_group: None,
            allow_autonomous: true,
            allow_user_directed: true,
            is_super: true,
            allow_overwrite_running: false,
            attention_cost: 0.0,
            preference: None,
        }
    }

    pub fn advertise(mut self, motive: impl Into<String>, rate: f32) -> Self {
        self.advertisements.push(Advertisement::new(motive, rate));
        self
    }

    pub fn with_priority(mut self, priority: PriorityTier) -> Self {
        self.priority = priority;
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.duplicate_group = Some(DuplicateGroup(group.into()));
        self
    }

    pub fn with_attention_cost(mut self, cost: f32) -> Self {
        self.attention_cost = cost;
        self
    }

    pub fn with_preference(mut self, tag: impl Into<String>, scoring: bool) -> Self {
        self.preference = Some(ObjectPreference {
            tag: tag.into(),
            scoring,
        });
        self
    }

    pub fn advertises(&self, motive: &MotiveId) -> bool {
        self.advertisements.iter().any(|ad| &ad.motive == motive)
    }

    pub fn advertised_motives(&self) -> impl Iterator<Item = &MotiveId> {
        self.advertisements.iter().map(|ad| &ad.motive)
    }
}

/// Axis-aligned spatial constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: (f32, f32),
    pub max: (f32, f32),
}

impl Aabb {
    pub fn new(min: (f32, f32), max: (f32, f32)) -> Self {
        Self { min, max }
    }

    /// Box of half-extent `radius` around `center`.
    pub fn around(center: (f32, f32), radius: f32) -> Self {
        Self {
            min: (center.0 - radius, center.1 - radius),
            max: (center.0 + radius, center.1 + radius),
        }
    }

    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = (self.min.0.max(other.min.0), self.min.1.max(other.min.1));
        let max = (self.max.0.min(other.max.0), self.max.1.min(other.max.1));
        if min.0 <= max.0 && min.1 <= max.1 {
            Some(Aabb { min, max })
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.intersection(other).is_some()
    }
}

/// An (action, target, optional sub-target) triple discovered from one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub action: Arc<ActionDef>,
    pub target: ObjectId,
    pub sub_target: Option<ObjectId>,
    /// Where the action can be performed, if spatially constrained
    pub constraint: Option<Aabb>,
}

impl Candidate {
    pub fn new(action: Arc<ActionDef>, target: ObjectId) -> Self {
        Self {
            action,
            target,
            sub_target: None,
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: Aabb) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn action_id(&self) -> &ActionId {
        &self.action.id
    }

    pub fn tier(&self) -> PriorityTier {
        self.action.priority
    }
}
