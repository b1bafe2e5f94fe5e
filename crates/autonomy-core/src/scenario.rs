//! Scenario World
//!
//! In-memory implementation of every collaborator trait, loadable from TOML.
//! Used by the `autonomy_sim` binary and by tests. Objects live in
//! generational slots so destroyed handles stop resolving.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use autonomy_events::{ActionId, ObjectId};

use crate::candidate::{Aabb, ActionDef, Candidate};
use crate::mixer::MixerProvider;
use crate::motive::Motive;
use crate::world::{
    ActionRuntime, ActorState, EstimationPolicy, InstantiateError, InstantiatedAction, PostureError,
    PostureEstimate, PostureEstimator, RunningActivity, RuntimeHandle, SocialModel, WorldModel,
};

/// Errors raised while loading or building a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    #[error("unknown object or actor: {0}")]
    UnknownName(String),
    #[error("object {object} offers undefined action {action}")]
    UnknownAction { object: String, action: String },
}

/// Agent-specific data of an actor object.
#[derive(Debug, Clone, Default)]
pub struct AgentData {
    pub state: ActorState,
    /// Distance units per minute
    pub speed: f32,
    /// Scan radius; `None` sees every object
    pub range: Option<f32>,
    pub group: Vec<ObjectId>,
    pub player_controlled: bool,
    pub buffs: HashMap<ActionId, f32>,
    pub mixer_providers: Vec<MixerProvider>,
    pub inventory: Vec<ObjectId>,
}

/// A world object.
#[derive(Debug, Clone)]
pub struct ScenarioObject {
    pub name: String,
    pub position: (f32, f32),
    pub actions: Vec<Arc<ActionDef>>,
    pub on_lot: bool,
    pub reachable: bool,
    pub constraint: Option<Aabb>,
    pub creator: Option<ObjectId>,
    pub locked_by: Option<ObjectId>,
    pub suppressed: BTreeSet<ActionId>,
    pub agent: Option<AgentData>,
}

impl ScenarioObject {
    fn new(name: impl Into<String>, position: (f32, f32)) -> Self {
        Self {
            name: name.into(),
            position,
            actions: Vec::new(),
            on_lot: true,
            reachable: true,
            constraint: None,
            creator: None,
            locked_by: None,
            suppressed: BTreeSet::new(),
            agent: None,
        }
    }
}

/// Posture behavior of an action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPosture {
    pub posture_change: bool,
    /// Actions that may start while this one keeps running
    pub compatible_with: BTreeSet<ActionId>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    object: Option<ScenarioObject>,
}

/// In-memory world, social and posture model.
#[derive(Debug, Clone, Default)]
pub struct ScenarioWorld {
    slots: Vec<Slot>,
    postures: HashMap<ActionId, ActionPosture>,
    relationships: HashMap<(ObjectId, ObjectId), f32>,
    crafted: HashMap<(ObjectId, ObjectId), f32>,
    failing_tests: BTreeSet<ActionId>,
}

impl ScenarioWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, name: impl Into<String>, position: (f32, f32)) -> ObjectId {
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(ScenarioObject::new(name, position)),
        });
        ObjectId::new(index, 0)
    }

    /// Adds an agent that can act; its `ActorState::id` is set to the new handle.
    pub fn add_actor(&mut self, name: impl Into<String>, position: (f32, f32)) -> ObjectId {
        let id = self.add_object(name, position);
        if let Some(object) = self.object_mut(id) {
            object.agent = Some(AgentData {
                state: ActorState {
                    id,
                    ..Default::default()
                },
                speed: 1.0,
                ..Default::default()
            });
        }
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&ScenarioObject> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut ScenarioObject> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn agent_mut(&mut self, id: ObjectId) -> Option<&mut AgentData> {
        self.object_mut(id).and_then(|o| o.agent.as_mut())
    }

    pub fn actor_mut(&mut self, id: ObjectId) -> Option<&mut ActorState> {
        self.agent_mut(id).map(|a| &mut a.state)
    }

    fn agent(&self, id: ObjectId) -> Option<&AgentData> {
        self.object(id).and_then(|o| o.agent.as_ref())
    }

    /// Finds a live object by name.
    pub fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.object
                .as_ref()
                .filter(|o| o.name == name)
                .map(|_| ObjectId::new(index as u32, slot.generation))
        })
    }

    pub fn name_of(&self, id: ObjectId) -> Option<&str> {
        self.object(id).map(|o| o.name.as_str())
    }

    pub fn offer(&mut self, object: ObjectId, action: Arc<ActionDef>) {
        if let Some(object) = self.object_mut(object) {
            object.actions.push(action);
        }
    }

    /// Moves `item` into the agent's inventory.
    pub fn give(&mut self, agent: ObjectId, item: ObjectId) -> bool {
        if !self.is_alive(item) || self.holder_of(item).is_some() {
            return false;
        }
        match self.agent_mut(agent) {
            Some(agent) => {
                agent.inventory.push(item);
                true
            }
            None => false,
        }
    }

    /// The live agent carrying `item`, if any.
    pub fn holder_of(&self, item: ObjectId) -> Option<ObjectId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            let agent = slot.object.as_ref()?.agent.as_ref()?;
            agent
                .inventory
                .contains(&item)
                .then(|| ObjectId::new(index as u32, slot.generation))
        })
    }

    pub fn set_posture(&mut self, action: impl Into<String>, posture: ActionPosture) {
        self.postures.insert(ActionId::new(action), posture);
    }

    pub fn set_relationship(&mut self, from: ObjectId, to: ObjectId, desirability: f32) {
        self.relationships.insert((from, to), desirability);
    }

    pub fn set_crafted_preference(&mut self, actor: ObjectId, creator: ObjectId, adjustment: f32) {
        self.crafted.insert((actor, creator), adjustment);
    }

    pub fn fail_test(&mut self, action: impl Into<String>) {
        self.failing_tests.insert(ActionId::new(action));
    }

    /// Removes the object; the slot's generation moves on so old handles die.
    pub fn destroy(&mut self, id: ObjectId) -> bool {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.generation == id.generation && slot.object.is_some() => {
                slot.object = None;
                slot.generation = slot.generation.wrapping_add(1);
                true
            }
            _ => false,
        }
    }

    fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }
}

impl WorldModel for ScenarioWorld {
    fn actor(&self, actor: ObjectId) -> Option<&ActorState> {
        self.agent(actor).map(|a| &a.state)
    }

    fn is_alive(&self, object: ObjectId) -> bool {
        self.object(object).is_some()
    }

    fn objects_in_range(&self, actor: ObjectId) -> Vec<ObjectId> {
        let Some(origin) = self.object(actor) else {
            return Vec::new();
        };
        let range = origin.agent.as_ref().and_then(|a| a.range);

        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let object = slot.object.as_ref()?;
                let id = ObjectId::new(index as u32, slot.generation);
                let in_range = range.map_or(true, |r| Self::distance(origin.position, object.position) <= r);
                (id != actor && in_range).then_some(id)
            })
            .filter(|id| self.holder_of(*id).is_none())
            .collect()
    }

    fn inventory(&self, actor: ObjectId) -> Vec<ObjectId> {
        self.agent(actor)
            .map(|a| a.inventory.iter().copied().filter(|i| self.is_alive(*i)).collect())
            .unwrap_or_default()
    }

    fn potential_candidates(&self, _actor: ObjectId, object: ObjectId) -> Vec<Candidate> {
        let Some(target) = self.object(object) else {
            return Vec::new();
        };
        target
            .actions
            .iter()
            .map(|action| {
                let candidate = Candidate::new(action.clone(), object);
                match target.constraint {
                    Some(constraint) => candidate.with_constraint(constraint),
                    None => candidate,
                }
            })
            .collect()
    }

    fn is_locked_out(&self, actor: ObjectId, target: ObjectId) -> bool {
        self.object(target)
            .and_then(|o| o.locked_by)
            .is_some_and(|holder| holder != actor)
    }

    fn is_suppressed(&self, _actor: ObjectId, candidate: &Candidate) -> bool {
        self.object(candidate.target)
            .is_some_and(|o| o.suppressed.contains(candidate.action_id()))
    }

    fn test_candidate(&self, _actor: ObjectId, candidate: &Candidate) -> bool {
        !self.failing_tests.contains(candidate.action_id())
    }

    fn creator_of(&self, object: ObjectId) -> Option<ObjectId> {
        self.object(object).and_then(|o| o.creator)
    }

    fn is_on_active_lot(&self, object: ObjectId) -> bool {
        self.object(object).map_or(true, |o| o.on_lot)
    }

    fn mixer_providers(&self, actor: ObjectId) -> Vec<MixerProvider> {
        self.agent(actor)
            .map(|a| a.mixer_providers.clone())
            .unwrap_or_default()
    }
}

impl SocialModel for ScenarioWorld {
    fn is_agent(&self, object: ObjectId) -> bool {
        self.agent(object).is_some()
    }

    fn relationship_desirability(&self, actor: ObjectId, other: ObjectId) -> Option<f32> {
        self.relationships.get(&(actor, other)).copied()
    }

    fn social_group(&self, agent: ObjectId) -> Vec<ObjectId> {
        self.agent(agent)
            .map(|a| a.group.iter().copied().filter(|m| self.is_alive(*m)).collect())
            .unwrap_or_default()
    }

    fn is_player_controlled(&self, agent: ObjectId) -> bool {
        self.agent(agent).is_some_and(|a| a.player_controlled)
    }

    fn buff_multiplier(&self, actor: ObjectId, candidate: &Candidate) -> f32 {
        self.agent(actor)
            .and_then(|a| a.buffs.get(candidate.action_id()).copied())
            .unwrap_or(1.0)
    }

    fn crafter_adjustment(&self, actor: ObjectId, creator: ObjectId) -> f32 {
        self.crafted.get(&(actor, creator)).copied().unwrap_or(0.0)
    }

    fn attention_load(&self, agent: ObjectId) -> Option<f32> {
        self.agent(agent)
            .map(|a| a.state.running.iter().map(|r| r.attention_cost).sum())
    }
}

impl PostureEstimator for ScenarioWorld {
    fn estimate(
        &self,
        actor: &ActorState,
        _candidate: &Candidate,
        action: &InstantiatedAction,
        _policy: EstimationPolicy,
    ) -> Result<PostureEstimate, PostureError> {
        let target = self
            .object(action.target)
            .ok_or_else(|| PostureError::NoSolution(format!("{} no longer exists", action.target)))?;
        if !target.reachable {
            return Err(PostureError::Unreachable);
        }
        let (origin, speed) = match self.object(actor.id) {
            Some(o) => (o.position, o.agent.as_ref().map_or(1.0, |a| a.speed)),
            None => return Err(PostureError::NoSolution(format!("{} has no position", actor.id))),
        };
        if speed <= 0.0 {
            return Err(PostureError::NoSolution(format!("{} cannot move", actor.id)));
        }

        let posture = self.postures.get(&action.action);
        let kept = actor
            .running
            .iter()
            .filter(|running| {
                self.postures
                    .get(&running.action)
                    .is_some_and(|p| p.compatible_with.contains(&action.action))
            })
            .map(|running| running.id)
            .collect();

        let route_time = if self.holder_of(action.target) == Some(actor.id) {
            0.0
        } else {
            Self::distance(origin, target.position) / speed
        };

        Ok(PostureEstimate {
            route_time,
            posture_change: posture.is_some_and(|p| p.posture_change),
            kept,
        })
    }
}

/// Runtime that hands out handles and tracks which are still live.
#[derive(Debug, Default)]
pub struct ScenarioRuntime {
    next: u64,
    live: BTreeMap<RuntimeHandle, (ActionId, ObjectId)>,
    released: u64,
    failing: BTreeSet<ActionId>,
}

impl ScenarioRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes instantiation of `action` fail.
    pub fn fail(&mut self, action: impl Into<String>) {
        self.failing.insert(ActionId::new(action));
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }

    pub fn is_live(&self, handle: RuntimeHandle) -> bool {
        self.live.contains_key(&handle)
    }
}

impl ActionRuntime for ScenarioRuntime {
    fn instantiate(
        &mut self,
        _actor: ObjectId,
        candidate: &Candidate,
    ) -> Result<InstantiatedAction, InstantiateError> {
        if self.failing.contains(candidate.action_id()) {
            return Err(InstantiateError {
                action: candidate.action_id().clone(),
                reason: "instantiation disabled".to_string(),
            });
        }
        self.next += 1;
        let handle = RuntimeHandle(self.next);
        self.live
            .insert(handle, (candidate.action_id().clone(), candidate.target));
        Ok(InstantiatedAction {
            handle,
            action: candidate.action_id().clone(),
            target: candidate.target,
            is_super: candidate.action.is_super,
        })
    }

    fn release(&mut self, action: InstantiatedAction) {
        if self.live.remove(&action.handle).is_some() {
            self.released += 1;
        }
    }
}

// ============================================================================
// TOML scenario files
// ============================================================================

/// An action definition plus its posture behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(flatten)]
    pub def: ActionDef,
    #[serde(default)]
    pub posture_change: bool,
    #[serde(default)]
    pub compatible_with: Vec<ActionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub name: String,
    #[serde(default)]
    pub position: (f32, f32),
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default = "default_true")]
    pub on_lot: bool,
    #[serde(default = "default_true")]
    pub reachable: bool,
    #[serde(default)]
    pub constraint: Option<Aabb>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub suppressed: Vec<ActionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpec {
    pub name: String,
    #[serde(default)]
    pub position: (f32, f32),
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub range: Option<f32>,
    #[serde(default)]
    pub motives: Vec<Motive>,
    #[serde(default)]
    pub running: Vec<RunningActivity>,
    /// Preference tag -> object name
    #[serde(default)]
    pub preferred_objects: BTreeMap<String, String>,
    #[serde(default)]
    pub posture_locked: bool,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub player_controlled: bool,
    #[serde(default)]
    pub buffs: HashMap<ActionId, f32>,
    /// Actions this agent offers to others
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub mixer_providers: Vec<MixerProvider>,
    /// Object names the agent starts out carrying
    #[serde(default)]
    pub inventory: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSpec {
    pub from: String,
    pub to: String,
    pub desirability: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CraftedSpec {
    pub actor: String,
    pub creator: String,
    pub adjustment: f32,
}

/// A complete scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSpec {
    pub actions: Vec<ActionSpec>,
    pub actors: Vec<ActorSpec>,
    pub objects: Vec<ObjectSpec>,
    pub relationships: Vec<RelationshipSpec>,
    pub crafted_preferences: Vec<CraftedSpec>,
    pub failing_tests: Vec<ActionId>,
}

fn default_true() -> bool {
    true
}

fn default_speed() -> f32 {
    1.0
}

impl ScenarioSpec {
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves names and builds the world. Actors are created first, then
    /// objects, in file order.
    pub fn build(&self) -> Result<ScenarioWorld, ScenarioError> {
        let mut world = ScenarioWorld::new();
        let mut ids: HashMap<&str, ObjectId> = HashMap::new();

        let actions: HashMap<&str, Arc<ActionDef>> = self
            .actions
            .iter()
            .map(|spec| (spec.def.id.as_str(), Arc::new(spec.def.clone())))
            .collect();
        for spec in &self.actions {
            world.set_posture(
                spec.def.id.as_str(),
                ActionPosture {
                    posture_change: spec.posture_change,
                    compatible_with: spec.compatible_with.iter().cloned().collect(),
                },
            );
        }

        let names = self
            .actors
            .iter()
            .map(|a| (a.name.as_str(), a.position, true))
            .chain(self.objects.iter().map(|o| (o.name.as_str(), o.position, false)));
        for (name, position, is_actor) in names {
            if ids.contains_key(name) {
                return Err(ScenarioError::DuplicateName(name.to_string()));
            }
            let id = if is_actor {
                world.add_actor(name, position)
            } else {
                world.add_object(name, position)
            };
            ids.insert(name, id);
        }

        let resolve = |name: &str| -> Result<ObjectId, ScenarioError> {
            ids.get(name)
                .copied()
                .ok_or_else(|| ScenarioError::UnknownName(name.to_string()))
        };
        let action = |owner: &str, id: &str| -> Result<Arc<ActionDef>, ScenarioError> {
            actions.get(id).cloned().ok_or_else(|| ScenarioError::UnknownAction {
                object: owner.to_string(),
                action: id.to_string(),
            })
        };

        for spec in &self.actors {
            let id = resolve(&spec.name)?;
            let group = spec.group.iter().map(|n| resolve(n)).collect::<Result<Vec<_>, _>>()?;
            let mut preferred = HashMap::new();
            for (tag, name) in &spec.preferred_objects {
                preferred.insert(tag.clone(), resolve(name)?);
            }
            let offered = spec
                .actions
                .iter()
                .map(|a| action(&spec.name, a))
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(object) = world.object_mut(id) {
                object.actions = offered;
            }
            if let Some(agent) = world.agent_mut(id) {
                agent.speed = spec.speed;
                agent.range = spec.range;
                agent.group = group;
                agent.player_controlled = spec.player_controlled;
                agent.buffs = spec.buffs.clone();
                agent.mixer_providers = spec.mixer_providers.clone();
                agent.state.motives = spec.motives.clone();
                agent.state.running = spec.running.clone();
                agent.state.preferred_objects = preferred;
                agent.state.posture_locked = spec.posture_locked;
            }
            for item in &spec.inventory {
                let item = resolve(item)?;
                world.give(id, item);
            }
        }

        for spec in &self.objects {
            let id = resolve(&spec.name)?;
            let offered = spec
                .actions
                .iter()
                .map(|a| action(&spec.name, a))
                .collect::<Result<Vec<_>, _>>()?;
            let creator = spec.creator.as_deref().map(resolve).transpose()?;
            let locked_by = spec.locked_by.as_deref().map(resolve).transpose()?;

            if let Some(object) = world.object_mut(id) {
                object.actions = offered;
                object.on_lot = spec.on_lot;
                object.reachable = spec.reachable;
                object.constraint = spec.constraint;
                object.creator = creator;
                object.locked_by = locked_by;
                object.suppressed = spec.suppressed.iter().cloned().collect();
            }
        }

        for rel in &self.relationships {
            world.set_relationship(resolve(&rel.from)?, resolve(&rel.to)?, rel.desirability);
        }
        for crafted in &self.crafted_preferences {
            world.set_crafted_preference(resolve(&crafted.actor)?, resolve(&crafted.creator)?, crafted.adjustment);
        }
        for action in &self.failing_tests {
            world.fail_test(action.as_str());
        }

        Ok(world)
    }
}
