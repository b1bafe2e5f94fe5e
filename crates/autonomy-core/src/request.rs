//! Autonomy Requests
//!
//! What the caller asks for: the actor, the motive/action scope, and policy flags.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use autonomy_events::{ActionId, MotiveId, ObjectId};

use crate::candidate::Aabb;
use crate::motive::MotiveScope;
use crate::world::EstimationPolicy;

/// Who asked for the decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestSource {
    /// The actor's own autonomy loop
    #[default]
    Autonomy,
    /// A player-directed pie menu
    PieMenu,
}

/// Shared validity flag for an in-flight request.
///
/// The host keeps a clone and calls `invalidate` when the request no longer
/// matters; the pass notices on its next resume.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    valid: Rc<Cell<bool>>,
}

impl RequestHandle {
    pub fn new() -> Self {
        Self {
            valid: Rc::new(Cell::new(true)),
        }
    }

    pub fn invalidate(&self) {
        self.valid.set(false);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }
}

impl Default for RequestHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A request for one autonomy decision.
#[derive(Debug, Clone)]
pub struct AutonomyRequest {
    pub actor: ObjectId,
    pub source: RequestSource,
    pub scope: MotiveScope,
    pub estimation: EstimationPolicy,
    /// Subtract the value of activities the candidate would cancel
    pub opportunity_cost: bool,
    /// Candidates scoring zero may still be recorded as winners
    pub allow_zero_scores: bool,
    /// Only pursue motives inside the current widening round
    pub restrict_to_active_motives: bool,
    pub ignore_lockouts: bool,
    pub constraint: Option<Aabb>,
    pub skip_actions: BTreeSet<ActionId>,
    pub skip_motives: BTreeSet<MotiveId>,
    /// Seed for sampling and mixer picks; entropy when absent
    pub seed: Option<u64>,
    pub handle: RequestHandle,
}

impl AutonomyRequest {
    pub fn new(actor: ObjectId) -> Self {
        Self {
            actor,
            source: RequestSource::Autonomy,
            scope: MotiveScope::Default,
            estimation: EstimationPolicy::default(),
            opportunity_cost: true,
            allow_zero_scores: false,
            restrict_to_active_motives: true,
            ignore_lockouts: false,
            constraint: None,
            skip_actions: BTreeSet::new(),
            skip_motives: BTreeSet::new(),
            seed: None,
            handle: RequestHandle::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_scope(mut self, scope: MotiveScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_constraint(mut self, constraint: Aabb) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn allowing_zero_scores(mut self) -> Self {
        self.allow_zero_scores = true;
        self
    }

    pub fn unrestricted_motives(mut self) -> Self {
        self.restrict_to_active_motives = false;
        self
    }

    pub fn without_opportunity_cost(mut self) -> Self {
        self.opportunity_cost = false;
        self
    }

    pub fn skip_action(mut self, action: impl Into<String>) -> Self {
        self.skip_actions.insert(ActionId::new(action));
        self
    }

    pub fn skip_motive(mut self, motive: impl Into<String>) -> Self {
        self.skip_motives.insert(MotiveId::new(motive));
        self
    }

    /// Action identities this request is limited to, if any.
    pub fn allowed_actions(&self) -> Option<&BTreeSet<ActionId>> {
        match &self.scope {
            MotiveScope::AllowedActions(actions) => Some(actions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_clones_share_validity() {
        let handle = RequestHandle::new();
        let host_copy = handle.clone();

        assert!(handle.is_valid());
        host_copy.invalidate();
        assert!(!handle.is_valid());
    }

    #[test]
    fn test_request_defaults() {
        let request = AutonomyRequest::new(ObjectId::new(1, 0));

        assert!(request.opportunity_cost);
        assert!(!request.allow_zero_scores);
        assert!(request.restrict_to_active_motives);
        assert!(request.allowed_actions().is_none());
    }
}
