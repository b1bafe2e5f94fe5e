//! Utility Scoring
//!
//! Turns a filtered candidate into a scored one. Utility combines need
//! fulfillment, travel efficiency, social multipliers, the opportunity cost
//! of canceling running activities, and the value of activities that keep
//! running at the computed multitasking percentage.

use std::collections::BTreeSet;
use thiserror::Error;

use autonomy_events::{ActionId, ActivityId, FailureStage, MotiveContribution, MotiveId, ScoreBreakdown};

use crate::candidate::Candidate;
use crate::config::AutonomyConfig;
use crate::filter::FilterPass;
use crate::motive::MotiveScoreTable;
use crate::request::AutonomyRequest;
use crate::world::{
    ActorState, Collaborators, InstantiateError, InstantiatedAction, PostureError, PostureEstimate,
    RunningActivity, SocialModel, WorldModel,
};

/// A candidate with its computed utility.
#[derive(Debug)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub action: InstantiatedAction,
    /// Final utility, never NaN, exactly 0.0 at or below the epsilon
    pub score: f32,
    pub route_time: f32,
    pub multitask_percentage: f32,
    pub breakdown: ScoreBreakdown,
}

/// Terminal scoring failures for one candidate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringFailure {
    #[error("execution failure: {0}")]
    Execution(#[from] InstantiateError),
    #[error("posture search failure: {0}")]
    PostureSearch(#[from] PostureError),
    #[error("posture change forbidden by a guaranteed activity")]
    PostureLocked,
    #[error("{0} is already running on the concrete target")]
    RunningDuplicate(ActionId),
}

impl ScoringFailure {
    pub fn stage(&self) -> FailureStage {
        match self {
            ScoringFailure::Execution(_) => FailureStage::Execution,
            ScoringFailure::PostureSearch(_) | ScoringFailure::PostureLocked => {
                FailureStage::PostureSearch
            }
            ScoringFailure::RunningDuplicate(_) => FailureStage::Filter,
        }
    }
}

/// Read-only inputs shared by every candidate of a pass.
pub struct ScoringContext<'a> {
    pub config: &'a AutonomyConfig,
    pub actor: &'a ActorState,
    pub motives: &'a MotiveScoreTable,
    pub request: &'a AutonomyRequest,
}

/// Normalizes a score: non-finite or at/below `epsilon` becomes exactly zero.
pub fn clamp_score(score: f32, epsilon: f32) -> f32 {
    if !score.is_finite() || score <= epsilon {
        0.0
    } else {
        score
    }
}

/// Share of total time spent doing the action rather than getting there.
pub fn efficiency(duration: f32, route_time: f32) -> f32 {
    if route_time <= 0.0 {
        return 1.0;
    }
    let total = duration + route_time;
    if total <= 0.0 || !total.is_finite() {
        return 0.0;
    }
    (duration / total).clamp(0.0, 1.0)
}

/// Current value of a running activity: its advertised fulfillment weighted by
/// urgency and motive weight. Motives outside the table do not count.
pub fn activity_utility(activity: &RunningActivity, motives: &MotiveScoreTable) -> f32 {
    activity
        .advertisements
        .iter()
        .filter_map(|ad| {
            let motive = motives.get(&ad.motive)?;
            let value = ad.fulfillment_rate * ad.use_multiplier * motive.urgency * motive.autonomy_weight;
            value.is_finite().then_some(value)
        })
        .sum()
}

/// Utility lost by canceling every running activity not in `kept`.
pub fn opportunity_cost(
    actor: &ActorState,
    kept: &[ActivityId],
    motives: &MotiveScoreTable,
    posture_change: bool,
    config: &AutonomyConfig,
) -> f32 {
    let mut cost: f32 = actor
        .running
        .iter()
        .filter(|a| !kept.contains(&a.id) && !a.cancel_free && !a.finishing)
        .map(|a| activity_utility(a, motives) * a.cancellation_cost_multiplier)
        .filter(|c| c.is_finite())
        .sum();

    if posture_change && actor.has_visible_activity() {
        cost *= config.scoring.posture_change_opportunity_multiplier;
    }
    cost
}

/// Inputs of the multitasking computation.
pub struct AttentionInputs<'a> {
    pub kept: &'a [&'a RunningActivity],
    /// Attention already committed by an agent target, if any
    pub target_load: Option<f32>,
    pub own_cost: f32,
    pub own_motives: &'a BTreeSet<MotiveId>,
}

/// Returns `(total attention cost, multitasking percentage in [0, 1])`.
pub fn multitask_percentage(
    inputs: &AttentionInputs<'_>,
    motives: &MotiveScoreTable,
    config: &AutonomyConfig,
) -> (f32, f32) {
    let mut load: f32 = inputs.kept.iter().map(|a| a.attention_cost).sum();
    if let Some(target_load) = inputs.target_load.filter(|l| l.is_finite()) {
        load = load.min(target_load);
    }
    let total = load + inputs.own_cost;

    let curves = &config.curves;
    let base = curves.attention_cost_to_percentage.sample_or(total, 1.0);

    let desire = |motive: &MotiveId| -> f32 {
        motives
            .urgency(motive)
            .and_then(|u| curves.desire_to_bonus.sample(u))
            .unwrap_or(0.0)
    };

    let bonus: f32 = inputs.own_motives.iter().map(desire).sum();
    let served: BTreeSet<&MotiveId> = inputs
        .kept
        .iter()
        .flat_map(|a| a.advertised_motives())
        .collect();
    let penalty: f32 = served.into_iter().map(desire).sum();

    let percentage = base + bonus - penalty;
    let percentage = if percentage.is_finite() {
        percentage.clamp(0.0, 1.0)
    } else {
        base.clamp(0.0, 1.0)
    };
    (total, percentage)
}

/// Scores candidates for one pass.
pub struct UtilityScorer<'a> {
    ctx: ScoringContext<'a>,
}

impl<'a> UtilityScorer<'a> {
    pub fn new(ctx: ScoringContext<'a>) -> Self {
        Self { ctx }
    }

    /// Instantiates, estimates and scores a candidate that passed filtering.
    ///
    /// The runtime action is released on every failure path; on success it
    /// travels with the returned `ScoredCandidate`.
    pub fn score(
        &self,
        candidate: Candidate,
        filter: FilterPass,
        collab: &mut Collaborators<'_>,
    ) -> Result<ScoredCandidate, ScoringFailure> {
        let ctx = &self.ctx;
        let def = candidate.action.clone();

        let action = collab.runtime.instantiate(ctx.actor.id, &candidate)?;

        if !def.allow_overwrite_running && ctx.actor.is_running(&def.id, Some(action.target)) {
            collab.runtime.release(action);
            return Err(ScoringFailure::RunningDuplicate(def.id.clone()));
        }

        let estimate = match self.estimate(&candidate, &action, collab) {
            Ok(estimate) => estimate,
            Err(failure) => {
                collab.runtime.release(action);
                return Err(failure);
            }
        };

        let breakdown = self.utility(&candidate, filter, &estimate, collab.world, collab.social);

        Ok(ScoredCandidate {
            score: breakdown.final_score,
            route_time: breakdown.route_time,
            multitask_percentage: breakdown.multitask_percentage,
            breakdown,
            candidate,
            action,
        })
    }

    fn estimate(
        &self,
        candidate: &Candidate,
        action: &InstantiatedAction,
        collab: &Collaborators<'_>,
    ) -> Result<PostureEstimate, ScoringFailure> {
        let ctx = &self.ctx;
        let policy = ctx.request.estimation;

        let mut estimate = match collab.posture.estimate(ctx.actor, candidate, action, policy) {
            Ok(estimate) => estimate,
            Err(PostureError::Unreachable) if policy.allow_unreachable => PostureEstimate {
                route_time: 0.0,
                posture_change: false,
                kept: ctx.actor.running.iter().map(|a| a.id).collect(),
            },
            Err(e) => return Err(e.into()),
        };

        if !estimate.route_time.is_finite() {
            return Err(PostureError::Unreachable.into());
        }
        if policy.ignore_distance || estimate.route_time < 0.0 {
            estimate.route_time = 0.0;
        }
        if estimate.posture_change && ctx.actor.posture_locked {
            return Err(ScoringFailure::PostureLocked);
        }
        Ok(estimate)
    }

    /// Steps 4-12 of the utility computation, as a full breakdown.
    fn utility(
        &self,
        candidate: &Candidate,
        filter: FilterPass,
        estimate: &PostureEstimate,
        world: &dyn WorldModel,
        social: &dyn SocialModel,
    ) -> ScoreBreakdown {
        let ctx = &self.ctx;
        let config = ctx.config;
        let def = &candidate.action;
        let actor = ctx.actor;

        let mut b = ScoreBreakdown {
            route_time: estimate.route_time,
            posture_change: estimate.posture_change,
            efficiency: efficiency(def.duration, estimate.route_time),
            crafted_adjustment: filter.crafted_adjustment,
            ..Default::default()
        };

        if let Some(preference) = def.preference.as_ref().filter(|p| p.scoring) {
            if actor.preferred_object(&preference.tag) == Some(candidate.target) {
                b.preference_multiplier = config.scoring.object_preference_multiplier;
            }
        }

        for ad in &def.advertisements {
            let Some(motive) = ctx.motives.get(&ad.motive) else {
                continue;
            };
            let dampener = if motive.actively_addressed {
                config.scoring.already_solving_dampener
            } else {
                1.0
            };
            let value = ad.fulfillment_rate
                * ad.use_multiplier
                * dampener
                * b.efficiency
                * b.preference_multiplier
                * motive.urgency
                * motive.autonomy_weight;
            if !value.is_finite() {
                continue;
            }
            b.contributions.push(MotiveContribution {
                motive: ad.motive.clone(),
                fulfillment_rate: ad.fulfillment_rate,
                use_multiplier: ad.use_multiplier,
                solving_dampener: dampener,
                urgency: motive.urgency,
                weight: motive.autonomy_weight,
                value,
            });
        }

        b.base_utility = if def.advertisements.is_empty() {
            b.efficiency
        } else {
            b.contributions.iter().map(|c| c.value).sum()
        };

        let target_is_agent = candidate.target != actor.id && social.is_agent(candidate.target);
        if target_is_agent {
            self.apply_social(candidate, social, &mut b);
        }

        if world.is_on_active_lot(actor.id) && !world.is_on_active_lot(candidate.target) {
            b.off_lot_multiplier = config.scoring.off_lot_multiplier;
        }

        let mut utility = b.base_utility * b.combined_multiplier();

        if ctx.request.opportunity_cost {
            b.opportunity_cost = opportunity_cost(
                actor,
                &estimate.kept,
                ctx.motives,
                estimate.posture_change,
                config,
            );
            utility -= b.opportunity_cost;
        }

        let kept: Vec<&RunningActivity> = actor
            .running
            .iter()
            .filter(|a| estimate.kept.contains(&a.id))
            .collect();
        let own_motives: BTreeSet<MotiveId> = def.advertised_motives().cloned().collect();
        let target_load = if target_is_agent {
            social.attention_load(candidate.target)
        } else {
            None
        };
        let (attention_total, percentage) = multitask_percentage(
            &AttentionInputs {
                kept: &kept,
                target_load,
                own_cost: def.attention_cost,
                own_motives: &own_motives,
            },
            ctx.motives,
            config,
        );
        b.attention_total = attention_total;
        b.multitask_percentage = percentage;

        b.kept_utility = kept.iter().map(|a| activity_utility(a, ctx.motives)).sum();
        utility += b.kept_utility * percentage;

        b.final_score = clamp_score(utility, config.selection.zero_score_epsilon);
        b
    }

    fn apply_social(&self, candidate: &Candidate, social: &dyn SocialModel, b: &mut ScoreBreakdown) {
        let ctx = &self.ctx;
        let actor = ctx.actor.id;

        let mut members = vec![candidate.target];
        for member in social.social_group(candidate.target) {
            if member != actor && !members.contains(&member) {
                members.push(member);
            }
        }

        let desirability: Vec<f32> = members
            .iter()
            .filter_map(|m| social.relationship_desirability(actor, *m))
            .filter(|d| d.is_finite())
            .collect();
        if !desirability.is_empty() {
            b.relationship_multiplier = desirability.iter().sum::<f32>() / desirability.len() as f32;
        }

        let scoring = &ctx.config.scoring;
        let players = members.iter().filter(|m| social.is_player_controlled(**m)).count();
        let group = ctx.config.curves.group_size_utility.sample_or(members.len() as f32, 1.0)
            * scoring.player_member_penalty.powi(players as i32);
        if group.is_finite() {
            b.group_multiplier = group;
        }

        let buff = social.buff_multiplier(actor, candidate);
        if buff.is_finite() {
            b.buff_multiplier = buff;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ActionDef;
    use crate::curve::Curve;
    use crate::diagnostics::NullSink;
    use crate::motive::Motive;
    use crate::world::{ActionRuntime, EstimationPolicy, PostureEstimator, RuntimeHandle};
    use autonomy_events::ObjectId;
    use std::collections::HashMap;
    use std::sync::Arc;

    const ACTOR: ObjectId = ObjectId::new(0, 0);
    const FRIDGE: ObjectId = ObjectId::new(1, 0);
    const FRIEND: ObjectId = ObjectId::new(2, 0);

    #[derive(Default)]
    struct Stub {
        off_lot: Vec<ObjectId>,
        agents: Vec<ObjectId>,
        desirability: HashMap<ObjectId, f32>,
        group: Vec<ObjectId>,
        players: Vec<ObjectId>,
        buff: Option<f32>,
    }

    impl WorldModel for Stub {
        fn actor(&self, _actor: ObjectId) -> Option<&ActorState> {
            None
        }
        fn is_alive(&self, _object: ObjectId) -> bool {
            true
        }
        fn objects_in_range(&self, _actor: ObjectId) -> Vec<ObjectId> {
            Vec::new()
        }
        fn potential_candidates(&self, _actor: ObjectId, _object: ObjectId) -> Vec<Candidate> {
            Vec::new()
        }
        fn is_on_active_lot(&self, object: ObjectId) -> bool {
            !self.off_lot.contains(&object)
        }
    }

    impl SocialModel for Stub {
        fn is_agent(&self, object: ObjectId) -> bool {
            self.agents.contains(&object)
        }
        fn relationship_desirability(&self, _actor: ObjectId, other: ObjectId) -> Option<f32> {
            self.desirability.get(&other).copied()
        }
        fn social_group(&self, _agent: ObjectId) -> Vec<ObjectId> {
            self.group.clone()
        }
        fn is_player_controlled(&self, agent: ObjectId) -> bool {
            self.players.contains(&agent)
        }
        fn buff_multiplier(&self, _actor: ObjectId, _candidate: &Candidate) -> f32 {
            self.buff.unwrap_or(1.0)
        }
    }

    struct FixedPosture(Result<PostureEstimate, PostureError>);

    impl PostureEstimator for FixedPosture {
        fn estimate(
            &self,
            _actor: &ActorState,
            _candidate: &Candidate,
            _action: &InstantiatedAction,
            _policy: EstimationPolicy,
        ) -> Result<PostureEstimate, PostureError> {
            self.0.clone()
        }
    }

    #[derive(Default)]
    struct CountingRuntime {
        next: u64,
        released: Vec<RuntimeHandle>,
        fail: bool,
    }

    impl ActionRuntime for CountingRuntime {
        fn instantiate(
            &mut self,
            _actor: ObjectId,
            candidate: &Candidate,
        ) -> Result<InstantiatedAction, InstantiateError> {
            if self.fail {
                return Err(InstantiateError {
                    action: candidate.action_id().clone(),
                    reason: "no slot".to_string(),
                });
            }
            self.next += 1;
            Ok(InstantiatedAction {
                handle: RuntimeHandle(self.next),
                action: candidate.action_id().clone(),
                target: candidate.target,
                is_super: candidate.action.is_super,
            })
        }

        fn release(&mut self, action: InstantiatedAction) {
            self.released.push(action.handle);
        }
    }

    fn at_target(route_time: f32) -> FixedPosture {
        FixedPosture(Ok(PostureEstimate {
            route_time,
            posture_change: false,
            kept: Vec::new(),
        }))
    }

    fn actor(motives: Vec<Motive>) -> ActorState {
        ActorState {
            id: ACTOR,
            motives,
            ..Default::default()
        }
    }

    fn eat() -> Candidate {
        Candidate::new(
            Arc::new(ActionDef::new("eat", 10.0).advertise("hunger", 1.0)),
            FRIDGE,
        )
    }

    fn run(
        config: &AutonomyConfig,
        actor: &ActorState,
        request: &AutonomyRequest,
        stub: &Stub,
        posture: &FixedPosture,
        runtime: &mut CountingRuntime,
        candidate: Candidate,
    ) -> Result<ScoredCandidate, ScoringFailure> {
        let motives = MotiveScoreTable::from_motives(actor.motives.clone());
        let scorer = UtilityScorer::new(ScoringContext {
            config,
            actor,
            motives: &motives,
            request,
        });
        let mut sink = NullSink;
        let mut collab = Collaborators::new(stub, stub, posture, runtime, &mut sink);
        scorer.score(candidate, FilterPass::default(), &mut collab)
    }

    fn simple(actor: &ActorState, posture: &FixedPosture, candidate: Candidate) -> ScoredCandidate {
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime::default();
        run(&config, actor, &request, &Stub::default(), posture, &mut runtime, candidate).unwrap()
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(1e-5, 1e-5), 0.0);
        assert_eq!(clamp_score(5e-6, 1e-5), 0.0);
        assert_eq!(clamp_score(-3.0, 1e-5), 0.0);
        assert_eq!(clamp_score(f32::NAN, 1e-5), 0.0);
        assert_eq!(clamp_score(2e-5, 1e-5), 2e-5);
    }

    #[test]
    fn test_efficiency() {
        assert_eq!(efficiency(10.0, 0.0), 1.0);
        assert_eq!(efficiency(10.0, 10.0), 0.5);
        assert_eq!(efficiency(0.0, 0.0), 1.0);
        assert_eq!(efficiency(0.0, 5.0), 0.0);
        assert!(efficiency(1.0, 10_000.0) < 0.001);
    }

    #[test]
    fn test_hunger_scores_urgency() {
        let actor = actor(vec![Motive::new("hunger", 8.0), Motive::new("energy", 2.0)]);
        let scored = simple(&actor, &at_target(0.0), eat());

        assert_eq!(scored.score, 8.0);
        assert_eq!(scored.breakdown.efficiency, 1.0);
        assert_eq!(scored.breakdown.contributions.len(), 1);
    }

    #[test]
    fn test_zero_urgency_clamps_to_zero() {
        let actor = actor(vec![Motive::new("hunger", 0.0)]);
        let scored = simple(&actor, &at_target(0.0), eat());
        assert_eq!(scored.score, 0.0);
    }

    #[test]
    fn test_travel_reduces_score() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let scored = simple(&actor, &at_target(10.0), eat());
        assert_eq!(scored.score, 4.0);
        assert_eq!(scored.route_time, 10.0);
    }

    #[test]
    fn test_already_solving_dampener() {
        let actor = actor(vec![Motive::new("hunger", 8.0).addressed()]);
        let scored = simple(&actor, &at_target(0.0), eat());
        assert_eq!(scored.score, 2.0);
    }

    #[test]
    fn test_no_advertisements_scores_efficiency() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let candidate = Candidate::new(Arc::new(ActionDef::new("wander", 10.0)), FRIDGE);
        let scored = simple(&actor, &at_target(10.0), candidate);
        assert_eq!(scored.score, 0.5);
    }

    #[test]
    fn test_scoring_preference_multiplier() {
        let mut actor = actor(vec![Motive::new("energy", 4.0)]);
        actor.preferred_objects.insert("my_bed".to_string(), FRIDGE);
        let bed = Candidate::new(
            Arc::new(
                ActionDef::new("sleep", 60.0)
                    .advertise("energy", 1.0)
                    .with_preference("my_bed", true),
            ),
            FRIDGE,
        );

        let scored = simple(&actor, &at_target(0.0), bed);
        assert_eq!(scored.score, 6.0);
    }

    #[test]
    fn test_opportunity_cost_subtraction() {
        let mut actor = actor(vec![Motive::new("hunger", 8.0), Motive::new("fun", 4.0)]);
        actor.running = vec![RunningActivity::new(1, "watch_tv")
            .advertise("fun", 1.0)
            .with_cancellation_cost(0.5)];

        let scored = simple(&actor, &at_target(0.0), eat());
        assert_eq!(scored.breakdown.opportunity_cost, 2.0);
        assert_eq!(scored.score, 6.0);

        let posture = FixedPosture(Ok(PostureEstimate {
            route_time: 0.0,
            posture_change: true,
            kept: Vec::new(),
        }));
        let scored = simple(&actor, &posture, eat());
        assert_eq!(scored.breakdown.opportunity_cost, 3.0);
        assert_eq!(scored.score, 5.0);
    }

    #[test]
    fn test_opportunity_cost_skips_free_and_finishing() {
        let mut actor = actor(vec![Motive::new("hunger", 8.0), Motive::new("fun", 4.0)]);
        let mut free = RunningActivity::new(1, "idle").advertise("fun", 1.0);
        free.cancel_free = true;
        let mut finishing = RunningActivity::new(2, "watch_tv").advertise("fun", 1.0);
        finishing.finishing = true;
        actor.running = vec![free, finishing];

        let scored = simple(&actor, &at_target(0.0), eat());
        assert_eq!(scored.breakdown.opportunity_cost, 0.0);
        assert_eq!(scored.score, 8.0);
    }

    #[test]
    fn test_opportunity_cost_can_be_disabled() {
        let mut actor = actor(vec![Motive::new("hunger", 8.0), Motive::new("fun", 4.0)]);
        actor.running = vec![RunningActivity::new(1, "watch_tv").advertise("fun", 1.0)];

        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR).without_opportunity_cost();
        let mut runtime = CountingRuntime::default();
        let scored = run(
            &config,
            &actor,
            &request,
            &Stub::default(),
            &at_target(0.0),
            &mut runtime,
            eat(),
        )
        .unwrap();
        assert_eq!(scored.score, 8.0);
    }

    #[test]
    fn test_kept_activity_adds_back_at_multitask_percentage() {
        let mut actor = actor(vec![Motive::new("hunger", 8.0), Motive::new("fun", 4.0)]);
        actor.running = vec![RunningActivity::new(1, "listen_music")
            .advertise("fun", 1.0)
            .with_attention_cost(2.0)];

        let mut config = AutonomyConfig::default();
        config.curves.desire_to_bonus = Curve::constant(0.0);
        let posture = FixedPosture(Ok(PostureEstimate {
            route_time: 0.0,
            posture_change: false,
            kept: vec![ActivityId(1)],
        }));
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime::default();
        let scored =
            run(&config, &actor, &request, &Stub::default(), &posture, &mut runtime, eat()).unwrap();

        // Attention 2.0 maps to 50% on the default curve; 8 + 4 * 0.5.
        assert_eq!(scored.multitask_percentage, 0.5);
        assert_eq!(scored.breakdown.kept_utility, 4.0);
        assert_eq!(scored.score, 10.0);
    }

    #[test]
    fn test_multitask_bonus_and_penalty() {
        let motives = MotiveScoreTable::from_motives([Motive::new("hunger", 10.0), Motive::new("fun", 5.0)]);
        let config = AutonomyConfig::default();
        let music = RunningActivity::new(1, "listen_music").advertise("fun", 1.0);
        let kept = [&music];
        let own: BTreeSet<MotiveId> = [MotiveId::new("hunger")].into_iter().collect();

        let (total, percentage) = multitask_percentage(
            &AttentionInputs {
                kept: &kept,
                target_load: None,
                own_cost: 2.0,
                own_motives: &own,
            },
            &motives,
            &config,
        );

        // base 0.5, bonus 0.1 (hunger 10), penalty 0.05 (fun 5)
        assert_eq!(total, 2.0);
        assert!((percentage - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_target_load_takes_cheaper_side() {
        let motives = MotiveScoreTable::default();
        let config = AutonomyConfig::default();
        let busy = RunningActivity::new(1, "juggle").with_attention_cost(2.0);
        let kept = [&busy];
        let own = BTreeSet::new();

        let (total, _) = multitask_percentage(
            &AttentionInputs {
                kept: &kept,
                target_load: Some(0.5),
                own_cost: 0.25,
                own_motives: &own,
            },
            &motives,
            &config,
        );
        assert_eq!(total, 0.75);
    }

    #[test]
    fn test_social_multipliers() {
        let actor = actor(vec![Motive::new("social", 4.0)]);
        let mut stub = Stub::default();
        stub.agents.push(FRIEND);
        stub.desirability.insert(FRIEND, 1.0);
        stub.desirability.insert(ObjectId::new(3, 0), 2.0);
        stub.group = vec![ObjectId::new(3, 0), ACTOR];

        let chat = Candidate::new(
            Arc::new(ActionDef::new("chat", 10.0).advertise("social", 1.0)),
            FRIEND,
        );
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime::default();
        let scored = run(&config, &actor, &request, &stub, &at_target(0.0), &mut runtime, chat).unwrap();

        assert_eq!(scored.breakdown.relationship_multiplier, 1.5);
        assert_eq!(scored.score, 6.0);
    }

    fn chat_with(stub: &Stub, config: &AutonomyConfig) -> ScoredCandidate {
        let actor = actor(vec![Motive::new("social", 4.0)]);
        let chat = Candidate::new(
            Arc::new(ActionDef::new("chat", 10.0).advertise("social", 1.0)),
            FRIEND,
        );
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime::default();
        run(config, &actor, &request, stub, &at_target(0.0), &mut runtime, chat).unwrap()
    }

    #[test]
    fn test_group_size_curve() {
        let stub = Stub {
            agents: vec![FRIEND],
            group: vec![ObjectId::new(3, 0)],
            ..Default::default()
        };
        let mut config = AutonomyConfig::default();
        config.curves.group_size_utility = Curve::new(vec![(1.0, 1.0), (3.0, 2.0)]);

        // Target plus one member: size 2 sits halfway up the curve.
        let scored = chat_with(&stub, &config);
        assert_eq!(scored.breakdown.group_multiplier, 1.5);
        assert_eq!(scored.score, 6.0);
    }

    #[test]
    fn test_player_member_penalty_per_member() {
        let stub = Stub {
            agents: vec![FRIEND],
            group: vec![ObjectId::new(3, 0), ObjectId::new(4, 0)],
            players: vec![FRIEND, ObjectId::new(3, 0)],
            ..Default::default()
        };
        let mut config = AutonomyConfig::default();
        config.scoring.player_member_penalty = 0.5;

        let scored = chat_with(&stub, &config);
        assert_eq!(scored.breakdown.group_multiplier, 0.25);
        assert_eq!(scored.score, 1.0);
    }

    #[test]
    fn test_buff_multiplier() {
        let config = AutonomyConfig::default();
        let buffed = Stub {
            agents: vec![FRIEND],
            buff: Some(2.0),
            ..Default::default()
        };
        let scored = chat_with(&buffed, &config);
        assert_eq!(scored.breakdown.buff_multiplier, 2.0);
        assert_eq!(scored.score, 8.0);

        let broken = Stub {
            agents: vec![FRIEND],
            buff: Some(f32::NAN),
            ..Default::default()
        };
        let scored = chat_with(&broken, &config);
        assert_eq!(scored.breakdown.buff_multiplier, 1.0);
        assert_eq!(scored.score, 4.0);
    }

    #[test]
    fn test_off_lot_penalty() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let stub = Stub {
            off_lot: vec![FRIDGE],
            ..Default::default()
        };
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime::default();
        let scored = run(&config, &actor, &request, &stub, &at_target(0.0), &mut runtime, eat()).unwrap();
        assert_eq!(scored.score, 4.0);
    }

    #[test]
    fn test_crafted_adjustment_applies() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let motives = MotiveScoreTable::from_motives(actor.motives.clone());
        let scorer = UtilityScorer::new(ScoringContext {
            config: &config,
            actor: &actor,
            motives: &motives,
            request: &request,
        });
        let stub = Stub::default();
        let posture = at_target(0.0);
        let mut runtime = CountingRuntime::default();
        let mut sink = NullSink;
        let mut collab = Collaborators::new(&stub, &stub, &posture, &mut runtime, &mut sink);

        let scored = scorer
            .score(eat(), FilterPass { crafted_adjustment: 0.5 }, &mut collab)
            .unwrap();
        assert_eq!(scored.score, 12.0);
    }

    #[test]
    fn test_failures_release_runtime_action() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let stub = Stub::default();

        let mut runtime = CountingRuntime::default();
        let unreachable = FixedPosture(Err(PostureError::Unreachable));
        let err = run(&config, &actor, &request, &stub, &unreachable, &mut runtime, eat()).unwrap_err();
        assert_eq!(err.stage(), FailureStage::PostureSearch);
        assert_eq!(runtime.released.len(), 1);

        let mut locked = actor.clone();
        locked.posture_locked = true;
        let posture = FixedPosture(Ok(PostureEstimate {
            route_time: 0.0,
            posture_change: true,
            kept: Vec::new(),
        }));
        let err = run(&config, &locked, &request, &stub, &posture, &mut runtime, eat()).unwrap_err();
        assert_eq!(err, ScoringFailure::PostureLocked);
        assert_eq!(runtime.released.len(), 2);
    }

    #[test]
    fn test_allow_unreachable_scores_as_adjacent() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let config = AutonomyConfig::default();
        let mut request = AutonomyRequest::new(ACTOR);
        request.estimation.allow_unreachable = true;
        let mut runtime = CountingRuntime::default();
        let unreachable = FixedPosture(Err(PostureError::Unreachable));

        let scored =
            run(&config, &actor, &request, &Stub::default(), &unreachable, &mut runtime, eat()).unwrap();
        assert_eq!(scored.score, 8.0);
    }

    #[test]
    fn test_execution_failure() {
        let actor = actor(vec![Motive::new("hunger", 8.0)]);
        let config = AutonomyConfig::default();
        let request = AutonomyRequest::new(ACTOR);
        let mut runtime = CountingRuntime {
            fail: true,
            ..Default::default()
        };
        let err = run(&config, &actor, &request, &Stub::default(), &at_target(0.0), &mut runtime, eat())
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::Execution);
    }
}
