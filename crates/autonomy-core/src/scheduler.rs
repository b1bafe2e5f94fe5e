//! Evaluation Scheduler
//!
//! Drives one autonomy pass as an explicit resumable state machine. The host
//! calls [`EvaluationPass::step`] once per tick; the pass scans candidate
//! objects, suspends between objects when its time slice runs out, widens the
//! motive subset round by round until something wins, and finally hands back
//! the highest non-empty priority tier.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use thiserror::Error;

use autonomy_events::{
    generate_pass_id, ActionId, CandidateOutcome, CandidateRecord, FailureStage, MotiveId, ObjectId,
    PassRecord, PassStatus, PriorityTier,
};

use crate::candidate::Candidate;
use crate::config::AutonomyConfig;
use crate::filter::{run_filters, FilterContext, FilterPass};
use crate::limiter::DuplicateGroupLimiter;
use crate::motive::{MotiveRounds, MotiveScoreTable};
use crate::request::AutonomyRequest;
use crate::scorer::{ScoredCandidate, ScoringContext, UtilityScorer};
use crate::slicing::{Checkpoint, Clock, SystemClock, TimeSlicer, YieldKind};
use crate::winners::{preferred_target, TieredWinners, WinnerDecision};
use crate::world::{ActionRuntime, ActorState, Collaborators, WorldModel};

/// Why a finished pass produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoResultReason {
    /// The actor has no scoreable motive
    NoMotivesToScore,
    /// Every round finished without a winner
    NoCandidates,
}

/// Winners of the highest non-empty tier.
#[derive(Debug)]
pub struct AutonomyResult {
    pub pass_id: String,
    pub tier: PriorityTier,
    /// One entry per winning action identity, sorted by action id. The host
    /// owns their runtime actions from here on.
    pub winners: Vec<ScoredCandidate>,
    pub rounds: u32,
}

impl AutonomyResult {
    /// Highest-scoring winner; ties go to the smaller action id.
    pub fn best(&self) -> Option<&ScoredCandidate> {
        self.winners
            .iter()
            .reduce(|best, w| if w.score > best.score { w } else { best })
    }

    pub fn get(&self, action: &str) -> Option<&ScoredCandidate> {
        self.winners.iter().find(|w| w.candidate.action_id().as_str() == action)
    }

    /// Hands every runtime action back to the runtime.
    pub fn release(self, runtime: &mut dyn ActionRuntime) {
        for winner in self.winners {
            runtime.release(winner.action);
        }
    }
}

#[derive(Debug)]
pub enum PassOutcome {
    Winners(AutonomyResult),
    NoResult(NoResultReason),
    /// The actor or the request became invalid; everything held was released
    Aborted,
}

impl PassOutcome {
    pub fn winners(&self) -> Option<&AutonomyResult> {
        match self {
            PassOutcome::Winners(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_winners(self) -> Option<AutonomyResult> {
        match self {
            PassOutcome::Winners(result) => Some(result),
            _ => None,
        }
    }
}

/// Result of one `step`.
#[derive(Debug)]
pub enum PassPoll {
    /// Suspended; call `step` again after the indicated delay
    Yield(YieldKind),
    Done(PassOutcome),
}

/// Misuse of a pass by its host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("pass {0} already finished")]
    AlreadyFinished(String),
}

#[derive(Debug)]
enum Phase {
    Start,
    StartRound,
    Scan { objects: Vec<ObjectId>, next: usize },
    ScoreDeferred,
    Finished,
}

/// One in-flight autonomy pass for one actor.
pub struct EvaluationPass {
    pass_id: String,
    config: AutonomyConfig,
    request: AutonomyRequest,
    clock: Box<dyn Clock>,
    slicer: TimeSlicer,
    rng: SmallRng,
    phase: Phase,
    actor: ActorState,
    motives: MotiveScoreTable,
    rounds: Option<MotiveRounds>,
    active: BTreeSet<MotiveId>,
    round: u32,
    winners: TieredWinners,
    limiter: DuplicateGroupLimiter,
    yields: u32,
    scored: u32,
}

impl EvaluationPass {
    pub fn new(config: AutonomyConfig, request: AutonomyRequest) -> Self {
        Self::with_clock(config, request, SystemClock::new())
    }

    pub fn with_clock(config: AutonomyConfig, request: AutonomyRequest, clock: impl Clock + 'static) -> Self {
        let clock: Box<dyn Clock> = Box::new(clock);
        let slicer = TimeSlicer::new(&config.time_slicing, clock.as_ref());
        let rng = match request.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        Self {
            pass_id: generate_pass_id(),
            config,
            request,
            clock,
            slicer,
            rng,
            phase: Phase::Start,
            actor: ActorState::default(),
            motives: MotiveScoreTable::default(),
            rounds: None,
            active: BTreeSet::new(),
            round: 0,
            winners: TieredWinners::new(),
            limiter: DuplicateGroupLimiter::new(),
            yields: 0,
            scored: 0,
        }
    }

    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    pub fn yields(&self) -> u32 {
        self.yields
    }

    /// Rounds started so far.
    pub fn rounds(&self) -> u32 {
        self.round
    }

    /// Motives pursued by the current round; empty means unrestricted.
    pub fn active_motives(&self) -> &BTreeSet<MotiveId> {
        &self.active
    }

    pub fn winners(&self) -> &TieredWinners {
        &self.winners
    }

    /// Observer hook for hosts that learn about destroyed objects directly.
    pub fn forget_target(&mut self, target: ObjectId, runtime: &mut dyn ActionRuntime) {
        for scored in self.winners.forget_target(target) {
            runtime.release(scored.action);
        }
    }

    /// Advances the pass until it suspends or finishes.
    pub fn step(&mut self, collab: &mut Collaborators<'_>) -> Result<PassPoll, ContractViolation> {
        if self.is_finished() {
            return Err(ContractViolation::AlreadyFinished(self.pass_id.clone()));
        }
        if !self.still_valid(collab.world) {
            return Ok(PassPoll::Done(self.abort(collab)));
        }
        self.slicer.resumed(self.clock.as_ref());

        loop {
            match std::mem::replace(&mut self.phase, Phase::Finished) {
                Phase::Start => {
                    let Some(actor) = collab.world.actor(self.request.actor) else {
                        return Ok(PassPoll::Done(self.abort(collab)));
                    };
                    self.actor = actor.clone();
                    self.motives = MotiveScoreTable::snapshot(&self.actor.motives, &self.request.scope);
                    if self.motives.is_empty() {
                        return Ok(PassPoll::Done(self.no_result(collab, NoResultReason::NoMotivesToScore)));
                    }
                    self.rounds = Some(self.motives.rounds(self.config.selection.motive_variance));
                    self.phase = Phase::StartRound;
                }

                Phase::StartRound => {
                    let active = if self.request.restrict_to_active_motives {
                        self.rounds.as_mut().and_then(MotiveRounds::next_round)
                    } else if self.round == 0 {
                        Some(BTreeSet::new())
                    } else {
                        None
                    };
                    let Some(active) = active else {
                        return Ok(PassPoll::Done(self.no_result(collab, NoResultReason::NoCandidates)));
                    };

                    self.round += 1;
                    tracing::debug!(
                        pass_id = %self.pass_id,
                        round = self.round,
                        motives = ?active,
                        "Starting round"
                    );
                    self.active = active;
                    self.phase = Phase::Scan {
                        objects: scan_list(collab.world, self.actor.id),
                        next: 0,
                    };
                }

                Phase::Scan { objects, next } => {
                    let Some(object) = objects.get(next).copied() else {
                        self.phase = Phase::ScoreDeferred;
                        continue;
                    };
                    if collab.world.is_alive(object) {
                        self.scan_object(object, collab);
                    }
                    self.prune(collab);
                    self.phase = Phase::Scan {
                        objects,
                        next: next + 1,
                    };

                    if let Checkpoint::Yield(kind) = self.slicer.checkpoint(self.clock.as_ref()) {
                        self.yields += 1;
                        tracing::debug!(pass_id = %self.pass_id, ?kind, "Yielding");
                        return Ok(PassPoll::Yield(kind));
                    }
                }

                Phase::ScoreDeferred => {
                    let deferred = self.limiter.drain(
                        collab.world,
                        self.config.selection.duplicate_group_cap,
                        &mut self.rng,
                    );
                    for (candidate, pass) in deferred {
                        self.score(candidate, pass, collab);
                    }
                    self.limiter.clear();
                    self.prune(collab);

                    if !self.winners.is_empty() {
                        return Ok(PassPoll::Done(self.complete(collab)));
                    }
                    self.phase = Phase::StartRound;
                }

                Phase::Finished => {
                    return Err(ContractViolation::AlreadyFinished(self.pass_id.clone()));
                }
            }
        }
    }

    /// Steps until done, ignoring yields.
    pub fn run_to_completion(&mut self, collab: &mut Collaborators<'_>) -> Result<PassOutcome, ContractViolation> {
        loop {
            if let PassPoll::Done(outcome) = self.step(collab)? {
                return Ok(outcome);
            }
        }
    }

    fn still_valid(&self, world: &dyn WorldModel) -> bool {
        self.request.handle.is_valid()
            && world.is_alive(self.request.actor)
            && world.actor(self.request.actor).is_some()
    }

    fn scan_object(&mut self, object: ObjectId, collab: &mut Collaborators<'_>) {
        for candidate in collab.world.potential_candidates(self.actor.id, object) {
            let verdict = run_filters(
                &FilterContext {
                    actor: &self.actor,
                    request: &self.request,
                    active_motives: &self.active,
                    world: collab.world,
                    social: collab.social,
                },
                &candidate,
            );

            match verdict {
                Err(reason) => self.reject(
                    collab,
                    candidate.action_id(),
                    candidate.target,
                    candidate.tier(),
                    FailureStage::Filter,
                    || reason.to_string(),
                ),
                Ok(pass) => {
                    if let Some((candidate, pass)) = self.limiter.defer(candidate, pass) {
                        self.score(candidate, pass, collab);
                    }
                }
            }
        }
    }

    fn score(&mut self, candidate: Candidate, pass: FilterPass, collab: &mut Collaborators<'_>) {
        let action = candidate.action_id().clone();
        let (target, tier) = (candidate.target, candidate.tier());

        let result = UtilityScorer::new(ScoringContext {
            config: &self.config,
            actor: &self.actor,
            motives: &self.motives,
            request: &self.request,
        })
        .score(candidate, pass, collab);

        let scored = match result {
            Ok(scored) => scored,
            Err(failure) => {
                self.reject(collab, &action, target, tier, failure.stage(), || failure.to_string());
                return;
            }
        };

        self.scored += 1;
        tracing::debug!(
            action = %action,
            target = %target,
            score = scored.score,
            route_time = scored.route_time,
            "Candidate scored"
        );

        if scored.score <= 0.0 && !self.request.allow_zero_scores {
            self.drop_scored(collab, scored, FailureStage::BelowThreshold, "score is zero");
            return;
        }

        let preferred = preferred_target(&self.actor, &scored.candidate.action);
        let loser = match self.winners.record(scored, preferred) {
            WinnerDecision::Recorded { displaced } => displaced,
            WinnerDecision::Superseded(scored) => Some(scored),
        };
        if let Some(loser) = loser {
            self.drop_scored(collab, loser, FailureStage::Superseded, "a better candidate holds this action");
        }
    }

    /// Drops winners whose target died and releases their runtime actions.
    fn prune(&mut self, collab: &mut Collaborators<'_>) {
        for dead in self.winners.prune_dead(collab.world) {
            self.drop_scored(collab, dead, FailureStage::TargetDestroyed, "target destroyed while holding a winner");
        }
    }

    /// Releases a scored candidate and records why it lost, keeping its breakdown.
    fn drop_scored(&self, collab: &mut Collaborators<'_>, scored: ScoredCandidate, stage: FailureStage, reason: &str) {
        if collab.sink.enabled() {
            let record = self.record(
                scored.candidate.action_id(),
                scored.candidate.target,
                scored.candidate.tier(),
                CandidateOutcome::Rejected {
                    stage,
                    reason: reason.to_string(),
                    breakdown: Some(scored.breakdown.clone()),
                },
            );
            collab.sink.record_candidate(record);
        }
        collab.runtime.release(scored.action);
    }

    /// Records a candidate that is still held when the pass completes.
    fn accept(&self, collab: &mut Collaborators<'_>, scored: &ScoredCandidate) {
        if !collab.sink.enabled() {
            return;
        }
        let record = self.record(
            scored.candidate.action_id(),
            scored.candidate.target,
            scored.candidate.tier(),
            CandidateOutcome::Scored {
                breakdown: scored.breakdown.clone(),
            },
        );
        collab.sink.record_candidate(record);
    }

    fn complete(&mut self, collab: &mut Collaborators<'_>) -> PassOutcome {
        self.prune(collab);
        let Some(result) = self.winners.take_result() else {
            return self.no_result(collab, NoResultReason::NoCandidates);
        };

        for lower in result.lower {
            self.accept(collab, &lower);
            collab.runtime.release(lower.action);
        }
        for winner in &result.winners {
            self.accept(collab, winner);
        }

        let winners: Vec<(ActionId, ObjectId, f32)> = result
            .winners
            .iter()
            .map(|w| (w.candidate.action_id().clone(), w.action.target, w.score))
            .collect();
        tracing::info!(
            pass_id = %self.pass_id,
            actor = %self.actor.id,
            tier = %result.tier,
            winners = winners.len(),
            rounds = self.round,
            yields = self.yields,
            "Autonomy pass complete"
        );
        self.emit_pass(collab, PassStatus::Winners, Some(result.tier), winners);
        self.phase = Phase::Finished;

        PassOutcome::Winners(AutonomyResult {
            pass_id: self.pass_id.clone(),
            tier: result.tier,
            winners: result.winners,
            rounds: self.round,
        })
    }

    fn no_result(&mut self, collab: &mut Collaborators<'_>, reason: NoResultReason) -> PassOutcome {
        let status = match reason {
            NoResultReason::NoMotivesToScore => PassStatus::NoMotivesToScore,
            NoResultReason::NoCandidates => PassStatus::NoCandidates,
        };
        tracing::info!(
            pass_id = %self.pass_id,
            actor = %self.request.actor,
            ?reason,
            rounds = self.round,
            "Autonomy pass found nothing"
        );
        self.emit_pass(collab, status, None, Vec::new());
        self.phase = Phase::Finished;
        PassOutcome::NoResult(reason)
    }

    fn abort(&mut self, collab: &mut Collaborators<'_>) -> PassOutcome {
        let held = self.winners.drain_all();
        let released = held.len();
        for scored in held {
            self.drop_scored(collab, scored, FailureStage::Aborted, "pass aborted");
        }
        self.limiter.clear();
        tracing::warn!(
            pass_id = %self.pass_id,
            actor = %self.request.actor,
            released,
            "Autonomy pass aborted"
        );
        self.emit_pass(collab, PassStatus::Aborted, None, Vec::new());
        self.phase = Phase::Finished;
        PassOutcome::Aborted
    }

    fn record(&self, action: &ActionId, target: ObjectId, tier: PriorityTier, outcome: CandidateOutcome) -> CandidateRecord {
        CandidateRecord {
            pass_id: self.pass_id.clone(),
            round: self.round,
            action: action.clone(),
            target,
            tier,
            outcome,
        }
    }

    /// Records a rejection; the reason is only built when the sink listens.
    fn reject(
        &self,
        collab: &mut Collaborators<'_>,
        action: &ActionId,
        target: ObjectId,
        tier: PriorityTier,
        stage: FailureStage,
        reason: impl FnOnce() -> String,
    ) {
        if !collab.sink.enabled() {
            return;
        }
        let outcome = CandidateOutcome::Rejected {
            stage,
            reason: reason(),
            breakdown: None,
        };
        let record = self.record(action, target, tier, outcome);
        collab.sink.record_candidate(record);
    }

    fn emit_pass(
        &self,
        collab: &mut Collaborators<'_>,
        status: PassStatus,
        tier: Option<PriorityTier>,
        winners: Vec<(ActionId, ObjectId, f32)>,
    ) {
        if !collab.sink.enabled() {
            return;
        }
        collab.sink.record_pass(PassRecord {
            pass_id: self.pass_id.clone(),
            actor: self.request.actor,
            status,
            rounds: self.round,
            yields: self.yields,
            candidates_scored: self.scored,
            tier,
            winners,
        });
    }
}

/// Objects in range followed by carried items not already listed.
fn scan_list(world: &dyn WorldModel, actor: ObjectId) -> Vec<ObjectId> {
    let mut objects = world.objects_in_range(actor);
    for item in world.inventory(actor) {
        if !objects.contains(&item) {
            objects.push(item);
        }
    }
    objects
}
