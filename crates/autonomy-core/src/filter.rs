//! Candidate Filter Chain
//!
//! Ordered, independent predicates run before a candidate is scored. The
//! first failing predicate rejects the candidate; cheaper and more
//! disqualifying checks run first.

use std::collections::BTreeSet;
use thiserror::Error;

use autonomy_events::{ActionId, MotiveId};

use crate::candidate::Candidate;
use crate::request::{AutonomyRequest, RequestSource};
use crate::world::{ActorState, SocialModel, WorldModel};

/// Why a candidate was filtered out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("{0} does not allow autonomous use")]
    NotAutonomous(ActionId),
    #[error("{0} does not allow user direction")]
    NotUserDirected(ActionId),
    #[error("{0} is a super action with no advertised motives")]
    NothingAdvertised(ActionId),
    #[error("target is locked by another actor")]
    LockedOut,
    #[error("interaction is suppressed on this object")]
    Suppressed,
    #[error("{0} is on the skip list")]
    SkipListed(ActionId),
    #[error("{0} is outside the allowed action list")]
    NotAllowed(ActionId),
    #[error("no advertised motive is in the active set")]
    NoActiveDesire,
    #[error("only satisfies skipped motives")]
    OnlySkippedMotives,
    #[error("does not intersect the requested constraint")]
    ConstraintMismatch,
    #[error("action test failed")]
    TestFailed,
    #[error("{0} is already running and may not be overwritten")]
    AlreadyRunning(ActionId),
}

/// Inputs shared by every predicate for one candidate.
pub struct FilterContext<'a> {
    pub actor: &'a ActorState,
    pub request: &'a AutonomyRequest,
    /// Empty means unrestricted
    pub active_motives: &'a BTreeSet<MotiveId>,
    pub world: &'a dyn WorldModel,
    pub social: &'a dyn SocialModel,
}

/// Side results of a candidate that passed every predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterPass {
    /// Relationship-based adjustment for crafted targets, applied as `1 + adjustment`
    pub crafted_adjustment: f32,
}

type Predicate = fn(&FilterContext<'_>, &Candidate, &mut FilterPass) -> Result<(), RejectReason>;

/// The chain, in evaluation order.
const CHAIN: [(&str, Predicate); 10] = [
    ("autonomy_eligibility", autonomy_eligibility),
    ("target_availability", target_availability),
    ("suppression", suppression),
    ("skip_list", skip_list),
    ("active_desire", active_desire),
    ("skipped_motives", skipped_motives),
    ("constraint", constraint),
    ("crafted_relationship", crafted_relationship),
    ("action_test", action_test),
    ("running_duplicate", running_duplicate),
];

/// Runs every predicate in order, stopping at the first rejection.
pub fn run_filters(ctx: &FilterContext<'_>, candidate: &Candidate) -> Result<FilterPass, RejectReason> {
    let mut pass = FilterPass::default();
    for (name, predicate) in CHAIN.iter() {
        if let Err(reason) = predicate(ctx, candidate, &mut pass) {
            tracing::trace!(
                stage = *name,
                action = %candidate.action_id(),
                target = %candidate.target,
                "Candidate rejected: {}",
                reason
            );
            return Err(reason);
        }
    }
    Ok(pass)
}

fn autonomy_eligibility(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    let action = &candidate.action;
    if !action.allow_autonomous {
        return Err(RejectReason::NotAutonomous(action.id.clone()));
    }
    match ctx.request.source {
        RequestSource::PieMenu if !action.allow_user_directed => {
            Err(RejectReason::NotUserDirected(action.id.clone()))
        }
        RequestSource::Autonomy if action.is_super && action.advertisements.is_empty() => {
            Err(RejectReason::NothingAdvertised(action.id.clone()))
        }
        _ => Ok(()),
    }
}

fn target_availability(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    if !ctx.request.ignore_lockouts && ctx.world.is_locked_out(ctx.actor.id, candidate.target) {
        return Err(RejectReason::LockedOut);
    }
    Ok(())
}

fn suppression(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    if ctx.world.is_suppressed(ctx.actor.id, candidate) {
        return Err(RejectReason::Suppressed);
    }
    Ok(())
}

fn skip_list(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    let id = candidate.action_id();
    if ctx.request.skip_actions.contains(id) {
        return Err(RejectReason::SkipListed(id.clone()));
    }
    if let Some(allowed) = ctx.request.allowed_actions() {
        if !allowed.contains(id) {
            return Err(RejectReason::NotAllowed(id.clone()));
        }
    }
    Ok(())
}

fn active_desire(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    if ctx.active_motives.is_empty() {
        return Ok(());
    }
    if candidate
        .action
        .advertised_motives()
        .any(|m| ctx.active_motives.contains(m))
    {
        Ok(())
    } else {
        Err(RejectReason::NoActiveDesire)
    }
}

fn skipped_motives(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    let skip = &ctx.request.skip_motives;
    if skip.is_empty() || candidate.action.advertisements.is_empty() {
        return Ok(());
    }
    if candidate.action.advertised_motives().all(|m| skip.contains(m)) {
        return Err(RejectReason::OnlySkippedMotives);
    }
    Ok(())
}

fn constraint(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    let (Some(requested), Some(own)) = (ctx.request.constraint.as_ref(), candidate.constraint.as_ref())
    else {
        return Ok(());
    };
    if requested.intersects(own) {
        Ok(())
    } else {
        Err(RejectReason::ConstraintMismatch)
    }
}

fn crafted_relationship(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    if let Some(creator) = ctx.world.creator_of(candidate.target) {
        let adjustment = ctx.social.crafter_adjustment(ctx.actor.id, creator);
        if adjustment.is_finite() {
            pass.crafted_adjustment = adjustment;
        }
    }
    Ok(())
}

fn action_test(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    if ctx.world.test_candidate(ctx.actor.id, candidate) {
        Ok(())
    } else {
        Err(RejectReason::TestFailed)
    }
}

fn running_duplicate(
    ctx: &FilterContext<'_>,
    candidate: &Candidate,
    _pass: &mut FilterPass,
) -> Result<(), RejectReason> {
    let action = &candidate.action;
    if !action.allow_overwrite_running && ctx.actor.is_running(&action.id, Some(candidate.target)) {
        return Err(RejectReason::AlreadyRunning(action.id.clone()));
    }
    Ok(())
}
