//! Winner Tables
//!
//! One table per priority tier holds the best scored candidate per action
//! identity. Tables hold targets by weak handle only; entries whose target has
//! died are pruned and their runtime actions handed back for release.

use std::collections::{BTreeMap, HashMap};

use autonomy_events::{ActionId, ObjectId, PriorityTier};

use crate::candidate::ActionDef;
use crate::scorer::ScoredCandidate;
use crate::world::{ActionRuntime, ActorState, WorldModel};

/// Outcome of offering a scored candidate to a winner table.
#[derive(Debug)]
pub enum WinnerDecision {
    /// The candidate is now the winner for its action identity.
    Recorded { displaced: Option<ScoredCandidate> },
    /// An incumbent kept its place; the offered candidate is handed back.
    Superseded(ScoredCandidate),
}

/// The actor's non-scoring preferred target for this action, if any.
///
/// Scoring preferences already multiplied the utility; non-scoring ones only
/// decide replacement between candidates of the same identity.
pub fn preferred_target(actor: &ActorState, action: &ActionDef) -> Option<ObjectId> {
    action
        .preference
        .as_ref()
        .filter(|p| !p.scoring)
        .and_then(|p| actor.preferred_object(&p.tag))
}

/// Whether `challenger` replaces `incumbent`.
fn replaces(incumbent: &ScoredCandidate, challenger: &ScoredCandidate, preferred: Option<ObjectId>) -> bool {
    if let Some(preferred) = preferred {
        if incumbent.action.target == preferred {
            return false;
        }
        if challenger.action.target == preferred {
            return true;
        }
    }

    if challenger.score > incumbent.score {
        return true;
    }
    challenger.score == 0.0 && incumbent.score == 0.0 && challenger.route_time < incumbent.route_time
}

/// Best candidate per action identity within one tier.
#[derive(Debug, Default)]
pub struct WinnerTable {
    entries: HashMap<ActionId, ScoredCandidate>,
}

impl WinnerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, action: &ActionId) -> Option<&ScoredCandidate> {
        self.entries.get(action)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredCandidate> {
        self.entries.values()
    }

    pub fn record(&mut self, scored: ScoredCandidate, preferred: Option<ObjectId>) -> WinnerDecision {
        let key = scored.candidate.action_id().clone();
        match self.entries.get(&key) {
            Some(incumbent) if !replaces(incumbent, &scored, preferred) => {
                WinnerDecision::Superseded(scored)
            }
            _ => WinnerDecision::Recorded {
                displaced: self.entries.insert(key, scored),
            },
        }
    }

    /// Removes entries matching `dead`, returning them.
    fn remove_where(&mut self, mut dead: impl FnMut(ObjectId) -> bool) -> Vec<ScoredCandidate> {
        let keys: Vec<ActionId> = self
            .entries
            .iter()
            .filter(|(_, s)| dead(s.action.target) || dead(s.candidate.target))
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect()
    }

    /// Winners sorted by action identity.
    pub fn into_sorted(self) -> Vec<ScoredCandidate> {
        let mut winners: Vec<_> = self.entries.into_values().collect();
        winners.sort_by(|a, b| a.candidate.action_id().cmp(b.candidate.action_id()));
        winners
    }
}

/// The highest non-empty tier, plus everything that lost out to it.
#[derive(Debug)]
pub struct TierResult {
    pub tier: PriorityTier,
    pub winners: Vec<ScoredCandidate>,
    /// Winners of lower tiers; their runtime actions must be released
    pub lower: Vec<ScoredCandidate>,
}

/// Winner tables of every tier for one pass.
#[derive(Debug, Default)]
pub struct TieredWinners {
    tiers: BTreeMap<PriorityTier, WinnerTable>,
}

impl TieredWinners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.values().all(WinnerTable::is_empty)
    }

    pub fn len(&self) -> usize {
        self.tiers.values().map(WinnerTable::len).sum()
    }

    pub fn tier(&self, tier: PriorityTier) -> Option<&WinnerTable> {
        self.tiers.get(&tier)
    }

    pub fn record(&mut self, scored: ScoredCandidate, preferred: Option<ObjectId>) -> WinnerDecision {
        self.tiers
            .entry(scored.candidate.tier())
            .or_default()
            .record(scored, preferred)
    }

    /// Drops every entry whose target is no longer alive.
    pub fn prune_dead(&mut self, world: &dyn WorldModel) -> Vec<ScoredCandidate> {
        self.tiers
            .values_mut()
            .flat_map(|table| table.remove_where(|id| !world.is_alive(id)))
            .collect()
    }

    /// Observer form of pruning: the host reports a destroyed object directly.
    pub fn forget_target(&mut self, target: ObjectId) -> Vec<ScoredCandidate> {
        self.tiers
            .values_mut()
            .flat_map(|table| table.remove_where(|id| id == target))
            .collect()
    }

    /// Removes and returns the highest non-empty tier; all other tiers are
    /// emptied into `lower`.
    pub fn take_result(&mut self) -> Option<TierResult> {
        let tiers = std::mem::take(&mut self.tiers);
        let mut result: Option<TierResult> = None;
        let mut lower = Vec::new();

        for (tier, table) in tiers.into_iter().rev() {
            if table.is_empty() {
                continue;
            }
            if result.is_none() {
                result = Some(TierResult {
                    tier,
                    winners: table.into_sorted(),
                    lower: Vec::new(),
                });
            } else {
                lower.extend(table.entries.into_values());
            }
        }

        result.map(|mut r| {
            r.lower = lower;
            r
        })
    }

    /// Empties all tiers, handing back every held entry.
    pub fn drain_all(&mut self) -> Vec<ScoredCandidate> {
        std::mem::take(&mut self.tiers)
            .into_values()
            .flat_map(|table| table.entries.into_values())
            .collect()
    }

    /// Releases every held runtime action and empties all tiers. Returns how
    /// many were released.
    pub fn release_all(&mut self, runtime: &mut dyn ActionRuntime) -> usize {
        let held = self.drain_all();
        let released = held.len();
        for scored in held {
            runtime.release(scored.action);
        }
        released
    }
}
