//! Duplicate Group Limiter
//!
//! Many objects offer the same kind of interaction (every chair offers "sit").
//! Candidates tagged with a duplicate group are deferred during the object
//! scan; afterwards at most `cap` of each group are kept, chosen uniformly at
//! random, and only those are scored.

use rand::seq::index;
use rand::Rng;
use std::collections::BTreeMap;

use crate::candidate::{Candidate, DuplicateGroup};
use crate::filter::FilterPass;
use crate::world::WorldModel;

/// Per-round store of deferred grouped candidates.
#[derive(Debug, Default)]
pub struct DuplicateGroupLimiter {
    groups: BTreeMap<DuplicateGroup, Vec<(Candidate, FilterPass)>>,
}

impl DuplicateGroupLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defers a candidate that passed filtering. Ungrouped candidates are
    /// handed back for immediate scoring.
    pub fn defer(&mut self, candidate: Candidate, pass: FilterPass) -> Option<(Candidate, FilterPass)> {
        match candidate.action.duplicate_group.clone() {
            Some(group) => {
                self.groups.entry(group).or_default().push((candidate, pass));
                None
            }
            None => Some((candidate, pass)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Number of deferred candidates across all groups.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Empties the store, returning the candidates to score this round.
    ///
    /// Candidates whose target died while deferred are dropped. Groups over
    /// `cap` are sampled uniformly without replacement; sampled candidates
    /// keep their scan order.
    pub fn drain<R: Rng>(
        &mut self,
        world: &dyn WorldModel,
        cap: usize,
        rng: &mut R,
    ) -> Vec<(Candidate, FilterPass)> {
        let mut selected = Vec::new();

        for (group, members) in std::mem::take(&mut self.groups) {
            let mut alive: Vec<_> = members
                .into_iter()
                .filter(|(candidate, _)| world.is_alive(candidate.target))
                .collect();

            if alive.len() > cap {
                let mut keep = index::sample(rng, alive.len(), cap).into_vec();
                keep.sort_unstable();
                tracing::debug!(
                    group = %group.0,
                    deferred = alive.len(),
                    cap,
                    "Sampling duplicate group"
                );
                let mut slots: Vec<Option<(Candidate, FilterPass)>> =
                    alive.drain(..).map(Some).collect();
                alive = keep.into_iter().filter_map(|i| slots[i].take()).collect();
            }

            selected.extend(alive);
        }

        selected
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
