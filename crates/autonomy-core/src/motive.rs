//! Motive Scores
//!
//! Per-pass snapshot of the actor's needs and the widening rounds that decide
//! which motives are actively pursued.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use autonomy_events::MotiveId;

/// One need of the actor, as exposed by the world model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motive {
    pub id: MotiveId,
    /// Current urgency; higher is more urgent
    pub urgency: f32,
    /// Static importance multiplier
    #[serde(default = "default_weight")]
    pub autonomy_weight: f32,
    /// A running activity is already addressing this motive
    #[serde(default)]
    pub actively_addressed: bool,
    /// Part of the actor's default autonomy scoring set
    #[serde(default = "default_normally_scored")]
    pub normally_scored: bool,
}

fn default_weight() -> f32 {
    1.0
}

fn default_normally_scored() -> bool {
    true
}

impl Motive {
    pub fn new(id: impl Into<String>, urgency: f32) -> Self {
        Self {
            id: MotiveId::new(id),
            urgency,
            autonomy_weight: 1.0,
            actively_addressed: false,
            normally_scored: true,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.autonomy_weight = weight;
        self
    }

    pub fn addressed(mut self) -> Self {
        self.actively_addressed = true;
        self
    }

    pub fn not_normally_scored(mut self) -> Self {
        self.normally_scored = false;
        self
    }
}

/// Which motives a request wants scored.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MotiveScope {
    /// Score exactly the actor's normally-scored motives
    #[default]
    Default,
    /// Score the listed commodities plus the normally-scored motives
    Commodities(Vec<MotiveId>),
    /// Only the listed action identities are candidates; score the normally-scored motives
    AllowedActions(BTreeSet<autonomy_events::ActionId>),
}

/// Snapshot of motive urgency for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotiveScoreTable {
    entries: BTreeMap<MotiveId, Motive>,
}

impl MotiveScoreTable {
    /// Builds the table for the given scope from the actor's motives.
    pub fn snapshot(motives: &[Motive], scope: &MotiveScope) -> Self {
        let mut entries = BTreeMap::new();

        for motive in motives.iter().filter(|m| m.normally_scored) {
            entries.insert(motive.id.clone(), motive.clone());
        }

        if let MotiveScope::Commodities(commodities) = scope {
            for commodity in commodities {
                if let Some(motive) = motives.iter().find(|m| &m.id == commodity) {
                    entries.insert(motive.id.clone(), motive.clone());
                }
            }
        }

        Self { entries }
    }

    pub fn from_motives(motives: impl IntoIterator<Item = Motive>) -> Self {
        Self {
            entries: motives.into_iter().map(|m| (m.id.clone(), m)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, motive: &MotiveId) -> Option<&Motive> {
        self.entries.get(motive)
    }

    pub fn urgency(&self, motive: &MotiveId) -> Option<f32> {
        self.entries.get(motive).map(|m| m.urgency)
    }

    pub fn contains(&self, motive: &MotiveId) -> bool {
        self.entries.contains_key(motive)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Motive> {
        self.entries.values()
    }

    /// Starts the widening rounds over this table.
    pub fn rounds(&self, variance: f32) -> MotiveRounds {
        MotiveRounds::new(self, variance)
    }
}

/// Successive motive subsets, most urgent first.
///
/// Each round takes the remaining motives whose urgency is at least
/// `variance` times the highest remaining urgency (inclusive). Later rounds
/// only happen when earlier ones produced no winner.
#[derive(Debug, Clone)]
pub struct MotiveRounds {
    remaining: Vec<(MotiveId, f32)>,
    variance: f32,
}

impl MotiveRounds {
    fn new(table: &MotiveScoreTable, variance: f32) -> Self {
        let mut remaining: Vec<(MotiveId, f32)> = table
            .iter()
            .map(|m| (m.id.clone(), m.urgency))
            .collect();
        // Stable on ties: the table iterates in id order.
        remaining.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self { remaining, variance }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Motives not yet handed out.
    pub fn remaining(&self) -> impl Iterator<Item = &MotiveId> {
        self.remaining.iter().map(|(id, _)| id)
    }

    /// Takes the next active subset, or `None` when all motives were considered.
    pub fn next_round(&mut self) -> Option<BTreeSet<MotiveId>> {
        let top = self.remaining.first()?.1;
        let threshold = top * self.variance;
        let take = self
            .remaining
            .iter()
            .take_while(|(_, urgency)| *urgency >= threshold)
            .count()
            .max(1);

        Some(self.remaining.drain(..take).map(|(id, _)| id).collect())
    }
}
