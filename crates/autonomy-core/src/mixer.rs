//! Mixer Selection
//!
//! Mixers are short in-place actions attached to running activities and
//! traits. Selection is a weighted random pick rather than best-of: first a
//! provider, then one of its named groups. Every mixer in the chosen group is
//! returned with its score.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use autonomy_events::ActionId;

use crate::candidate::Advertisement;
use crate::config::AutonomyConfig;
use crate::motive::MotiveScoreTable;

fn one() -> f32 {
    1.0
}

/// One short in-place action offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerAction {
    pub action: ActionId,
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,
    pub group: String,
    #[serde(default = "one")]
    pub weight: f32,
}

impl MixerAction {
    pub fn new(action: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            action: ActionId::new(action),
            advertisements: Vec::new(),
            group: group.into(),
            weight: 1.0,
        }
    }

    pub fn advertise(mut self, motive: impl Into<String>, rate: f32) -> Self {
        self.advertisements.push(Advertisement::new(motive, rate));
        self
    }
}

/// A running activity or trait that offers mixers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerProvider {
    pub id: String,
    #[serde(default = "one")]
    pub weight: f32,
    #[serde(default)]
    pub advertisements: Vec<Advertisement>,
    #[serde(default)]
    pub mixers: Vec<MixerAction>,
}

impl MixerProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            weight: 1.0,
            advertisements: Vec::new(),
            mixers: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn advertise(mut self, motive: impl Into<String>, rate: f32) -> Self {
        self.advertisements.push(Advertisement::new(motive, rate));
        self
    }

    pub fn offer(mut self, mixer: MixerAction) -> Self {
        self.mixers.push(mixer);
        self
    }
}

/// Result of a mixer pick.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerChoice {
    pub provider: String,
    pub group: String,
    /// Every mixer of the chosen group with its score
    pub actions: Vec<(ActionId, f32)>,
}

/// Best desire among the advertised motives, never below `floor`.
pub fn desire_score(advertisements: &[Advertisement], motives: &MotiveScoreTable, floor: f32) -> f32 {
    advertisements
        .iter()
        .filter_map(|ad| motives.get(&ad.motive))
        .map(|m| m.urgency * m.autonomy_weight)
        .filter(|d| d.is_finite())
        .fold(floor, f32::max)
}

/// Weighted pick among positive weights, uniform among the zero weights when
/// none is positive. Non-finite weights count as zero; negative ones are never
/// picked.
fn weighted_pick<R: Rng>(weights: &[f32], rng: &mut R) -> Option<usize> {
    let sanitized: Vec<f32> = weights.iter().map(|w| if w.is_finite() { *w } else { 0.0 }).collect();
    let max = sanitized.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        // Rescaled so the running total cannot overflow.
        let positive: Vec<f32> = sanitized.iter().map(|w| if *w > 0.0 { *w / max } else { 0.0 }).collect();
        if let Ok(dist) = WeightedIndex::new(&positive) {
            return Some(dist.sample(rng));
        }
    }

    let zero: Vec<usize> = sanitized
        .iter()
        .enumerate()
        .filter(|(_, w)| **w == 0.0)
        .map(|(i, _)| i)
        .collect();
    zero.choose(rng).copied()
}

pub struct MixerSelector<'a> {
    config: &'a AutonomyConfig,
    motives: &'a MotiveScoreTable,
}

impl<'a> MixerSelector<'a> {
    pub fn new(config: &'a AutonomyConfig, motives: &'a MotiveScoreTable) -> Self {
        Self { config, motives }
    }

    pub fn provider_score(&self, provider: &MixerProvider) -> f32 {
        desire_score(&provider.advertisements, self.motives, self.config.mixer.floor_score) * provider.weight
    }

    pub fn mixer_score(&self, mixer: &MixerAction) -> f32 {
        desire_score(&mixer.advertisements, self.motives, self.config.mixer.floor_score) * mixer.weight
    }

    /// Runs to completion; `None` when no provider offers any mixer.
    pub fn select<R: Rng>(&self, providers: &[MixerProvider], rng: &mut R) -> Option<MixerChoice> {
        let providers: Vec<&MixerProvider> = providers.iter().filter(|p| !p.mixers.is_empty()).collect();
        let scores: Vec<f32> = providers.iter().map(|p| self.provider_score(p)).collect();
        let provider = providers[weighted_pick(&scores, rng)?];

        let mut groups: BTreeMap<&str, Vec<&MixerAction>> = BTreeMap::new();
        for mixer in &provider.mixers {
            groups.entry(mixer.group.as_str()).or_default().push(mixer);
        }

        let names: Vec<&str> = groups.keys().copied().collect();
        let weights: Vec<f32> = names
            .iter()
            .map(|name| match self.config.mixer.group_weights.get(*name) {
                Some(weight) => *weight,
                None => {
                    tracing::warn!(provider = %provider.id, group = name, "Untuned mixer group, using weight 1.0");
                    1.0
                }
            })
            .collect();
        let group = names[weighted_pick(&weights, rng)?];

        let actions = groups[group]
            .iter()
            .map(|m| (m.action.clone(), self.mixer_score(m)))
            .collect();

        tracing::debug!(provider = %provider.id, group, "Mixer group chosen");
        Some(MixerChoice {
            provider: provider.id.clone(),
            group: group.to_string(),
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motive::Motive;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn motives() -> MotiveScoreTable {
        MotiveScoreTable::from_motives([Motive::new("fun", 6.0), Motive::new("social", 2.0)])
    }

    #[test]
    fn test_desire_score_uses_best_motive_or_floor() {
        let table = motives();
        let ads = vec![Advertisement::new("fun", 1.0), Advertisement::new("social", 1.0)];
        assert_eq!(desire_score(&ads, &table, 0.1), 6.0);
        assert_eq!(desire_score(&[], &table, 0.1), 0.1);
        assert_eq!(desire_score(&[Advertisement::new("hygiene", 1.0)], &table, 0.1), 0.1);
    }

    #[test]
    fn test_provider_score_applies_weight() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let tv = MixerProvider::new("watch_tv").with_weight(0.5).advertise("fun", 1.0);
        assert_eq!(selector.provider_score(&tv), 3.0);
    }

    #[test]
    fn test_no_mixers_no_choice() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(selector.select(&[], &mut rng).is_none());
        assert!(selector.select(&[MixerProvider::new("empty")], &mut rng).is_none());
    }

    #[test]
    fn test_choice_returns_whole_group() {
        let mut config = AutonomyConfig::default();
        config.mixer.group_weights.insert("chat".to_string(), 1.0);
        config.mixer.group_weights.insert("joke".to_string(), 0.0);
        let table = motives();
        let selector = MixerSelector::new(&config, &table);

        let talk = MixerProvider::new("conversation")
            .advertise("social", 1.0)
            .offer(MixerAction::new("small_talk", "chat").advertise("social", 1.0))
            .offer(MixerAction::new("gossip", "chat").advertise("fun", 1.0))
            .offer(MixerAction::new("pun", "joke"));

        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..20 {
            let choice = selector.select(std::slice::from_ref(&talk), &mut rng).unwrap();
            assert_eq!(choice.group, "chat");
            assert_eq!(
                choice.actions,
                vec![(ActionId::new("small_talk"), 2.0), (ActionId::new("gossip"), 6.0)]
            );
        }
    }

    #[test]
    fn test_zero_weight_providers_fall_back_to_uniform() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let providers = [
            MixerProvider::new("a").with_weight(0.0).offer(MixerAction::new("x", "g")),
            MixerProvider::new("b").with_weight(0.0).offer(MixerAction::new("y", "g")),
        ];

        let mut rng = SmallRng::seed_from_u64(9);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..50 {
            seen.insert(selector.select(&providers, &mut rng).unwrap().provider);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_fallback_skips_negative_providers() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let providers = [
            MixerProvider::new("sulk").with_weight(-1.0).offer(MixerAction::new("x", "g")),
            MixerProvider::new("idle").with_weight(0.0).offer(MixerAction::new("y", "g")),
        ];

        let mut rng = SmallRng::seed_from_u64(4);
        for _ in 0..50 {
            assert_eq!(selector.select(&providers, &mut rng).unwrap().provider, "idle");
        }
        assert!(selector.select(&providers[..1], &mut rng).is_none());
    }

    #[test]
    fn test_non_finite_provider_scores_are_skipped() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let providers = [
            // 6 * 1e38 overflows to infinity
            MixerProvider::new("huge").with_weight(1e38).advertise("fun", 1.0).offer(MixerAction::new("x", "g")),
            MixerProvider::new("nan").with_weight(f32::NAN).offer(MixerAction::new("y", "g")),
            MixerProvider::new("tv").advertise("fun", 1.0).offer(MixerAction::new("z", "g")),
        ];
        assert!(selector.provider_score(&providers[0]).is_infinite());

        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..50 {
            assert_eq!(selector.select(&providers, &mut rng).unwrap().provider, "tv");
        }
    }

    #[test]
    fn test_large_finite_scores_do_not_overflow_the_total() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        // Each scores 1.8e38; together they exceed f32::MAX.
        let providers = [
            MixerProvider::new("a").with_weight(3e37).advertise("fun", 1.0).offer(MixerAction::new("x", "g")),
            MixerProvider::new("b").with_weight(3e37).advertise("fun", 1.0).offer(MixerAction::new("y", "g")),
        ];
        assert!(selector.provider_score(&providers[0]).is_finite());

        let mut rng = SmallRng::seed_from_u64(12);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..50 {
            seen.insert(selector.select(&providers, &mut rng).unwrap().provider);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_weighted_provider_distribution() {
        let config = AutonomyConfig::default();
        let table = motives();
        let selector = MixerSelector::new(&config, &table);
        let providers = [
            MixerProvider::new("fun").advertise("fun", 1.0).offer(MixerAction::new("x", "g")),
            MixerProvider::new("social").advertise("social", 1.0).offer(MixerAction::new("y", "g")),
        ];

        let mut rng = SmallRng::seed_from_u64(11);
        let fun = (0..4000)
            .filter(|_| selector.select(&providers, &mut rng).unwrap().provider == "fun")
            .count();
        // 6 / (6 + 2) = 75%
        assert!((2800..3200).contains(&fun), "fun picked {fun} times");
    }
}
