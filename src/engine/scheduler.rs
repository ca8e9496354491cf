use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use log::{debug, trace};

use crate::engine::mastery::{MasteryCard, is_card_mastered};
use crate::engine::pattern::PatternId;
use crate::engine::random::RandomSource;

/// Range (inclusive) of global repetitions that must pass after touching a
/// mastered pattern before another mastered review is scheduled.
pub const MASTERED_REVIEW_COOLDOWN: (u32, u32) = (10, 20);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionTier {
    Unreviewed,
    Due,
    Unmastered,
    MasteredReview,
    Fallback,
}

/// Adaptive weighting of the selection cascade. The default (both 1.0)
/// always introduces new patterns first and always picks the weakest card.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SchedulingBias {
    /// Probability of introducing an unreviewed pattern while reviewed ones exist.
    pub new_pattern_rate: f64,
    /// Probability of picking the weakest candidate instead of a random one.
    pub weak_pattern_bias: f64,
}

impl Default for SchedulingBias {
    fn default() -> Self {
        Self {
            new_pattern_rate: 1.0,
            weak_pattern_bias: 1.0,
        }
    }
}

fn weakest_first(a: &&MasteryCard, b: &&MasteryCard) -> Ordering {
    a.attempts()
        .cmp(&b.attempts())
        .then_with(|| {
            a.accuracy()
                .partial_cmp(&b.accuracy())
                .unwrap_or(Ordering::Equal)
        })
}

fn pick_weak(
    mut candidates: Vec<&MasteryCard>,
    bias: &SchedulingBias,
    rng: &mut impl RandomSource,
) -> Option<PatternId> {
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(weakest_first);
    if rng.chance(bias.weak_pattern_bias) {
        Some(candidates[0].pattern_id)
    } else {
        Some(candidates[rng.next_index(candidates.len())].pattern_id)
    }
}

pub fn select_next_pattern(
    cards: &BTreeMap<PatternId, MasteryCard>,
    all_pattern_ids: &[PatternId],
    global_repetition_count: u64,
    last_mastered_review_at: u64,
    rng: &mut impl RandomSource,
) -> Option<PatternId> {
    select_next_pattern_biased(
        cards,
        all_pattern_ids,
        global_repetition_count,
        last_mastered_review_at,
        &SchedulingBias::default(),
        rng,
    )
    .map(|(id, _)| id)
}

/// Priority cascade: unreviewed, due, unmastered, mastered review (after a
/// cooldown), then any pattern. Only cards inside `all_pattern_ids` are
/// considered. Returns `None` only for an empty universe.
pub fn select_next_pattern_biased(
    cards: &BTreeMap<PatternId, MasteryCard>,
    all_pattern_ids: &[PatternId],
    global_repetition_count: u64,
    last_mastered_review_at: u64,
    bias: &SchedulingBias,
    rng: &mut impl RandomSource,
) -> Option<(PatternId, SelectionTier)> {
    if all_pattern_ids.is_empty() {
        return None;
    }

    let universe: HashSet<&PatternId> = all_pattern_ids.iter().collect();
    let reviewed: Vec<&MasteryCard> = cards
        .values()
        .filter(|c| universe.contains(&c.pattern_id))
        .collect();
    let unreviewed: Vec<PatternId> = all_pattern_ids
        .iter()
        .filter(|id| !cards.contains_key(*id))
        .copied()
        .collect();

    if !unreviewed.is_empty() && (reviewed.is_empty() || rng.chance(bias.new_pattern_rate)) {
        let id = unreviewed[rng.next_index(unreviewed.len())];
        return Some((id, SelectionTier::Unreviewed));
    }

    let (mastered, unmastered): (Vec<&MasteryCard>, Vec<&MasteryCard>) =
        reviewed.into_iter().partition(|c| is_card_mastered(c));

    let due: Vec<&MasteryCard> = unmastered
        .iter()
        .copied()
        .filter(|c| c.is_due(global_repetition_count))
        .collect();
    if let Some(id) = pick_weak(due, bias, rng) {
        return Some((id, SelectionTier::Due));
    }

    if let Some(id) = pick_weak(unmastered, bias, rng) {
        return Some((id, SelectionTier::Unmastered));
    }

    if !unreviewed.is_empty() {
        let id = unreviewed[rng.next_index(unreviewed.len())];
        return Some((id, SelectionTier::Unreviewed));
    }

    if !mastered.is_empty() {
        let since = global_repetition_count.saturating_sub(last_mastered_review_at);
        let (lo, hi) = MASTERED_REVIEW_COOLDOWN;
        let cooldown = rng.range_inclusive(lo, hi) as u64;
        if since >= cooldown {
            let id = mastered[rng.next_index(mastered.len())].pattern_id;
            debug!("mastered review of {id} after {since} repetitions");
            return Some((id, SelectionTier::MasteredReview));
        }
        trace!("mastered review cooling down ({since} < {cooldown})");
    }

    let id = all_pattern_ids[rng.next_index(all_pattern_ids.len())];
    Some((id, SelectionTier::Fallback))
}
