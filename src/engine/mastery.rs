use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::pattern::PatternId;

pub const DEFAULT_EASINESS: f64 = 2.5;
pub const MIN_EASINESS: f64 = 1.3;
pub const MASTERY_MIN_ATTEMPTS: u32 = 5;
pub const MASTERY_ACCURACY: f64 = 0.90;

const SUCCESS_QUALITY: u8 = 4;
const FAILURE_QUALITY: u8 = 0;

/// How a failed review treats easiness and the repetition streak.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPolicy {
    /// Unmodified SM-2: full easiness penalty, streak reset to zero.
    #[default]
    Canonical,
    /// Halved easiness penalty, streak halved instead of reset.
    Lenient,
}

impl ReviewPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewPolicy::Canonical => "canonical",
            ReviewPolicy::Lenient => "lenient",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "canonical" => Some(ReviewPolicy::Canonical),
            "lenient" => Some(ReviewPolicy::Lenient),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MasteryCard {
    pub pattern_id: PatternId,
    pub easiness: f64,
    /// Reviews until due, counted in global repetitions.
    pub interval: u32,
    pub repetitions: u32,
    pub success_count: u32,
    pub fail_count: u32,
    pub last_reviewed_at: DateTime<Utc>,
    /// Global repetition count at which the card becomes due.
    pub next_due_at: u64,
}

impl MasteryCard {
    pub fn attempts(&self) -> u32 {
        self.success_count + self.fail_count
    }

    pub fn accuracy(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            return 0.0;
        }
        self.success_count as f64 / attempts as f64
    }

    pub fn is_due(&self, global_repetition_count: u64) -> bool {
        self.next_due_at <= global_repetition_count
    }
}

pub fn init_card(pattern_id: PatternId, global_repetition_count: u64, now: DateTime<Utc>) -> MasteryCard {
    MasteryCard {
        pattern_id,
        easiness: DEFAULT_EASINESS,
        interval: 1,
        repetitions: 0,
        success_count: 0,
        fail_count: 0,
        last_reviewed_at: now,
        next_due_at: global_repetition_count + 1,
    }
}

fn easiness_delta(quality: u8) -> f64 {
    let q = (5 - quality.min(5)) as f64;
    0.1 - q * (0.08 + q * 0.02)
}

/// Apply one review outcome and return the updated card. The input card is
/// left untouched so callers can compare before and after.
pub fn review_card(
    card: &MasteryCard,
    correct: bool,
    global_repetition_count: u64,
    now: DateTime<Utc>,
    policy: ReviewPolicy,
) -> MasteryCard {
    let quality = if correct { SUCCESS_QUALITY } else { FAILURE_QUALITY };

    let mut delta = easiness_delta(quality);
    if policy == ReviewPolicy::Lenient && delta < 0.0 {
        delta *= 0.5;
    }
    let easiness = (card.easiness + delta).max(MIN_EASINESS);

    let (repetitions, interval) = if quality < 3 {
        let reps = match policy {
            ReviewPolicy::Canonical => 0,
            ReviewPolicy::Lenient => card.repetitions / 2,
        };
        (reps, 1)
    } else {
        let interval = match card.repetitions {
            0 => 1,
            1 => 6,
            _ => ((card.interval as f64 * easiness).round() as u32).max(1),
        };
        (card.repetitions + 1, interval)
    };

    let next = MasteryCard {
        pattern_id: card.pattern_id,
        easiness,
        interval,
        repetitions,
        success_count: card.success_count + u32::from(correct),
        fail_count: card.fail_count + u32::from(!correct),
        last_reviewed_at: now,
        next_due_at: global_repetition_count + interval as u64,
    };
    debug_assert_eq!(next.attempts(), card.attempts() + 1);
    next
}

pub fn is_card_mastered(card: &MasteryCard) -> bool {
    card.attempts() >= MASTERY_MIN_ATTEMPTS && card.accuracy() >= MASTERY_ACCURACY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::piece::PieceType;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn fresh() -> MasteryCard {
        init_card(PatternId::new(PieceType::T, 3, 0), 0, t0())
    }

    #[test]
    fn test_init_card_defaults() {
        let card = init_card(PatternId::new(PieceType::O, 4, 0), 17, t0());
        assert_eq!(card.easiness, 2.5);
        assert_eq!(card.interval, 1);
        assert_eq!(card.repetitions, 0);
        assert_eq!(card.attempts(), 0);
        assert_eq!(card.accuracy(), 0.0);
        assert_eq!(card.next_due_at, 18);
    }

    #[test]
    fn test_consecutive_successes_follow_sm2_intervals() {
        let mut card = fresh();
        let mut global = 0;
        let mut prev_easiness = card.easiness;

        card = review_card(&card, true, global, t0(), ReviewPolicy::Canonical);
        global += 1;
        assert_eq!(card.repetitions, 1);
        assert_eq!(card.interval, 1);
        assert!(card.easiness >= prev_easiness - 1e-9);
        prev_easiness = card.easiness;

        card = review_card(&card, true, global, t0(), ReviewPolicy::Canonical);
        global += 1;
        assert_eq!(card.repetitions, 2);
        assert_eq!(card.interval, 6);
        assert!(card.easiness >= prev_easiness - 1e-9);

        card = review_card(&card, true, global, t0(), ReviewPolicy::Canonical);
        assert_eq!(card.repetitions, 3);
        assert_eq!(card.interval, (6.0 * card.easiness).round() as u32);
        assert_eq!(card.next_due_at, global + card.interval as u64);
        assert_eq!(card.success_count, 3);
    }

    #[test]
    fn test_quality_four_keeps_easiness() {
        let card = review_card(&fresh(), true, 0, t0(), ReviewPolicy::Canonical);
        assert!((card.easiness - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_failure_resets_streak_and_penalizes_easiness() {
        let mut card = fresh();
        for g in 0..3 {
            card = review_card(&card, true, g, t0(), ReviewPolicy::Canonical);
        }
        assert_eq!(card.repetitions, 3);
        let before = card.clone();

        let failed = review_card(&card, false, 3, t0(), ReviewPolicy::Canonical);
        assert_eq!(failed.repetitions, 0);
        assert_eq!(failed.interval, 1);
        assert!((failed.easiness - (before.easiness - 0.8).max(MIN_EASINESS)).abs() < 1e-9);
        assert_eq!(failed.fail_count, 1);
        assert_eq!(failed.next_due_at, 4);
        // previous snapshot is untouched
        assert_eq!(card, before);
    }

    #[test]
    fn test_easiness_floor() {
        let mut card = fresh();
        for g in 0..10 {
            card = review_card(&card, false, g, t0(), ReviewPolicy::Canonical);
            assert!(card.easiness >= MIN_EASINESS);
        }
        assert!((card.easiness - MIN_EASINESS).abs() < 1e-9);
    }

    #[test]
    fn test_lenient_policy_halves_penalty_and_streak() {
        let mut card = fresh();
        for g in 0..4 {
            card = review_card(&card, true, g, t0(), ReviewPolicy::Lenient);
        }
        assert_eq!(card.repetitions, 4);
        let failed = review_card(&card, false, 4, t0(), ReviewPolicy::Lenient);
        assert_eq!(failed.repetitions, 2);
        assert_eq!(failed.interval, 1);
        assert!((failed.easiness - (card.easiness - 0.4)).abs() < 1e-9);
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut card = fresh();
        let outcomes = [true, false, true, true, false, false, true];
        let mut last_total = 0;
        for (g, &ok) in outcomes.iter().enumerate() {
            card = review_card(&card, ok, g as u64, t0(), ReviewPolicy::Canonical);
            assert_eq!(card.attempts(), last_total + 1);
            last_total = card.attempts();
        }
        assert_eq!(card.success_count, 4);
        assert_eq!(card.fail_count, 3);
    }

    #[test]
    fn test_mastery_requires_minimum_attempts() {
        let mut card = fresh();
        for g in 0..4 {
            card = review_card(&card, true, g, t0(), ReviewPolicy::Canonical);
            assert!(!is_card_mastered(&card), "mastered after {} attempts", g + 1);
        }
        card = review_card(&card, true, 4, t0(), ReviewPolicy::Canonical);
        assert!(is_card_mastered(&card));
    }

    #[test]
    fn test_mastery_requires_accuracy() {
        let mut card = fresh();
        for g in 0..9 {
            card = review_card(&card, true, g, t0(), ReviewPolicy::Canonical);
        }
        card = review_card(&card, false, 9, t0(), ReviewPolicy::Canonical);
        // 9/10 = 0.9 is enough
        assert!(is_card_mastered(&card));
        card = review_card(&card, false, 10, t0(), ReviewPolicy::Canonical);
        assert!(!is_card_mastered(&card));
    }

    #[test]
    fn test_policy_keys() {
        assert_eq!(ReviewPolicy::from_key("Lenient"), Some(ReviewPolicy::Lenient));
        assert_eq!(ReviewPolicy::from_key("nope"), None);
        assert_eq!(ReviewPolicy::default().as_str(), "canonical");
    }
}
