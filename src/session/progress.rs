use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::mastery::{MasteryCard, ReviewPolicy, init_card, is_card_mastered, review_card};
use crate::engine::pattern::PatternId;

pub const DEFAULT_SESSION_HISTORY_CAP: usize = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub timestamp: DateTime<Utc>,
    pub total_attempts: u32,
    pub correct_attempts: u32,
    pub accuracy: f64,
    pub distinct_patterns_reviewed: usize,
    pub new_patterns_mastered: u32,
}

/// The running session. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentSession {
    pub started_at: DateTime<Utc>,
    pub attempts: u32,
    pub correct: u32,
    pub distinct_patterns: BTreeSet<PatternId>,
    pub newly_mastered_count: u32,
}

impl CurrentSession {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            attempts: 0,
            correct: 0,
            distinct_patterns: BTreeSet::new(),
            newly_mastered_count: 0,
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.correct as f64 / self.attempts as f64
    }
}

/// Card, mastery before and after, for one recorded result.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordOutcome {
    pub card: MasteryCard,
    pub was_mastered: bool,
    pub now_mastered: bool,
}

impl RecordOutcome {
    pub fn newly_mastered(&self) -> bool {
        !self.was_mastered && self.now_mastered
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LearningProgress {
    pub cards: BTreeMap<PatternId, MasteryCard>,
    /// Most recent first.
    pub session_history: Vec<SessionRecord>,
    pub global_repetition_count: u64,
    pub last_mastered_review_at: u64,
    pub current_session: CurrentSession,
}

impl LearningProgress {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            cards: BTreeMap::new(),
            session_history: Vec::new(),
            global_repetition_count: 0,
            last_mastered_review_at: 0,
            current_session: CurrentSession::new(now),
        }
    }

    pub fn card(&self, id: &PatternId) -> Option<&MasteryCard> {
        self.cards.get(id)
    }

    pub fn record_result(
        &mut self,
        id: PatternId,
        correct: bool,
        now: DateTime<Utc>,
        policy: ReviewPolicy,
    ) -> RecordOutcome {
        let global = self.global_repetition_count;
        let previous = self
            .cards
            .get(&id)
            .cloned()
            .unwrap_or_else(|| init_card(id, global, now));

        let was_mastered = is_card_mastered(&previous);
        let card = review_card(&previous, correct, global, now, policy);
        let now_mastered = is_card_mastered(&card);

        if was_mastered {
            self.last_mastered_review_at = global;
        }
        self.global_repetition_count += 1;
        self.cards.insert(id, card.clone());

        let session = &mut self.current_session;
        session.attempts += 1;
        session.correct += u32::from(correct);
        session.distinct_patterns.insert(id);
        if !was_mastered && now_mastered {
            session.newly_mastered_count += 1;
        }

        RecordOutcome {
            card,
            was_mastered,
            now_mastered,
        }
    }

    /// Close the running session. Empty sessions are not recorded.
    pub fn end_session(&mut self, now: DateTime<Utc>, history_cap: usize) -> Option<SessionRecord> {
        if self.current_session.attempts == 0 {
            return None;
        }
        let session = &self.current_session;
        let record = SessionRecord {
            timestamp: now,
            total_attempts: session.attempts,
            correct_attempts: session.correct,
            accuracy: session.accuracy(),
            distinct_patterns_reviewed: session.distinct_patterns.len(),
            new_patterns_mastered: session.newly_mastered_count,
        };

        self.session_history.insert(0, record.clone());
        self.session_history.truncate(history_cap.max(1));
        self.current_session = CurrentSession::new(now);
        Some(record)
    }

    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    pub fn lifetime_attempts(&self) -> u64 {
        self.cards.values().map(|c| c.attempts() as u64).sum()
    }
}
