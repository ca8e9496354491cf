use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::engine::mastery::MasteryCard;
use crate::engine::pattern::PatternId;
use crate::session::progress::{CurrentSession, LearningProgress, SessionRecord};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub schema_version: u32,
    #[serde(default)]
    pub cards: BTreeMap<PatternId, MasteryCard>,
    #[serde(default)]
    pub session_history: Vec<SessionRecord>,
    #[serde(default)]
    pub global_repetition_count: u64,
    #[serde(default)]
    pub last_mastered_review_at: u64,
}

impl Default for ProgressData {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cards: BTreeMap::new(),
            session_history: Vec::new(),
            global_repetition_count: 0,
            last_mastered_review_at: 0,
        }
    }
}

impl ProgressData {
    /// Check if loaded data has a stale schema version and needs reset.
    pub fn needs_reset(&self) -> bool {
        self.schema_version != SCHEMA_VERSION
    }

    pub fn from_progress(progress: &LearningProgress) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            cards: progress.cards.clone(),
            session_history: progress.session_history.clone(),
            global_repetition_count: progress.global_repetition_count,
            last_mastered_review_at: progress.last_mastered_review_at,
        }
    }

    /// Rebuild live progress. The running session always starts fresh.
    pub fn into_progress(self, now: DateTime<Utc>) -> LearningProgress {
        LearningProgress {
            cards: self.cards,
            session_history: self.session_history,
            global_repetition_count: self.global_repetition_count,
            last_mastered_review_at: self.last_mastered_review_at,
            current_session: CurrentSession::new(now),
        }
    }
}

pub const EXPORT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportData {
    pub finessr_export_version: u32,
    pub exported_at: DateTime<Utc>,
    pub config: Config,
    pub progress: ProgressData,
}
