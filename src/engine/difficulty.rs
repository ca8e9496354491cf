use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::engine::scheduler::SchedulingBias;

pub const WINDOW_SIZE: usize = 20;

const FLOW_MIN_ACCURACY: f64 = 0.8;
const FLOW_MIN_CONSISTENCY: f64 = 0.6;
const FLOW_MAX_RESPONSE_MS: f64 = 1000.0;
const FLOW_MIN_STREAK: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyTier {
    Casual,
    Standard,
    Hardcore,
    Insane,
}

impl DifficultyTier {
    pub fn all() -> &'static [DifficultyTier] {
        &[
            DifficultyTier::Casual,
            DifficultyTier::Standard,
            DifficultyTier::Hardcore,
            DifficultyTier::Insane,
        ]
    }

    pub fn to_key(self) -> &'static str {
        match self {
            DifficultyTier::Casual => "casual",
            DifficultyTier::Standard => "standard",
            DifficultyTier::Hardcore => "hardcore",
            DifficultyTier::Insane => "insane",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "casual" => Some(DifficultyTier::Casual),
            "standard" => Some(DifficultyTier::Standard),
            "hardcore" => Some(DifficultyTier::Hardcore),
            "insane" => Some(DifficultyTier::Insane),
            _ => None,
        }
    }

    pub fn from_difficulty(score: u32) -> Self {
        if score >= 80 {
            DifficultyTier::Insane
        } else if score >= 60 {
            DifficultyTier::Hardcore
        } else if score >= 35 {
            DifficultyTier::Standard
        } else {
            DifficultyTier::Casual
        }
    }

    pub fn settings(self) -> &'static TierSettings {
        match self {
            DifficultyTier::Casual => &CASUAL,
            DifficultyTier::Standard => &STANDARD,
            DifficultyTier::Hardcore => &HARDCORE,
            DifficultyTier::Insane => &INSANE,
        }
    }
}

/// Per-tier targets. The accuracy and time thresholds are informational;
/// the bias values feed pattern selection.
#[derive(Debug, PartialEq)]
pub struct TierSettings {
    pub name: &'static str,
    pub target_accuracy: f64,
    pub target_response_ms: f64,
    pub weak_pattern_bias: f64,
    pub new_pattern_rate: f64,
}

static CASUAL: TierSettings = TierSettings {
    name: "Casual",
    target_accuracy: 0.6,
    target_response_ms: 3000.0,
    weak_pattern_bias: 0.3,
    new_pattern_rate: 0.5,
};

static STANDARD: TierSettings = TierSettings {
    name: "Standard",
    target_accuracy: 0.75,
    target_response_ms: 2000.0,
    weak_pattern_bias: 0.5,
    new_pattern_rate: 0.3,
};

static HARDCORE: TierSettings = TierSettings {
    name: "Hardcore",
    target_accuracy: 0.85,
    target_response_ms: 1200.0,
    weak_pattern_bias: 0.7,
    new_pattern_rate: 0.2,
};

static INSANE: TierSettings = TierSettings {
    name: "Insane",
    target_accuracy: 0.92,
    target_response_ms: 800.0,
    weak_pattern_bias: 0.85,
    new_pattern_rate: 0.1,
};

/// Rolling performance over the most recent attempts and the difficulty
/// parameters derived from it.
#[derive(Clone, Debug)]
pub struct PerformanceState {
    accuracy_window: VecDeque<bool>,
    response_window: VecDeque<f64>,
    pub current_accuracy: f64,
    pub average_response_time: f64,
    pub consistency_score: f64,
    pub is_in_flow: bool,
    pub flow_streak: u32,
    pub current_difficulty: u32,
    pub difficulty_tier: DifficultyTier,
    pub manual_tier: Option<DifficultyTier>,
    pub adaptive_speed: f64,
    pub weak_pattern_bias: f64,
    pub new_pattern_rate: f64,
}

impl Default for PerformanceState {
    fn default() -> Self {
        let tier = DifficultyTier::Standard;
        Self {
            accuracy_window: VecDeque::with_capacity(WINDOW_SIZE),
            response_window: VecDeque::with_capacity(WINDOW_SIZE),
            current_accuracy: 0.0,
            average_response_time: 0.0,
            consistency_score: 0.5,
            is_in_flow: false,
            flow_streak: 0,
            current_difficulty: 50,
            difficulty_tier: tier,
            manual_tier: None,
            adaptive_speed: 1.0,
            weak_pattern_bias: tier.settings().weak_pattern_bias,
            new_pattern_rate: tier.settings().new_pattern_rate,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

impl PerformanceState {
    pub fn with_manual_tier(tier: Option<DifficultyTier>) -> Self {
        let mut state = Self::default();
        state.set_manual_tier(tier);
        state
    }

    pub fn sample_count(&self) -> usize {
        self.accuracy_window.len()
    }

    pub fn record_attempt(&mut self, correct: bool, response_time_ms: f64) {
        self.accuracy_window.push_back(correct);
        if self.accuracy_window.len() > WINDOW_SIZE {
            self.accuracy_window.pop_front();
        }
        self.response_window.push_back(response_time_ms.max(0.0));
        if self.response_window.len() > WINDOW_SIZE {
            self.response_window.pop_front();
        }

        self.flow_streak = if correct { self.flow_streak + 1 } else { 0 };
        self.recompute();
    }

    fn consistency(&self) -> f64 {
        if self.response_window.len() < 3 {
            return 0.5;
        }
        let avg = mean(self.response_window.iter().copied());
        let variance = mean(self.response_window.iter().map(|t| (t - avg).powi(2)));
        (1.0 - variance.sqrt() / 500.0).clamp(0.0, 1.0)
    }

    fn recompute(&mut self) {
        self.current_accuracy = mean(self.accuracy_window.iter().map(|&c| if c { 1.0 } else { 0.0 }));
        self.average_response_time = mean(self.response_window.iter().copied());
        self.consistency_score = self.consistency();

        self.is_in_flow = self.current_accuracy > FLOW_MIN_ACCURACY
            && self.consistency_score > FLOW_MIN_CONSISTENCY
            && self.average_response_time < FLOW_MAX_RESPONSE_MS
            && self.flow_streak >= FLOW_MIN_STREAK;

        let accuracy_term = 40.0 * self.current_accuracy;
        let speed_term = ((2000.0 - self.average_response_time) / 50.0).clamp(0.0, 30.0);
        let consistency_term = 30.0 * self.consistency_score;
        self.current_difficulty = (accuracy_term + speed_term + consistency_term)
            .round()
            .clamp(0.0, 100.0) as u32;

        self.difficulty_tier = self
            .manual_tier
            .unwrap_or_else(|| DifficultyTier::from_difficulty(self.current_difficulty));
        self.apply_tier_parameters();
    }

    fn apply_tier_parameters(&mut self) {
        let settings = self.difficulty_tier.settings();
        let struggling = self.sample_count() > 0 && self.current_accuracy < 0.5;
        let weak_multiplier = if struggling { 1.3 } else { 1.0 };
        self.weak_pattern_bias = (settings.weak_pattern_bias * weak_multiplier).min(1.0);
        self.new_pattern_rate = settings.new_pattern_rate * if self.is_in_flow { 0.7 } else { 1.0 };
        self.adaptive_speed = if self.is_in_flow {
            1.2
        } else if struggling {
            0.8
        } else {
            1.0
        };
    }

    /// Pin the tier (and its bias parameters) until cleared with `None`.
    pub fn set_manual_tier(&mut self, tier: Option<DifficultyTier>) {
        self.manual_tier = tier;
        self.difficulty_tier = tier.unwrap_or_else(|| {
            if self.sample_count() == 0 {
                DifficultyTier::Standard
            } else {
                DifficultyTier::from_difficulty(self.current_difficulty)
            }
        });
        self.apply_tier_parameters();
    }

    /// Drop all samples; a manual tier survives only if `keep_manual` is set.
    pub fn reset(&mut self, keep_manual: bool) {
        let manual = if keep_manual { self.manual_tier } else { None };
        *self = Self::with_manual_tier(manual);
    }

    pub fn scheduling_bias(&self) -> SchedulingBias {
        SchedulingBias {
            new_pattern_rate: self.new_pattern_rate,
            weak_pattern_bias: self.weak_pattern_bias,
        }
    }
}
