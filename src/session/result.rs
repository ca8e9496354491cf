use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::finesse::MoveSequence;
use crate::engine::pattern::PatternId;
use crate::engine::piece::PieceType;
use crate::session::drill::DrillState;
use crate::session::input::{DropEvent, judge_drop};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub pattern_id: PatternId,
    pub piece: PieceType,
    pub column: u8,
    pub rotation: u8,
    pub moves: MoveSequence,
    pub correct: bool,
    pub faults: u32,
    pub response_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

impl AttemptResult {
    pub fn from_drop(drill: &DrillState, event: &DropEvent, now: DateTime<Utc>) -> Self {
        let target = &drill.target;
        let response_time_ms = event
            .response_time_ms
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .unwrap_or_else(|| drill.elapsed_ms(now));

        Self {
            pattern_id: target.pattern_id(),
            piece: target.piece,
            column: target.column,
            rotation: target.rotation,
            moves: event.moves.clone(),
            correct: judge_drop(drill, event),
            faults: drill.faults,
            response_time_ms,
            timestamp: now,
        }
    }
}
