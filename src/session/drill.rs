use chrono::{DateTime, Utc};

use crate::engine::comparator::is_valid_move_prefix;
use crate::engine::finesse::{FinesseTarget, MoveSequence};

/// One piece in flight: the target it must reach and the inputs so far.
#[derive(Clone, Debug)]
pub struct DrillState {
    pub target: FinesseTarget,
    pub moves: MoveSequence,
    pub faults: u32,
    pub spawned_at: DateTime<Utc>,
    pub retry_on_fault: bool,
}

impl DrillState {
    pub fn new(target: FinesseTarget, spawned_at: DateTime<Utc>, retry_on_fault: bool) -> Self {
        Self {
            target,
            moves: Vec::new(),
            faults: 0,
            spawned_at,
            retry_on_fault,
        }
    }

    pub fn is_on_track(&self) -> bool {
        is_valid_move_prefix(&self.moves, &self.target.sequences)
    }

    pub fn has_faulted(&self) -> bool {
        self.faults > 0
    }

    /// Piece respawns: inputs are discarded and the spawn time restarts.
    pub fn respawn(&mut self, now: DateTime<Utc>) {
        self.moves.clear();
        self.spawned_at = now;
    }

    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> f64 {
        (now - self.spawned_at).num_milliseconds().max(0) as f64
    }
}
