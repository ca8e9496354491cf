use chrono::{DateTime, Utc};

use crate::engine::comparator::{compare_moves, is_valid_move_prefix};
use crate::engine::finesse::{FinesseMove, MoveSequence};
use crate::engine::piece::PieceType;
use crate::session::drill::DrillState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    Accepted,
    /// Inputs left every optimal path; the piece respawns.
    Fault,
}

/// Where the piece landed and how it got there, as reported by the board.
#[derive(Clone, Debug, PartialEq)]
pub struct DropEvent {
    pub piece: PieceType,
    pub landing_column: u8,
    pub landing_rotation: u8,
    pub moves: MoveSequence,
    /// Falls back to the drill's spawn-to-drop time when absent.
    pub response_time_ms: Option<f64>,
}

pub fn process_move(drill: &mut DrillState, mv: FinesseMove, now: DateTime<Utc>) -> MoveOutcome {
    drill.moves.push(mv);

    if drill.retry_on_fault && !is_valid_move_prefix(&drill.moves, &drill.target.sequences) {
        drill.faults += 1;
        drill.respawn(now);
        return MoveOutcome::Fault;
    }
    MoveOutcome::Accepted
}

/// Judge a finished drop against the drill target.
pub fn judge_drop(drill: &DrillState, event: &DropEvent) -> bool {
    let landed = drill
        .target
        .accepts_landing(event.piece, event.landing_column, event.landing_rotation);
    landed && !drill.has_faulted() && compare_moves(&event.moves, &drill.target.sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::finesse::FinesseMove::*;
    use crate::engine::finesse::resolve_target;
    use crate::engine::pattern::PatternId;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn t_left_wall(retry: bool) -> DrillState {
        let target = resolve_target(&PatternId::new(PieceType::T, 0, 0)).unwrap();
        DrillState::new(target, now(), retry)
    }

    fn drop_event(moves: Vec<FinesseMove>) -> DropEvent {
        DropEvent {
            piece: PieceType::T,
            landing_column: 0,
            landing_rotation: 0,
            moves,
            response_time_ms: Some(900.0),
        }
    }

    #[test]
    fn test_valid_moves_accepted() {
        let mut drill = t_left_wall(true);
        assert_eq!(process_move(&mut drill, DasLeft, now()), MoveOutcome::Accepted);
        assert_eq!(process_move(&mut drill, HardDrop, now()), MoveOutcome::Accepted);
        assert_eq!(drill.moves, vec![DasLeft, HardDrop]);
        assert_eq!(drill.faults, 0);
    }

    #[test]
    fn test_wrong_direction_faults_and_respawns() {
        let mut drill = t_left_wall(true);
        assert_eq!(process_move(&mut drill, Right, now()), MoveOutcome::Fault);
        assert!(drill.moves.is_empty());
        assert_eq!(drill.faults, 1);
    }

    #[test]
    fn test_without_retry_moves_accumulate() {
        let mut drill = t_left_wall(false);
        assert_eq!(process_move(&mut drill, Right, now()), MoveOutcome::Accepted);
        assert_eq!(drill.moves, vec![Right]);
        assert_eq!(drill.faults, 0);
    }

    #[test]
    fn test_judge_optimal_drop() {
        let drill = t_left_wall(false);
        assert!(judge_drop(&drill, &drop_event(vec![DasLeft, HardDrop])));
    }

    #[test]
    fn test_judge_wrong_landing() {
        let drill = t_left_wall(false);
        let mut event = drop_event(vec![DasLeft, HardDrop]);
        event.landing_column = 1;
        assert!(!judge_drop(&drill, &event));
    }

    #[test]
    fn test_judge_inefficient_moves() {
        let drill = t_left_wall(false);
        let event = drop_event(vec![Left, Left, Left, Left, HardDrop]);
        assert!(!judge_drop(&drill, &event));
    }

    #[test]
    fn test_fault_spoils_drill() {
        let mut drill = t_left_wall(true);
        process_move(&mut drill, Right, now());
        process_move(&mut drill, DasLeft, now());
        process_move(&mut drill, HardDrop, now());
        assert!(!judge_drop(&drill, &drop_event(drill.moves.clone())));
    }
}
