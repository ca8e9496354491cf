use crate::engine::finesse::FinesseMove;

fn sorted(moves: &[FinesseMove]) -> Vec<FinesseMove> {
    let mut v = moves.to_vec();
    v.sort_unstable();
    v
}

fn strip_terminal_drops(moves: &[FinesseMove]) -> &[FinesseMove] {
    let end = moves
        .iter()
        .rposition(|m| !m.is_drop())
        .map(|i| i + 1)
        .unwrap_or(0);
    &moves[..end]
}

/// Judge a played input sequence against the optimal alternatives.
///
/// Inputs shorter than the first alternative and any sequence containing a
/// soft drop are accepted unconditionally. Otherwise the played moves must
/// equal one alternative as a multiset; order is not checked.
pub fn compare_moves<S: AsRef<[FinesseMove]>>(played: &[FinesseMove], targets: &[S]) -> bool {
    let Some(first) = targets.first() else {
        return false;
    };
    if played.len() < first.as_ref().len() {
        return true;
    }
    if played.contains(&FinesseMove::SoftDrop) {
        return true;
    }
    let played_sorted = sorted(played);
    targets.iter().any(|t| {
        let t = t.as_ref();
        t.len() == played.len() && sorted(t) == played_sorted
    })
}

/// Whether the moves played so far can still complete an optimal sequence.
/// Used to restart a piece as soon as an input goes wrong.
pub fn is_valid_move_prefix<S: AsRef<[FinesseMove]>>(played: &[FinesseMove], targets: &[S]) -> bool {
    if played.is_empty() || targets.is_empty() {
        return true;
    }
    let played = strip_terminal_drops(played);
    if played.is_empty() {
        return true;
    }
    let played_sorted = sorted(played);
    targets.iter().any(|t| {
        let t = strip_terminal_drops(t.as_ref());
        if played.len() > t.len() {
            return false;
        }
        t.starts_with(played) || sorted(&t[..played.len()]) == played_sorted
    })
}
