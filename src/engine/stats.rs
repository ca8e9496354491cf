use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::finesse::piece_finesse;
use crate::engine::mastery::{MasteryCard, is_card_mastered};
use crate::engine::pattern::PatternId;
use crate::engine::piece::PieceType;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MasteryStats {
    pub total_patterns: usize,
    pub mastered_count: usize,
    pub in_progress_count: usize,
    pub not_started_count: usize,
    pub overall_accuracy: f64,
}

impl MasteryStats {
    pub fn mastered_fraction(&self) -> f64 {
        if self.total_patterns == 0 {
            return 0.0;
        }
        self.mastered_count as f64 / self.total_patterns as f64
    }
}

pub fn calculate_mastery_stats(
    cards: &BTreeMap<PatternId, MasteryCard>,
    total_pattern_count: usize,
) -> MasteryStats {
    let started: Vec<&MasteryCard> = cards.values().filter(|c| c.attempts() > 0).collect();
    let mastered_count = started.iter().filter(|c| is_card_mastered(c)).count();
    let successes: u64 = started.iter().map(|c| c.success_count as u64).sum();
    let attempts: u64 = started.iter().map(|c| c.attempts() as u64).sum();

    MasteryStats {
        total_patterns: total_pattern_count,
        mastered_count,
        in_progress_count: started.len() - mastered_count,
        not_started_count: total_pattern_count.saturating_sub(started.len()),
        overall_accuracy: if attempts == 0 {
            0.0
        } else {
            successes as f64 / attempts as f64
        },
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternStats {
    pub accuracy: f64,
    pub attempts: u32,
    pub mastered: bool,
}

pub fn pattern_stats(card: &MasteryCard) -> PatternStats {
    PatternStats {
        accuracy: card.accuracy(),
        attempts: card.attempts(),
        mastered: is_card_mastered(card),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridCell {
    /// -1.0 when the pattern has never been attempted.
    pub accuracy: f64,
    pub attempts: u32,
    pub mastered: bool,
}

impl GridCell {
    pub const UNATTEMPTED: GridCell = GridCell {
        accuracy: -1.0,
        attempts: 0,
        mastered: false,
    };

    pub fn is_attempted(&self) -> bool {
        self.attempts > 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PieceGrid {
    pub piece: PieceType,
    /// Orientation layers, each indexed by column.
    pub orientations: Vec<Vec<GridCell>>,
}

/// Mastery of every table cell, nested piece → orientation → column.
pub fn mastery_grid(cards: &BTreeMap<PatternId, MasteryCard>, pieces: &[PieceType]) -> Vec<PieceGrid> {
    pieces
        .iter()
        .map(|&piece| {
            let orientations = piece_finesse(piece)
                .layers
                .iter()
                .enumerate()
                .map(|(layer, columns)| {
                    (0..columns.len())
                        .map(|column| {
                            let id = PatternId::new(piece, column as u8, layer as u8);
                            match cards.get(&id) {
                                Some(card) if card.attempts() > 0 => GridCell {
                                    accuracy: card.accuracy(),
                                    attempts: card.attempts(),
                                    mastered: is_card_mastered(card),
                                },
                                _ => GridCell::UNATTEMPTED,
                            }
                        })
                        .collect::<Vec<GridCell>>()
                })
                .collect();
            PieceGrid {
                piece,
                orientations,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::finesse::all_pattern_ids;
    use crate::engine::mastery::{ReviewPolicy, init_card, review_card};
    use chrono::Utc;

    fn reviewed(id: PatternId, outcomes: &[bool]) -> MasteryCard {
        let mut card = init_card(id, 0, Utc::now());
        for (g, &ok) in outcomes.iter().enumerate() {
            card = review_card(&card, ok, g as u64, Utc::now(), ReviewPolicy::Canonical);
        }
        card
    }

    #[test]
    fn test_empty_store_stats() {
        let stats = calculate_mastery_stats(&BTreeMap::new(), 162);
        assert_eq!(stats.mastered_count, 0);
        assert_eq!(stats.in_progress_count, 0);
        assert_eq!(stats.not_started_count, 162);
        assert_eq!(stats.overall_accuracy, 0.0);
        assert_eq!(stats.mastered_fraction(), 0.0);
    }

    #[test]
    fn test_counts_and_accuracy() {
        let mut cards = BTreeMap::new();
        let a = PatternId::new(PieceType::T, 0, 0);
        let b = PatternId::new(PieceType::T, 1, 0);
        cards.insert(a, reviewed(a, &[true; 6]));
        cards.insert(b, reviewed(b, &[true, false]));

        let stats = calculate_mastery_stats(&cards, 10);
        assert_eq!(stats.mastered_count, 1);
        assert_eq!(stats.in_progress_count, 1);
        assert_eq!(stats.not_started_count, 8);
        assert!((stats.overall_accuracy - 7.0 / 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_are_pure() {
        let mut cards = BTreeMap::new();
        let a = PatternId::new(PieceType::L, 2, 3);
        cards.insert(a, reviewed(a, &[true, true, false]));
        assert_eq!(
            calculate_mastery_stats(&cards, 34),
            calculate_mastery_stats(&cards, 34)
        );
    }

    #[test]
    fn test_empty_grid_is_unattempted() {
        let grid = mastery_grid(&BTreeMap::new(), PieceType::all());
        assert_eq!(grid.len(), 7);
        let mut cells = 0;
        for piece in &grid {
            assert_eq!(piece.orientations.len(), piece.piece.orientation_count());
            for layer in &piece.orientations {
                for cell in layer {
                    assert_eq!(*cell, GridCell::UNATTEMPTED);
                    cells += 1;
                }
            }
        }
        assert_eq!(cells, all_pattern_ids(PieceType::all()).len());
    }

    #[test]
    fn test_grid_reflects_cards() {
        let mut cards = BTreeMap::new();
        let id = PatternId::new(PieceType::S, 6, 1);
        cards.insert(id, reviewed(id, &[true, false, true, true]));
        let grid = mastery_grid(&cards, &[PieceType::S]);
        let cell = &grid[0].orientations[1][6];
        assert_eq!(cell.attempts, 4);
        assert!((cell.accuracy - 0.75).abs() < 1e-9);
        assert!(!cell.mastered);
        assert!(!grid[0].orientations[0][6].is_attempted());
    }
}
