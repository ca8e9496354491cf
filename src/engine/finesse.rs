use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::pattern::{ParseError, PatternId};
use crate::engine::piece::PieceType;
use crate::engine::random::RandomSource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FinesseMove {
    Left,
    Right,
    DasLeft,
    DasRight,
    RotateCW,
    RotateCCW,
    HardDrop,
    SoftDrop,
}

impl FinesseMove {
    pub fn all() -> &'static [FinesseMove] {
        &[
            FinesseMove::Left,
            FinesseMove::Right,
            FinesseMove::DasLeft,
            FinesseMove::DasRight,
            FinesseMove::RotateCW,
            FinesseMove::RotateCCW,
            FinesseMove::HardDrop,
            FinesseMove::SoftDrop,
        ]
    }

    pub fn notation(self) -> &'static str {
        match self {
            FinesseMove::Left => "L",
            FinesseMove::Right => "R",
            FinesseMove::DasLeft => "DL",
            FinesseMove::DasRight => "DR",
            FinesseMove::RotateCW => "CW",
            FinesseMove::RotateCCW => "CCW",
            FinesseMove::HardDrop => "HD",
            FinesseMove::SoftDrop => "SD",
        }
    }

    pub fn is_drop(self) -> bool {
        matches!(self, FinesseMove::HardDrop | FinesseMove::SoftDrop)
    }
}

impl fmt::Display for FinesseMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.notation())
    }
}

impl FromStr for FinesseMove {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "left" => Ok(FinesseMove::Left),
            "r" | "right" => Ok(FinesseMove::Right),
            "dl" | "das_left" | "dasleft" => Ok(FinesseMove::DasLeft),
            "dr" | "das_right" | "dasright" => Ok(FinesseMove::DasRight),
            "cw" | "rotate_cw" | "rotatecw" => Ok(FinesseMove::RotateCW),
            "ccw" | "rotate_ccw" | "rotateccw" => Ok(FinesseMove::RotateCCW),
            "hd" | "hard_drop" | "harddrop" => Ok(FinesseMove::HardDrop),
            "sd" | "soft_drop" | "softdrop" => Ok(FinesseMove::SoftDrop),
            _ => Err(ParseError::UnknownMove(s.to_string())),
        }
    }
}

pub type MoveSequence = Vec<FinesseMove>;
pub type MoveSequenceSet = Vec<MoveSequence>;

/// Parse a whitespace- or comma-separated move list such as `"DL R CW HD"`.
pub fn parse_moves(s: &str) -> Result<MoveSequence, ParseError> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|tok| !tok.is_empty())
        .map(str::parse)
        .collect()
}

pub fn format_moves(moves: &[FinesseMove]) -> String {
    moves
        .iter()
        .map(|m| m.notation())
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Static Definitions ---

type StaticSequenceSet = &'static [&'static [FinesseMove]];
type Layer = &'static [StaticSequenceSet];

pub struct PieceFinesse {
    pub piece: PieceType,
    /// Orientation layers, each an ordered list of target columns indexed by
    /// the leftmost column the piece occupies.
    pub layers: &'static [Layer],
}

const L: FinesseMove = FinesseMove::Left;
const R: FinesseMove = FinesseMove::Right;
const DL: FinesseMove = FinesseMove::DasLeft;
const DR: FinesseMove = FinesseMove::DasRight;
const CW: FinesseMove = FinesseMove::RotateCW;
const CCW: FinesseMove = FinesseMove::RotateCCW;
const HD: FinesseMove = FinesseMove::HardDrop;

// Guideline 10-wide playfield with SRS spawn positions: I on columns 3-6,
// O on 4-5, three-wide pieces on 3-5.

const O_FLAT: Layer = &[
    &[&[DL, HD]],
    &[&[DL, R, HD]],
    &[&[L, L, HD]],
    &[&[L, HD]],
    &[&[HD]],
    &[&[R, HD]],
    &[&[R, R, HD]],
    &[&[DR, L, HD]],
    &[&[DR, HD]],
];

const I_FLAT: Layer = &[
    &[&[DL, HD]],
    &[&[DL, R, HD], &[L, L, HD]],
    &[&[L, HD]],
    &[&[HD]],
    &[&[R, HD]],
    &[&[DR, L, HD], &[R, R, HD]],
    &[&[DR, HD]],
];

const I_VERTICAL: Layer = &[
    &[&[CCW, DL, HD], &[CW, DL, HD]],
    &[&[DL, CCW, HD]],
    &[&[DL, CW, HD]],
    &[&[L, CCW, HD]],
    &[&[CCW, HD]],
    &[&[CW, HD]],
    &[&[R, CW, HD]],
    &[&[DR, CCW, HD]],
    &[&[DR, CW, HD]],
    &[&[CW, DR, HD], &[CCW, DR, HD]],
];

const THREE_WIDE_FLAT: Layer = &[
    &[&[DL, HD]],
    &[&[DL, R, HD], &[L, L, HD]],
    &[&[L, HD]],
    &[&[HD]],
    &[&[R, HD]],
    &[&[R, R, HD]],
    &[&[DR, L, HD]],
    &[&[DR, HD]],
];

const THREE_WIDE_FLIPPED: Layer = &[
    &[&[DL, CW, CW, HD], &[DL, CCW, CCW, HD]],
    &[
        &[DL, R, CW, CW, HD],
        &[DL, R, CCW, CCW, HD],
        &[L, L, CW, CW, HD],
        &[L, L, CCW, CCW, HD],
    ],
    &[&[L, CW, CW, HD], &[L, CCW, CCW, HD]],
    &[&[CW, CW, HD], &[CCW, CCW, HD]],
    &[&[R, CW, CW, HD], &[R, CCW, CCW, HD]],
    &[&[R, R, CW, CW, HD], &[R, R, CCW, CCW, HD]],
    &[&[DR, L, CW, CW, HD], &[DR, L, CCW, CCW, HD]],
    &[&[DR, CW, CW, HD], &[DR, CCW, CCW, HD]],
];

const THREE_WIDE_CW: Layer = &[
    &[&[CW, DL, HD]],
    &[&[DL, CW, HD]],
    &[&[CW, L, L, HD], &[DL, CW, R, HD]],
    &[&[CW, L, HD]],
    &[&[CW, HD]],
    &[&[CW, R, HD]],
    &[&[CW, R, R, HD]],
    &[&[DR, L, CW, HD], &[CW, DR, L, HD]],
    &[&[DR, CW, HD]],
];

const THREE_WIDE_CCW: Layer = &[
    &[&[DL, CCW, HD]],
    &[&[DL, R, CCW, HD], &[CCW, L, L, HD]],
    &[&[CCW, L, HD]],
    &[&[CCW, HD]],
    &[&[CCW, R, HD]],
    &[&[CCW, R, R, HD]],
    &[&[DR, L, CCW, HD]],
    &[&[DR, CCW, HD]],
    &[&[CCW, DR, HD]],
];

// S and Z reach their vertical orientation with either rotation direction.
const SKEW_VERTICAL: Layer = &[
    &[&[DL, CCW, HD], &[CW, DL, HD]],
    &[&[DL, CW, HD]],
    &[&[CCW, L, HD]],
    &[&[CCW, HD]],
    &[&[CW, HD]],
    &[&[CW, R, HD]],
    &[&[DR, L, CCW, HD], &[CW, R, R, HD]],
    &[&[DR, CCW, HD]],
    &[&[DR, CW, HD], &[CW, DR, HD]],
];

static I_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::I,
    layers: &[I_FLAT, I_VERTICAL],
};
static O_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::O,
    layers: &[O_FLAT],
};
static T_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::T,
    layers: &[THREE_WIDE_FLAT, THREE_WIDE_CW, THREE_WIDE_FLIPPED, THREE_WIDE_CCW],
};
static S_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::S,
    layers: &[THREE_WIDE_FLAT, SKEW_VERTICAL],
};
static Z_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::Z,
    layers: &[THREE_WIDE_FLAT, SKEW_VERTICAL],
};
static J_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::J,
    layers: &[THREE_WIDE_FLAT, THREE_WIDE_CW, THREE_WIDE_FLIPPED, THREE_WIDE_CCW],
};
static L_FINESSE: PieceFinesse = PieceFinesse {
    piece: PieceType::L,
    layers: &[THREE_WIDE_FLAT, THREE_WIDE_CW, THREE_WIDE_FLIPPED, THREE_WIDE_CCW],
};

pub fn piece_finesse(piece: PieceType) -> &'static PieceFinesse {
    match piece {
        PieceType::I => &I_FINESSE,
        PieceType::O => &O_FINESSE,
        PieceType::T => &T_FINESSE,
        PieceType::S => &S_FINESSE,
        PieceType::Z => &Z_FINESSE,
        PieceType::J => &J_FINESSE,
        PieceType::L => &L_FINESSE,
    }
}

/// Number of target columns in an orientation layer, 0 if the layer does not exist.
pub fn column_count(piece: PieceType, layer: usize) -> usize {
    piece_finesse(piece)
        .layers
        .get(layer)
        .map(|columns| columns.len())
        .unwrap_or(0)
}

/// Borrowed view of the optimal sequences; empty when out of range.
pub fn optimal_moves_static(piece: PieceType, column: usize, layer: usize) -> StaticSequenceSet {
    piece_finesse(piece)
        .layers
        .get(layer)
        .and_then(|columns| columns.get(column))
        .copied()
        .unwrap_or(&[])
}

pub fn get_optimal_moves(piece: PieceType, column: usize, layer: usize) -> MoveSequenceSet {
    optimal_moves_static(piece, column, layer)
        .iter()
        .map(|seq| seq.to_vec())
        .collect()
}

// --- Targets ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinesseTarget {
    pub piece: PieceType,
    pub column: u8,
    pub rotation: u8,
    pub sequences: MoveSequenceSet,
}

impl FinesseTarget {
    pub fn pattern_id(&self) -> PatternId {
        PatternId::new(self.piece, self.column, self.rotation)
    }

    /// Whether a landing position satisfies this target. Rotations that map
    /// to the same orientation layer are interchangeable.
    pub fn accepts_landing(&self, piece: PieceType, column: u8, rotation: u8) -> bool {
        piece == self.piece
            && column == self.column
            && self.piece.rotations_equivalent(rotation, self.rotation)
    }
}

/// Non-adaptive target: uniform layer, then uniform column within it.
pub fn generate_target(piece: PieceType, rng: &mut impl RandomSource) -> FinesseTarget {
    let layers = piece_finesse(piece).layers;
    let layer = rng.next_index(layers.len());
    let column = rng.next_index(layers[layer].len());
    FinesseTarget {
        piece,
        column: column as u8,
        rotation: layer as u8,
        sequences: get_optimal_moves(piece, column, layer),
    }
}

/// Every practice target for the given pieces in table order. The layer
/// index is embedded as the rotation, so `resolve_target` recovers it exactly.
pub fn all_pattern_ids(pieces: &[PieceType]) -> Vec<PatternId> {
    let mut ids = Vec::new();
    for &piece in pieces {
        for (layer, columns) in piece_finesse(piece).layers.iter().enumerate() {
            for column in 0..columns.len() {
                ids.push(PatternId::new(piece, column as u8, layer as u8));
            }
        }
    }
    ids
}

pub fn resolve_target(id: &PatternId) -> Option<FinesseTarget> {
    let sequences = get_optimal_moves(id.piece, id.column as usize, id.layer());
    if sequences.is_empty() {
        return None;
    }
    Some(FinesseTarget {
        piece: id.piece,
        column: id.column,
        rotation: id.rotation,
        sequences,
    })
}
