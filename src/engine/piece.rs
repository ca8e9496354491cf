use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PieceType {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceType {
    pub fn all() -> &'static [PieceType] {
        &[
            PieceType::I,
            PieceType::O,
            PieceType::T,
            PieceType::S,
            PieceType::Z,
            PieceType::J,
            PieceType::L,
        ]
    }

    pub fn as_char(self) -> char {
        match self {
            PieceType::I => 'I',
            PieceType::O => 'O',
            PieceType::T => 'T',
            PieceType::S => 'S',
            PieceType::Z => 'Z',
            PieceType::J => 'J',
            PieceType::L => 'L',
        }
    }

    /// Number of visually distinct orientations: 1 for O, 2 for I/S/Z, 4 otherwise.
    pub fn orientation_count(self) -> usize {
        match self {
            PieceType::O => 1,
            PieceType::I | PieceType::S | PieceType::Z => 2,
            PieceType::T | PieceType::J | PieceType::L => 4,
        }
    }

    /// Map a rotation state (0 spawn, 1 CW, 2 flipped, 3 CCW) to the
    /// orientation layer of the finesse table.
    pub fn layer_for_rotation(self, rotation: u8) -> usize {
        match self.orientation_count() {
            1 => 0,
            2 => (rotation % 2) as usize,
            _ => (rotation % 4) as usize,
        }
    }

    pub fn rotations_equivalent(self, a: u8, b: u8) -> bool {
        self.layer_for_rotation(a) == self.layer_for_rotation(b)
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for PieceType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" => Ok(PieceType::I),
            "O" => Ok(PieceType::O),
            "T" => Ok(PieceType::T),
            "S" => Ok(PieceType::S),
            "Z" => Ok(PieceType::Z),
            "J" => Ok(PieceType::J),
            "L" => Ok(PieceType::L),
            _ => Err(ParseError::UnknownPiece(s.to_string())),
        }
    }
}
