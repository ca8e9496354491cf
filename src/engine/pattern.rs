use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::piece::PieceType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown piece type: {0:?}")]
    UnknownPiece(String),
    #[error("unknown finesse move: {0:?}")]
    UnknownMove(String),
    #[error("malformed pattern id: {0:?} (expected \"{{piece}}_{{column}}_{{rotation}}\")")]
    MalformedPatternId(String),
}

/// Key of one practice target: a piece placed at a column in a rotation.
/// Canonical text form is `"{piece}_{column}_{rotation}"`, e.g. `"T_3_1"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatternId {
    pub piece: PieceType,
    pub column: u8,
    pub rotation: u8,
}

impl PatternId {
    pub fn new(piece: PieceType, column: u8, rotation: u8) -> Self {
        Self {
            piece,
            column,
            rotation,
        }
    }

    pub fn layer(&self) -> usize {
        self.piece.layer_for_rotation(self.rotation)
    }
}

pub fn create_pattern_id(piece: PieceType, column: u8, rotation: u8) -> String {
    PatternId::new(piece, column, rotation).to_string()
}

pub fn parse_pattern_id(s: &str) -> Result<PatternId, ParseError> {
    s.parse()
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.piece, self.column, self.rotation)
    }
}

impl FromStr for PatternId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseError::MalformedPatternId(s.to_string());
        let mut parts = s.split('_');
        let (Some(piece), Some(column), Some(rotation), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let piece: PieceType = piece.parse()?;
        let column: u8 = column.parse().map_err(|_| malformed())?;
        let rotation: u8 = rotation.parse().map_err(|_| malformed())?;
        if rotation > 3 {
            return Err(malformed());
        }
        Ok(Self::new(piece, column, rotation))
    }
}

impl TryFrom<String> for PatternId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PatternId> for String {
    fn from(id: PatternId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form() {
        assert_eq!(create_pattern_id(PieceType::Z, 1, 0), "Z_1_0");
        assert_eq!(PatternId::new(PieceType::T, 7, 3).to_string(), "T_7_3");
    }

    #[test]
    fn test_round_trip_every_piece_and_rotation() {
        for &piece in PieceType::all() {
            for column in 0..10u8 {
                for rotation in 0..4u8 {
                    let text = create_pattern_id(piece, column, rotation);
                    let parsed = parse_pattern_id(&text).unwrap();
                    assert_eq!(parsed, PatternId::new(piece, column, rotation));
                }
            }
        }
    }

    #[test]
    fn test_rejects_malformed_ids() {
        for bad in ["", "T", "T_1", "T_1_2_3", "X_1_0", "T_a_0", "T_1_9", "T_-1_0"] {
            assert!(parse_pattern_id(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_serializes_as_string_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(PatternId::new(PieceType::J, 2, 1), 5u32);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"J_2_1":5}"#);
        let back: std::collections::BTreeMap<PatternId, u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
