pub mod comparator;
pub mod difficulty;
pub mod finesse;
pub mod mastery;
pub mod pattern;
pub mod piece;
pub mod random;
pub mod scheduler;
pub mod stats;

pub use finesse::{FinesseMove, FinesseTarget, MoveSequence, MoveSequenceSet};
pub use pattern::{ParseError, PatternId};
pub use piece::PieceType;
