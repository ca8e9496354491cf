pub mod clock;
pub mod drill;
pub mod input;
pub mod progress;
pub mod result;

pub use clock::{Clock, FixedClock, SystemClock};
pub use progress::{LearningProgress, SessionRecord};
