//! Player diagnostics.

use crate::state::Position;

/// Reasons a player transition left the state unchanged or suspect.
///
/// None of these are fatal; the store logs them and stays consistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// An operation needed a course but none is loaded
    #[error("no course loaded")]
    NotLoaded,

    /// `next` was called on the final lesson
    #[error("course complete")]
    CourseComplete,

    /// A position does not address a lesson of the loaded course
    #[error("position {0} is outside the loaded course")]
    OutOfRange(Position),
}
