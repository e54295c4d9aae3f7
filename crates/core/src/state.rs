//! Player state - the learner's cursor into a course.

use serde::{Deserialize, Serialize};
use crate::course::Course;

/// Cursor addressing `course.modules[module_index].lessons[lesson_index]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Index into the course's modules
    pub module_index: usize,

    /// Index into the module's lessons
    pub lesson_index: usize,
}

impl Position {
    /// Create a position.
    pub const fn new(module_index: usize, lesson_index: usize) -> Self {
        Self {
            module_index,
            lesson_index,
        }
    }

    /// The first lesson of the first module.
    pub const fn start() -> Self {
        Self::new(0, 0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.module_index, self.lesson_index)
    }
}

/// Everything the player store owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    /// Loaded course, if any
    pub course: Option<Course>,

    /// Current cursor
    pub position: Position,

    /// Whether a course still has to be (or is being) fetched
    pub is_loading: bool,
}

impl ProgressState {
    /// Whether a course is present.
    pub fn is_loaded(&self) -> bool {
        self.course.is_some()
    }
}

impl Default for ProgressState {
    /// State at application start: nothing loaded, a fetch is required.
    fn default() -> Self {
        Self {
            course: None,
            position: Position::start(),
            is_loading: true,
        }
    }
}
