//! Course model - modules and lessons in playback order.

use serde::{Deserialize, Serialize};
use crate::id::{CourseId, LessonId, ModuleId};
use crate::state::Position;

/// Base URL lessons are streamed from; the lesson id is the video key.
pub const VIDEO_BASE_URL: &str = "https://www.youtube.com/watch?v=";

/// A single playable video unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique within its module
    pub id: LessonId,

    /// Display title
    pub title: String,

    /// Human readable duration, e.g. `13:41`
    pub duration: String,
}

impl Lesson {
    /// Create a lesson.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            id: LessonId::new(id),
            title: title.into(),
            duration: duration.into(),
        }
    }

    /// URL of the video backing this lesson.
    pub fn video_url(&self) -> String {
        format!("{}{}", VIDEO_BASE_URL, self.id)
    }
}

/// A named group of lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Unique within the course
    pub id: ModuleId,

    /// Display title
    pub title: String,

    /// Lessons in playback order
    pub lessons: Vec<Lesson>,
}

impl Module {
    /// Create a module.
    pub fn new(id: u64, title: impl Into<String>, lessons: Vec<Lesson>) -> Self {
        Self {
            id: ModuleId(id),
            title: title.into(),
            lessons,
        }
    }
}

/// Top-level learning unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Course identifier
    pub id: CourseId,

    /// Modules in playback order
    pub modules: Vec<Module>,
}

impl Course {
    /// Create a course.
    pub fn new(id: u64, modules: Vec<Module>) -> Self {
        Self {
            id: CourseId(id),
            modules,
        }
    }

    /// Module at `index`, if any.
    pub fn module(&self, index: usize) -> Option<&Module> {
        self.modules.get(index)
    }

    /// Lesson addressed by `position`, if it exists.
    pub fn lesson(&self, position: Position) -> Option<&Lesson> {
        self.module(position.module_index)?
            .lessons
            .get(position.lesson_index)
    }

    /// Whether `position` addresses a real lesson.
    pub fn contains(&self, position: Position) -> bool {
        self.lesson(position).is_some()
    }

    /// Total number of lessons across all modules.
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Position of the final lesson of the final module.
    ///
    /// Empty trailing modules are not skipped: if the last module has no
    /// lessons, the course has no reachable last position.
    pub fn last_position(&self) -> Option<Position> {
        let module_index = self.modules.len().checked_sub(1)?;
        let lesson_index = self.modules[module_index].lessons.len().checked_sub(1)?;
        Some(Position::new(module_index, lesson_index))
    }
}
