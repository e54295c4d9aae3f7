//! Read-only projections of [`ProgressState`].
//!
//! Everything here is recomputed on read and tolerates positions that do
//! not address a real lesson: those simply resolve to `None`.

use crate::course::{Lesson, Module};
use crate::id::{LessonId, ModuleId};
use crate::state::ProgressState;

/// Title shown while a course is being fetched.
pub const LOADING_TITLE: &str = "Loading...";

/// Title shown when the cursor does not resolve to a lesson.
pub const UNAVAILABLE_TITLE: &str = "Lesson unavailable";

/// The module the cursor points into.
pub fn current_module(state: &ProgressState) -> Option<&Module> {
    state.course.as_ref()?.module(state.position.module_index)
}

/// The lesson the cursor points at.
pub fn current_lesson(state: &ProgressState) -> Option<&Lesson> {
    state.course.as_ref()?.lesson(state.position)
}

/// Whether the cursor sits on the last lesson of the last module.
pub fn is_complete(state: &ProgressState) -> bool {
    state
        .course
        .as_ref()
        .and_then(|c| c.last_position())
        .is_some_and(|last| last == state.position)
}

/// Heading for the player: a loading marker, the lesson title, or a
/// placeholder when the cursor is dangling.
pub fn header_title(state: &ProgressState) -> &str {
    if state.is_loading {
        return LOADING_TITLE;
    }
    current_lesson(state)
        .map(|l| l.title.as_str())
        .unwrap_or(UNAVAILABLE_TITLE)
}

/// Navigator entry for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutline {
    /// Position of the module in the course
    pub index: usize,

    /// Module id
    pub id: ModuleId,

    /// Module title
    pub title: String,

    /// Whether the cursor is inside this module
    pub is_current: bool,

    /// Lessons in playback order
    pub lessons: Vec<LessonEntry>,
}

impl ModuleOutline {
    /// Number of lessons in the module.
    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

/// Navigator entry for one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonEntry {
    /// Position of the lesson within its module
    pub index: usize,

    /// Lesson id
    pub id: LessonId,

    /// Lesson title
    pub title: String,

    /// Lesson duration
    pub duration: String,

    /// Whether this is the lesson being played
    pub is_current: bool,
}

/// Build the module/lesson navigator. Empty when no course is loaded.
pub fn outline(state: &ProgressState) -> Vec<ModuleOutline> {
    let Some(course) = &state.course else {
        return Vec::new();
    };
    let pos = state.position;

    course
        .modules
        .iter()
        .enumerate()
        .map(|(index, module)| {
            let is_current = index == pos.module_index;
            ModuleOutline {
                index,
                id: module.id,
                title: module.title.clone(),
                is_current,
                lessons: module
                    .lessons
                    .iter()
                    .enumerate()
                    .map(|(lesson_index, lesson)| LessonEntry {
                        index: lesson_index,
                        id: lesson.id.clone(),
                        title: lesson.title.clone(),
                        duration: lesson.duration.clone(),
                        is_current: is_current && lesson_index == pos.lesson_index,
                    })
                    .collect(),
            }
        })
        .collect()
}
