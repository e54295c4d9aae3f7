//! Terminal rendering of the player state.

use std::fmt::Write;

use courseplay_core::{selectors, ModuleOutline, ProgressState};

/// Header block: lesson title, module title, video source.
pub fn header(state: &ProgressState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", selectors::header_title(state));
    if state.is_loading {
        return out;
    }
    if let Some(module) = selectors::current_module(state) {
        let _ = writeln!(out, "  {}", module.title);
    }
    if let Some(lesson) = selectors::current_lesson(state) {
        let _ = writeln!(out, "  {} [{}]", lesson.video_url(), lesson.duration);
    }
    out
}

/// Navigator listing with the current module and lesson marked.
pub fn outline(modules: &[ModuleOutline]) -> String {
    let mut out = String::new();
    for module in modules {
        let marker = if module.is_current { '*' } else { ' ' };
        let count = module.lesson_count();
        let _ = writeln!(
            out,
            "{} {}. {} ({} {})",
            marker,
            module.index + 1,
            module.title,
            count,
            if count == 1 { "lesson" } else { "lessons" }
        );
        for lesson in &module.lessons {
            let marker = if lesson.is_current { '>' } else { ' ' };
            let _ = writeln!(
                out,
                "    {} [{}.{}] {}  {}",
                marker, module.index, lesson.index, lesson.title, lesson.duration
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use courseplay_core::{Course, Lesson, Module, Position};

    fn state(position: Position) -> ProgressState {
        ProgressState {
            course: Some(Course::new(
                1,
                vec![
                    Module::new(1, "Basics", vec![Lesson::new("a1", "Hello", "01:00")]),
                    Module::new(
                        2,
                        "More",
                        vec![Lesson::new("b1", "World", "02:00"), Lesson::new("b2", "Again", "03:00")],
                    ),
                ],
            )),
            position,
            is_loading: false,
        }
    }

    #[test]
    fn test_header_shows_current_lesson() {
        let text = header(&state(Position::new(1, 0)));
        assert!(text.starts_with("World\n"));
        assert!(text.contains("More"));
        assert!(text.contains("https://www.youtube.com/watch?v=b1"));
    }

    #[test]
    fn test_header_while_loading() {
        assert_eq!(header(&ProgressState::default()), "Loading...\n");
    }

    #[test]
    fn test_outline_markers() {
        let text = outline(&selectors::outline(&state(Position::new(1, 1))));
        assert!(text.contains("  1. Basics (1 lesson)"));
        assert!(text.contains("* 2. More (2 lessons)"));
        assert!(text.contains("> [1.1] Again"));
        assert!(!text.contains("> [1.0]"));
    }
}
