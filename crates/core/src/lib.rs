//! Courseplay core data models.
//!
//! This crate defines the course structure (course, modules, lessons),
//! the learner's playback cursor, and the pure selectors a presentation
//! layer reads from the player state.

#![warn(missing_docs)]

// Identities
mod id;

// Course content
mod course;

// Playback state
mod state;
mod error;
pub mod selectors;

// Re-exports
pub use id::*;

pub use course::{Course, Lesson, Module, VIDEO_BASE_URL};
pub use state::{Position, ProgressState};
pub use error::PlayerError;
pub use selectors::{LessonEntry, ModuleOutline};
