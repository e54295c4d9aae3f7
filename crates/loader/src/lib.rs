//! Course loading.
//!
//! Fetches a course by id from the course API and decodes it. The player
//! store depends only on the [`CourseSource`] trait so tests and offline
//! front ends can plug in their own source.

#![warn(missing_docs)]

pub mod source;
pub mod http;

pub use source::{CourseSource, LoaderError, Result};
pub use http::{HttpCourseSource, LoaderConfig, DEFAULT_BASE_URL};
