//! Course source abstraction.

use async_trait::async_trait;
use courseplay_core::{Course, CourseId};

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Ways fetching a course can fail.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LoaderError {
    /// The request never produced a response
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("course API returned status {0}")]
    Status(reqwest::StatusCode),

    /// The body was not a course
    #[error("invalid course payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other source-specific failure
    #[error("{0}")]
    Other(String),
}

impl LoaderError {
    /// Whether the failure happened in transport rather than decoding.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status(_))
    }
}

/// Something that can produce a course by id.
#[async_trait]
pub trait CourseSource: Send + Sync {
    /// Fetch the course identified by `id`.
    async fn fetch_course(&self, id: CourseId) -> Result<Course>;
}

#[async_trait]
impl<S: CourseSource + ?Sized> CourseSource for std::sync::Arc<S> {
    async fn fetch_course(&self, id: CourseId) -> Result<Course> {
        (**self).fetch_course(id).await
    }
}
