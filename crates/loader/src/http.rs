//! HTTP course source backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use courseplay_core::{Course, CourseId};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};

use crate::source::{CourseSource, LoaderError, Result};

/// Course API used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Configuration for [`HttpCourseSource`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Base URL of the course API, without the `/courses` suffix
    pub base_url: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl LoaderConfig {
    /// Use a different API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a different request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fetches courses with `GET {base_url}/courses/{id}`.
#[derive(Clone)]
pub struct HttpCourseSource {
    /// HTTP client
    client: Client,

    /// Course API URL
    base_url: String,
}

impl HttpCourseSource {
    /// Create a source from configuration.
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL a course is fetched from.
    pub fn course_url(&self, id: CourseId) -> String {
        format!("{}/courses/{}", self.base_url, id)
    }
}

impl Default for HttpCourseSource {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

#[async_trait]
impl CourseSource for HttpCourseSource {
    async fn fetch_course(&self, id: CourseId) -> Result<Course> {
        let url = self.course_url(id);
        debug!(%url, "fetching course");

        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "course API rejected request");
            return Err(LoaderError::Status(status));
        }

        let body = response.bytes().await?;
        let course: Course = serde_json::from_slice(&body)?;

        debug!(course = %course.id, modules = course.modules.len(), "course fetched");
        Ok(course)
    }
}
