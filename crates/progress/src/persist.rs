//! Persistence of the player state.
//!
//! After every committed change the store hands its state to
//! [`Persistence::save`], which writes a partial snapshot under
//! [`STORAGE_KEY`]. On startup [`Persistence::load`] reads it back so the
//! learner resumes where they left off.
//!
//! The stored value is an envelope `{"state": {...}, "version": 0}`.
//! Persistence never fails a transition: errors are logged and dropped.

use std::sync::Arc;

use courseplay_core::{Course, Position, ProgressState};
use courseplay_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Key the player snapshot is stored under.
pub const STORAGE_KEY: &str = "player-storage";

/// Schema version of the stored envelope.
const SNAPSHOT_VERSION: u32 = 0;

/// The persisted subset of [`ProgressState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedProgress {
    /// Loaded course, when course persistence is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<Course>,

    /// Module cursor
    pub current_module_index: usize,

    /// Lesson cursor
    pub current_lesson_index: usize,
}

impl PersistedProgress {
    /// Cursor stored in the snapshot.
    pub fn position(&self) -> Position {
        Position::new(self.current_module_index, self.current_lesson_index)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    state: PersistedProgress,
    version: u32,
}

/// Persistence settings.
#[derive(Debug, Clone)]
pub struct PersistConfig {
    /// Storage key
    pub key: String,

    /// Whether the course itself is stored alongside the cursor
    pub persist_course: bool,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            key: STORAGE_KEY.to_string(),
            persist_course: true,
        }
    }
}

/// Writes player snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct Persistence {
    storage: Arc<dyn KeyValueStore>,
    config: PersistConfig,
}

impl Persistence {
    /// Persist through `storage` with default settings.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            config: PersistConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: PersistConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Project `state` onto its persisted subset.
    pub fn snapshot(&self, state: &ProgressState) -> PersistedProgress {
        PersistedProgress {
            course: if self.config.persist_course {
                state.course.clone()
            } else {
                None
            },
            current_module_index: state.position.module_index,
            current_lesson_index: state.position.lesson_index,
        }
    }

    /// Write the persisted subset of `state`. Failures are logged only.
    pub fn save(&self, state: &ProgressState) {
        let envelope = Envelope {
            state: self.snapshot(state),
            version: SNAPSHOT_VERSION,
        };
        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to encode player snapshot: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.config.key, &json) {
            error!(key = %self.config.key, "Failed to persist player snapshot: {}", e);
            return;
        }
        debug!(key = %self.config.key, position = %state.position, "persisted player snapshot");
    }

    /// Read the stored snapshot, if a usable one exists.
    pub fn load(&self) -> Option<PersistedProgress> {
        let raw = match self.storage.get(&self.config.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %self.config.key, "Failed to read player snapshot: {}", e);
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %self.config.key, "Ignoring unreadable player snapshot: {}", e);
                return None;
            }
        };

        if envelope.version != SNAPSHOT_VERSION {
            warn!(
                key = %self.config.key,
                "Ignoring player snapshot with unknown version {}",
                envelope.version
            );
            return None;
        }

        let mut progress = envelope.state;
        if !self.config.persist_course {
            progress.course = None;
        }
        Some(progress)
    }

    /// Apply a stored snapshot to a freshly created state.
    ///
    /// A restored course needs no fetch, so it also clears `is_loading`.
    pub fn hydrate(&self, state: &mut ProgressState) -> bool {
        let Some(progress) = self.load() else {
            return false;
        };
        state.position = progress.position();
        if let Some(course) = progress.course {
            state.course = Some(course);
            state.is_loading = false;
        }
        true
    }
}
