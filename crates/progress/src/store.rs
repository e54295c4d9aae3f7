//! The player store - single owner of the learner's progress.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use courseplay_core::{
    selectors, Course, CourseId, Lesson, Module, ModuleOutline, PlayerError, Position,
    ProgressState,
};
use courseplay_loader::{CourseSource, LoaderError};
use tracing::{debug, error, info, warn};

use crate::persist::Persistence;
use crate::subscribe::{self, Listener, SharedRegistry, Subscription};

/// How `play` treats positions outside the loaded course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayBounds {
    /// Accept any position; selectors resolve it to nothing
    #[default]
    Permissive,
    /// Reject positions that do not address a lesson
    Strict,
}

/// Store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Bounds policy for `play`
    pub play_bounds: PlayBounds,
}

/// How `next` moved the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the following lesson of the same module
    Lesson(Position),
    /// Moved to the first lesson of the following module
    Module(Position),
}

impl Advance {
    /// The new cursor.
    pub fn position(&self) -> Position {
        match self {
            Self::Lesson(p) | Self::Module(p) => *p,
        }
    }
}

/// Result of a `load` call. Failures are reported here, never raised.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The course was fetched and installed
    Loaded,
    /// The fetch failed; the previous course is kept
    Failed(LoaderError),
    /// A later `load` or `reset_progress` made this response stale; it was
    /// discarded
    Superseded,
}

impl LoadOutcome {
    /// Whether the fetched course was installed.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

struct Inner {
    state: ProgressState,
    /// Bumped by every `load` and `reset_progress`; responses from an older
    /// generation are stale.
    generation: u64,
    /// Bumped by every commit; orders snapshots for publishing.
    seq: u64,
}

/// Sequence numbers of the newest snapshot persisted and notified.
#[derive(Default)]
struct Published {
    persisted: Mutex<u64>,
    notified: Mutex<u64>,
}

struct Shared {
    inner: Mutex<Inner>,
    published: Published,
    listeners: SharedRegistry,
    source: Arc<dyn CourseSource>,
    persistence: Option<Persistence>,
    config: StoreConfig,
}

/// Builder for [`PlayerStore`].
pub struct PlayerStoreBuilder {
    source: Arc<dyn CourseSource>,
    persistence: Option<Persistence>,
    config: StoreConfig,
}

impl PlayerStoreBuilder {
    /// Persist through `persistence`, restoring its snapshot on build.
    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the store, seeding it from persisted state if available.
    pub fn build(self) -> PlayerStore {
        let mut state = ProgressState::default();
        if let Some(persistence) = &self.persistence {
            if persistence.hydrate(&mut state) {
                info!(
                    position = %state.position,
                    course = state.course.is_some(),
                    "Restored player progress"
                );
            }
        }

        PlayerStore {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { state, generation: 0, seq: 0 }),
                published: Published::default(),
                listeners: SharedRegistry::default(),
                source: self.source,
                persistence: self.persistence,
                config: self.config,
            }),
        }
    }
}

/// Owner of the course, cursor and loading flag.
///
/// Cloning yields another handle to the same store, so a pending
/// [`PlayerStore::load`] can run alongside `play`/`next`/`reset_progress`.
/// Every committed change is persisted (when configured) and then pushed
/// to subscribers, synchronously and in registration order.
///
/// Commits racing on different threads publish without holding the state
/// lock. A snapshot older than one already persisted or notified is
/// skipped, so storage always ends on the newest state and no listener
/// sees the state move backwards.
#[derive(Clone)]
pub struct PlayerStore {
    shared: Arc<Shared>,
}

impl PlayerStore {
    /// Start building a store that fetches courses from `source`.
    pub fn builder(source: impl CourseSource + 'static) -> PlayerStoreBuilder {
        PlayerStoreBuilder {
            source: Arc::new(source),
            persistence: None,
            config: StoreConfig::default(),
        }
    }

    /// In-memory store with default configuration.
    pub fn new(source: impl CourseSource + 'static) -> Self {
        Self::builder(source).build()
    }

    // === Reads ===

    /// Snapshot of the current state.
    pub fn state(&self) -> ProgressState {
        self.lock().state.clone()
    }

    /// Run `f` against the current state without cloning it.
    ///
    /// The state lock is held while `f` runs: `f` must not call back into
    /// this store (or any clone of it), or it deadlocks.
    pub fn with_state<R>(&self, f: impl FnOnce(&ProgressState) -> R) -> R {
        f(&self.lock().state)
    }

    /// Current cursor.
    pub fn position(&self) -> Position {
        self.lock().state.position
    }

    /// Whether a course still has to be, or is being, fetched.
    pub fn is_loading(&self) -> bool {
        self.lock().state.is_loading
    }

    /// The loaded course.
    pub fn course(&self) -> Option<Course> {
        self.lock().state.course.clone()
    }

    /// Module under the cursor.
    pub fn current_module(&self) -> Option<Module> {
        self.with_state(|s| selectors::current_module(s).cloned())
    }

    /// Lesson under the cursor.
    pub fn current_lesson(&self) -> Option<Lesson> {
        self.with_state(|s| selectors::current_lesson(s).cloned())
    }

    /// Navigator outline of the loaded course.
    pub fn outline(&self) -> Vec<ModuleOutline> {
        self.with_state(selectors::outline)
    }

    /// Heading for the player.
    pub fn title(&self) -> String {
        self.with_state(|s| selectors::header_title(s).to_string())
    }

    /// Whether the cursor is on the final lesson.
    pub fn is_complete(&self) -> bool {
        self.with_state(selectors::is_complete)
    }

    // === Subscriptions ===

    /// Register `listener` to be called after every committed change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ProgressState) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        subscribe::subscribe(&self.shared.listeners, listener)
    }

    // === Transitions ===

    /// Jump to `(module_index, lesson_index)`.
    ///
    /// Needs a loaded course. Under [`PlayBounds::Permissive`] any position
    /// is accepted; out-of-range ones are only logged.
    pub fn play(&self, module_index: usize, lesson_index: usize) -> Result<Position, PlayerError> {
        let target = Position::new(module_index, lesson_index);
        let bounds = self.shared.config.play_bounds;

        let result = self.try_commit(|inner| {
            let Some(course) = &inner.state.course else {
                return Err(PlayerError::NotLoaded);
            };
            if !course.contains(target) {
                match bounds {
                    PlayBounds::Strict => return Err(PlayerError::OutOfRange(target)),
                    PlayBounds::Permissive => {
                        warn!(position = %target, "Playing a position outside the loaded course")
                    }
                }
            }
            inner.state.position = target;
            Ok(target)
        });

        match &result {
            Ok(position) => debug!(%position, "play"),
            Err(e) => warn!(position = %target, "Ignoring play: {}", e),
        }
        result
    }

    /// Advance to the next lesson, carrying into the next module.
    ///
    /// At the final lesson the cursor stays put and
    /// [`PlayerError::CourseComplete`] is returned.
    pub fn next(&self) -> Result<Advance, PlayerError> {
        let result = self.try_commit(|inner| {
            let course = inner.state.course.as_ref().ok_or(PlayerError::NotLoaded)?;
            let current = inner.state.position;
            let module = course
                .module(current.module_index)
                .ok_or(PlayerError::OutOfRange(current))?;

            // Dangling lesson indices (even `usize::MAX`) carry like the last lesson.
            let advance = if current.lesson_index < module.lessons.len().saturating_sub(1) {
                Advance::Lesson(Position::new(current.module_index, current.lesson_index + 1))
            } else if current.module_index + 1 < course.modules.len() {
                Advance::Module(Position::new(current.module_index + 1, 0))
            } else {
                return Err(PlayerError::CourseComplete);
            };

            inner.state.position = advance.position();
            Ok(advance)
        });

        match &result {
            Ok(advance) => debug!(position = %advance.position(), "next"),
            Err(PlayerError::CourseComplete) => info!("Course complete"),
            Err(e) => warn!("Ignoring next: {}", e),
        }
        result
    }

    /// Fetch course `id` and install it.
    ///
    /// Sets `is_loading` before the request. On success the course is
    /// replaced and the cursor kept, so a restored position survives. On
    /// failure the previous course is kept. Either way `is_loading` ends
    /// up `false`, unless a newer `load` or `reset_progress` happened in
    /// between, in which case the response is dropped untouched.
    pub async fn load(&self, id: CourseId) -> LoadOutcome {
        let generation = self.commit(|inner| {
            inner.generation += 1;
            inner.state.is_loading = true;
            inner.generation
        });
        debug!(course = %id, generation, "Loading course");

        let fetched = self.shared.source.fetch_course(id).await;

        let applied = self.try_commit(|inner| {
            if inner.generation != generation {
                return Err(fetched);
            }
            inner.state.is_loading = false;
            match fetched {
                Ok(course) => {
                    inner.state.course = Some(course);
                    Ok(LoadOutcome::Loaded)
                }
                Err(e) => Ok(LoadOutcome::Failed(e)),
            }
        });

        match applied {
            Ok(LoadOutcome::Loaded) => {
                info!(course = %id, "Course loaded");
                LoadOutcome::Loaded
            }
            Ok(LoadOutcome::Failed(e)) => {
                error!(course = %id, "Failed to load course: {}", e);
                LoadOutcome::Failed(e)
            }
            Ok(LoadOutcome::Superseded) | Err(_) => {
                debug!(course = %id, generation, "Discarding stale course response");
                LoadOutcome::Superseded
            }
        }
    }

    /// Load course `id` unless a course is already present.
    pub async fn ensure_loaded(&self, id: CourseId) -> Option<LoadOutcome> {
        if self.lock().state.course.is_some() {
            return None;
        }
        Some(self.load(id).await)
    }

    /// Forget the course and cursor; a fresh `load` is required afterwards.
    ///
    /// Any `load` still in flight is invalidated.
    pub fn reset_progress(&self) {
        self.commit(|inner| {
            inner.generation += 1;
            inner.state = ProgressState::default();
        });
        info!("Progress reset");
    }

    // === Internals ===

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a change that always commits.
    fn commit<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let (out, seq, snapshot) = {
            let mut inner = self.lock();
            let out = f(&mut inner);
            inner.seq += 1;
            (out, inner.seq, inner.state.clone())
        };
        self.publish(seq, &snapshot);
        out
    }

    /// Apply a change that commits only when `f` returns `Ok`.
    ///
    /// `f` must not mutate the state on its `Err` path.
    fn try_commit<T, E>(&self, f: impl FnOnce(&mut Inner) -> Result<T, E>) -> Result<T, E> {
        let (out, seq, snapshot) = {
            let mut inner = self.lock();
            let out = f(&mut inner)?;
            inner.seq += 1;
            (out, inner.seq, inner.state.clone())
        };
        self.publish(seq, &snapshot);
        Ok(out)
    }

    /// Persist, then notify. Runs with no state lock held.
    ///
    /// Snapshots older than `seq`'s predecessors already published are
    /// dropped. The persist lock is held across the write, which never
    /// re-enters the store; listeners run unlocked and may drive it.
    fn publish(&self, seq: u64, state: &ProgressState) {
        if let Some(persistence) = &self.shared.persistence {
            let mut persisted = self
                .shared
                .published
                .persisted
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if seq > *persisted {
                persistence.save(state);
                *persisted = seq;
            }
        }

        {
            let mut notified = self
                .shared
                .published
                .notified
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if seq <= *notified {
                debug!(seq, "Skipping stale snapshot");
                return;
            }
            *notified = seq;
        }
        subscribe::notify(&self.shared.listeners, state);
    }
}

impl std::fmt::Debug for PlayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("PlayerStore")
            .field("state", &inner.state)
            .field("generation", &inner.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{PersistConfig, STORAGE_KEY};
    use async_trait::async_trait;
    use courseplay_storage::{KeyValueStore, MemoryStorage, StorageError};
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    fn mock_course() -> Course {
        Course::new(
            1,
            vec![
                Module::new(
                    1,
                    "Getting Started with React",
                    vec![
                        Lesson::new("1", "Redux Toolkit", "13:41"),
                        Lesson::new("2", "Styling the Post", "10:05"),
                    ],
                ),
                Module::new(
                    2,
                    "Application Structure",
                    vec![Lesson::new("3", "Comment Component", "13:45")],
                ),
            ],
        )
    }

    fn other_course() -> Course {
        Course::new(
            2,
            vec![Module::new(9, "Other", vec![Lesson::new("z", "Only", "00:30")])],
        )
    }

    /// Always returns the same course.
    struct StaticSource(Course);

    #[async_trait]
    impl CourseSource for StaticSource {
        async fn fetch_course(&self, _id: CourseId) -> courseplay_loader::Result<Course> {
            Ok(self.0.clone())
        }
    }

    /// Always fails like a dropped connection.
    struct FailingSource;

    #[async_trait]
    impl CourseSource for FailingSource {
        async fn fetch_course(&self, _id: CourseId) -> courseplay_loader::Result<Course> {
            Err(LoaderError::Other("Network error".to_string()))
        }
    }

    /// Hands each fetch to the test, which decides when and how it resolves.
    struct GatedSource {
        gates: Mutex<VecDeque<(oneshot::Sender<()>, oneshot::Receiver<courseplay_loader::Result<Course>>)>>,
    }

    struct GateHandle {
        started: oneshot::Receiver<()>,
        respond: oneshot::Sender<courseplay_loader::Result<Course>>,
    }

    impl GatedSource {
        fn new(count: usize) -> (Self, VecDeque<GateHandle>) {
            let mut gates = VecDeque::new();
            let mut handles = VecDeque::new();
            for _ in 0..count {
                let (started_tx, started_rx) = oneshot::channel();
                let (respond_tx, respond_rx) = oneshot::channel();
                gates.push_back((started_tx, respond_rx));
                handles.push_back(GateHandle {
                    started: started_rx,
                    respond: respond_tx,
                });
            }
            (Self { gates: Mutex::new(gates) }, handles)
        }
    }

    #[async_trait]
    impl CourseSource for GatedSource {
        async fn fetch_course(&self, _id: CourseId) -> courseplay_loader::Result<Course> {
            let gate = self.gates.lock().unwrap().pop_front();
            let Some((started, response)) = gate else {
                return Err(LoaderError::Other("no gate left".to_string()));
            };
            let _ = started.send(());
            response
                .await
                .unwrap_or_else(|_| Err(LoaderError::Other("gate dropped".to_string())))
        }
    }

    /// Storage whose every operation fails.
    struct BrokenStorage;

    impl KeyValueStore for BrokenStorage {
        fn get(&self, _key: &str) -> courseplay_storage::Result<Option<String>> {
            Err(StorageError::Other("disk on fire".to_string()))
        }
        fn set(&self, _key: &str, _value: &str) -> courseplay_storage::Result<()> {
            Err(StorageError::Other("disk on fire".to_string()))
        }
        fn remove(&self, _key: &str) -> courseplay_storage::Result<()> {
            Err(StorageError::Other("disk on fire".to_string()))
        }
    }

    async fn loaded_store() -> PlayerStore {
        let store = PlayerStore::new(StaticSource(mock_course()));
        assert!(store.load(CourseId(1)).await.is_loaded());
        store
    }

    #[test]
    fn test_initial_state() {
        let store = PlayerStore::new(FailingSource);
        assert_eq!(store.state(), ProgressState::default());
        assert!(store.is_loading());
        assert_eq!(store.position(), Position::new(0, 0));
    }

    #[tokio::test]
    async fn test_load_success() {
        let store = PlayerStore::new(StaticSource(mock_course()));

        let outcome = store.load(CourseId(1)).await;

        assert!(outcome.is_loaded());
        assert_eq!(store.course(), Some(mock_course()));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_absent_course() {
        let store = PlayerStore::new(FailingSource);

        let outcome = store.load(CourseId(99)).await;

        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        assert!(!store.is_loading());
        assert!(store.course().is_none());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_course() {
        let (source, mut gates) = GatedSource::new(2);
        let store = PlayerStore::new(source);

        let first = gates.pop_front().unwrap();
        first.respond.send(Ok(mock_course())).unwrap();
        assert!(store.load(CourseId(1)).await.is_loaded());
        store.play(1, 0).unwrap();

        let second = gates.pop_front().unwrap();
        second
            .respond
            .send(Err(LoaderError::Other("Network error".to_string())))
            .unwrap();
        assert!(matches!(store.load(CourseId(1)).await, LoadOutcome::Failed(_)));

        assert_eq!(store.course(), Some(mock_course()));
        assert_eq!(store.position(), Position::new(1, 0));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_load_keeps_position() {
        let store = loaded_store().await;
        store.play(0, 1).unwrap();

        assert!(store.load(CourseId(1)).await.is_loaded());
        assert_eq!(store.position(), Position::new(0, 1));
    }

    #[tokio::test]
    async fn test_play_sets_position() {
        let store = loaded_store().await;

        assert_eq!(store.play(0, 1), Ok(Position::new(0, 1)));
        assert_eq!(store.position(), Position::new(0, 1));
        assert_eq!(store.current_lesson().unwrap().title, "Styling the Post");
    }

    #[test]
    fn test_play_without_course_is_noop() {
        let store = PlayerStore::new(FailingSource);

        assert_eq!(store.play(0, 1), Err(PlayerError::NotLoaded));
        assert_eq!(store.state(), ProgressState::default());
    }

    #[tokio::test]
    async fn test_play_out_of_range_is_permissive_by_default() {
        let store = loaded_store().await;

        assert_eq!(store.play(5, 7), Ok(Position::new(5, 7)));
        assert_eq!(store.position(), Position::new(5, 7));
        assert!(store.current_module().is_none());
        assert!(store.current_lesson().is_none());
    }

    #[tokio::test]
    async fn test_play_out_of_range_strict() {
        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_config(StoreConfig {
                play_bounds: PlayBounds::Strict,
            })
            .build();
        store.load(CourseId(1)).await;

        assert_eq!(
            store.play(0, 2),
            Err(PlayerError::OutOfRange(Position::new(0, 2)))
        );
        assert_eq!(store.position(), Position::new(0, 0));
        assert_eq!(store.play(1, 0), Ok(Position::new(1, 0)));
    }

    #[tokio::test]
    async fn test_next_within_module() {
        let store = loaded_store().await;

        assert_eq!(store.next(), Ok(Advance::Lesson(Position::new(0, 1))));
        assert_eq!(store.position(), Position::new(0, 1));
    }

    #[tokio::test]
    async fn test_next_carries_into_next_module() {
        let store = loaded_store().await;
        store.play(0, 1).unwrap();

        assert_eq!(store.next(), Ok(Advance::Module(Position::new(1, 0))));
        assert_eq!(store.position(), Position::new(1, 0));
    }

    #[tokio::test]
    async fn test_next_walks_whole_course() {
        let store = loaded_store().await;

        assert_eq!(store.next().map(|a| a.position()), Ok(Position::new(0, 1)));
        assert_eq!(store.next().map(|a| a.position()), Ok(Position::new(1, 0)));
        assert!(store.is_complete());
    }

    #[tokio::test]
    async fn test_next_at_end_is_idempotent() {
        let store = loaded_store().await;
        store.play(1, 0).unwrap();

        for _ in 0..3 {
            assert_eq!(store.next(), Err(PlayerError::CourseComplete));
            assert_eq!(store.position(), Position::new(1, 0));
        }
    }

    #[test]
    fn test_next_without_course_is_noop() {
        let store = PlayerStore::new(FailingSource);

        assert_eq!(store.next(), Err(PlayerError::NotLoaded));
        assert_eq!(store.state(), ProgressState::default());
    }

    #[tokio::test]
    async fn test_next_from_dangling_module_is_noop() {
        let store = loaded_store().await;
        store.play(4, 0).unwrap();

        assert_eq!(
            store.next(),
            Err(PlayerError::OutOfRange(Position::new(4, 0)))
        );
        assert_eq!(store.position(), Position::new(4, 0));
    }

    #[tokio::test]
    async fn test_next_from_dangling_lesson_carries() {
        let store = loaded_store().await;
        store.play(0, 9).unwrap();

        assert_eq!(store.next(), Ok(Advance::Module(Position::new(1, 0))));
    }

    #[tokio::test]
    async fn test_next_from_max_lesson_index_carries() {
        let store = loaded_store().await;
        assert_eq!(store.play(0, usize::MAX), Ok(Position::new(0, usize::MAX)));

        assert_eq!(store.next(), Ok(Advance::Module(Position::new(1, 0))));

        store.play(1, usize::MAX).unwrap();
        assert_eq!(store.next(), Err(PlayerError::CourseComplete));
        assert_eq!(store.position(), Position::new(1, usize::MAX));
    }

    #[tokio::test]
    async fn test_reset_progress() {
        let store = loaded_store().await;
        store.play(1, 0).unwrap();

        store.reset_progress();

        let state = store.state();
        assert!(state.course.is_none());
        assert_eq!(state.position, Position::new(0, 0));
        assert!(state.is_loading);
    }

    #[test]
    fn test_reset_progress_from_initial_state() {
        let store = PlayerStore::new(FailingSource);
        store.reset_progress();
        assert_eq!(store.state(), ProgressState::default());
    }

    #[tokio::test]
    async fn test_ensure_loaded_only_fetches_once() {
        let store = PlayerStore::new(StaticSource(mock_course()));

        assert!(store.ensure_loaded(CourseId::default()).await.unwrap().is_loaded());
        assert!(store.ensure_loaded(CourseId::default()).await.is_none());
    }

    #[tokio::test]
    async fn test_listeners_in_registration_order() {
        let store = PlayerStore::new(StaticSource(mock_course()));
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let log = log.clone();
            store.subscribe(move |s| log.lock().unwrap().push(("first", s.position)))
        };
        let _second = {
            let log = log.clone();
            store.subscribe(move |s| log.lock().unwrap().push(("second", s.position)))
        };

        store.load(CourseId(1)).await;
        // Loading start + loaded = 2 commits, 2 listeners each
        assert_eq!(log.lock().unwrap().len(), 4);

        log.lock().unwrap().clear();
        store.next().unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", Position::new(0, 1)), ("second", Position::new(0, 1))]
        );

        assert!(first.unsubscribe());
        log.lock().unwrap().clear();
        store.next().unwrap();
        assert_eq!(*log.lock().unwrap(), vec![("second", Position::new(1, 0))]);
    }

    #[tokio::test]
    async fn test_noop_transitions_do_not_notify() {
        let store = loaded_store().await;
        store.play(1, 0).unwrap();

        let calls = Arc::new(Mutex::new(0));
        let _sub = {
            let calls = calls.clone();
            store.subscribe(move |_| *calls.lock().unwrap() += 1)
        };

        let _ = store.next();
        assert_eq!(*calls.lock().unwrap(), 0);

        store.play(0, 0).unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_not_loaded_transitions_do_not_notify_or_persist() {
        let storage = Arc::new(MemoryStorage::new());
        let store = PlayerStore::builder(FailingSource)
            .with_persistence(Persistence::new(storage.clone()))
            .build();

        let calls = Arc::new(Mutex::new(0));
        let _sub = {
            let calls = calls.clone();
            store.subscribe(move |_| *calls.lock().unwrap() += 1)
        };

        assert_eq!(store.play(0, 1), Err(PlayerError::NotLoaded));
        assert_eq!(store.next(), Err(PlayerError::NotLoaded));

        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_not_published() {
        let storage = Arc::new(MemoryStorage::new());
        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(Persistence::new(storage.clone()))
            .build();
        store.load(CourseId(1)).await;
        store.play(1, 0).unwrap();

        let calls = Arc::new(Mutex::new(0));
        let _sub = {
            let calls = calls.clone();
            store.subscribe(move |_| *calls.lock().unwrap() += 1)
        };

        // A commit that lost the race to publish arrives with an older seq.
        let mut older = store.state();
        older.position = Position::new(0, 0);
        store.publish(1, &older);

        assert_eq!(*calls.lock().unwrap(), 0);
        let raw = storage.get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"currentModuleIndex\":1"));

        let restored = PlayerStore::builder(FailingSource)
            .with_persistence(Persistence::new(storage))
            .build();
        assert_eq!(restored.position(), Position::new(1, 0));
    }

    #[tokio::test]
    async fn test_listener_can_read_store() {
        let store = loaded_store().await;
        let seen = Arc::new(Mutex::new(None));

        let _sub = {
            let seen = seen.clone();
            let handle = store.clone();
            store.subscribe(move |_| *seen.lock().unwrap() = Some(handle.title()))
        };

        store.play(1, 0).unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("Comment Component"));
    }

    #[tokio::test]
    async fn test_persists_every_mutation_and_restores() {
        let storage = Arc::new(MemoryStorage::new());

        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(Persistence::new(storage.clone()))
            .build();
        store.load(CourseId(1)).await;
        store.next().unwrap();
        store.next().unwrap();

        let raw = storage.get(STORAGE_KEY).unwrap().unwrap();
        assert!(raw.contains("\"currentModuleIndex\":1"));

        let restored = PlayerStore::builder(FailingSource)
            .with_persistence(Persistence::new(storage.clone()))
            .build();
        assert_eq!(restored.position(), Position::new(1, 0));
        assert_eq!(restored.course(), Some(mock_course()));
        assert!(!restored.is_loading());
        assert!(restored.ensure_loaded(CourseId(1)).await.is_none());
    }

    #[tokio::test]
    async fn test_restored_cursor_survives_load() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = Persistence::new(storage.clone()).with_config(PersistConfig {
            persist_course: false,
            ..Default::default()
        });

        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(persistence.clone())
            .build();
        store.load(CourseId(1)).await;
        store.play(0, 1).unwrap();

        let restored = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(persistence)
            .build();
        assert!(restored.course().is_none());
        assert!(restored.is_loading());
        assert_eq!(restored.position(), Position::new(0, 1));

        assert!(restored.ensure_loaded(CourseId(1)).await.unwrap().is_loaded());
        assert_eq!(restored.current_lesson().unwrap().title, "Styling the Post");
    }

    #[tokio::test]
    async fn test_reset_is_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(Persistence::new(storage.clone()))
            .build();
        store.load(CourseId(1)).await;
        store.play(1, 0).unwrap();
        store.reset_progress();

        let restored = PlayerStore::builder(FailingSource)
            .with_persistence(Persistence::new(storage))
            .build();
        assert_eq!(restored.state(), ProgressState::default());
    }

    #[tokio::test]
    async fn test_broken_storage_does_not_fail_transitions() {
        let store = PlayerStore::builder(StaticSource(mock_course()))
            .with_persistence(Persistence::new(Arc::new(BrokenStorage)))
            .build();

        assert!(store.load(CourseId(1)).await.is_loaded());
        assert!(store.next().is_ok());
        store.reset_progress();
        assert!(store.is_loading());
    }

    #[tokio::test]
    async fn test_play_and_next_run_during_pending_load() {
        let (source, mut gates) = GatedSource::new(2);
        let store = PlayerStore::new(source);

        let first = gates.pop_front().unwrap();
        first.respond.send(Ok(mock_course())).unwrap();
        store.load(CourseId(1)).await;

        let second = gates.pop_front().unwrap();
        let (outcome, ()) = tokio::join!(store.load(CourseId(1)), async {
            second.started.await.unwrap();
            assert!(store.is_loading());
            store.play(0, 1).unwrap();
            store.next().unwrap();
            assert_eq!(store.position(), Position::new(1, 0));
            second.respond.send(Ok(mock_course())).unwrap();
        });

        assert!(outcome.is_loaded());
        assert_eq!(store.position(), Position::new(1, 0));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_reset_invalidates_pending_load() {
        let (source, mut gates) = GatedSource::new(1);
        let store = PlayerStore::new(source);
        let gate = gates.pop_front().unwrap();

        let (outcome, ()) = tokio::join!(store.load(CourseId(1)), async {
            gate.started.await.unwrap();
            store.reset_progress();
            gate.respond.send(Ok(mock_course())).unwrap();
        });

        assert!(matches!(outcome, LoadOutcome::Superseded));
        assert!(store.course().is_none());
        assert!(store.is_loading());
    }

    #[tokio::test]
    async fn test_newer_load_wins_over_stale_response() {
        let (source, mut gates) = GatedSource::new(2);
        let store = PlayerStore::new(source);
        let older = gates.pop_front().unwrap();
        let newer = gates.pop_front().unwrap();

        let (stale, fresh) = tokio::join!(store.load(CourseId(1)), async {
            older.started.await.unwrap();
            let (fresh, ()) = tokio::join!(store.load(CourseId(2)), async {
                newer.started.await.unwrap();
                newer.respond.send(Ok(other_course())).unwrap();
            });
            older.respond.send(Ok(mock_course())).unwrap();
            fresh
        });

        assert!(fresh.is_loaded());
        assert!(matches!(stale, LoadOutcome::Superseded));
        assert_eq!(store.course(), Some(other_course()));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_store_handles_are_shared() {
        let store = loaded_store().await;
        let handle = store.clone();

        handle.next().unwrap();
        assert_eq!(store.position(), Position::new(0, 1));
    }

    // Scenario A: two nexts from the start walk into the second module.
    #[tokio::test]
    async fn test_scenario_walk_into_second_module() {
        let store = loaded_store().await;
        store.play(0, 0).unwrap();

        store.next().unwrap();
        assert_eq!(store.position(), Position::new(0, 1));
        store.next().unwrap();
        assert_eq!(store.position(), Position::new(1, 0));
    }

    // Scenario B: next on the final lesson stays put.
    #[tokio::test]
    async fn test_scenario_next_at_final_lesson() {
        let store = loaded_store().await;
        store.play(1, 0).unwrap();

        let _ = store.next();
        assert_eq!(store.position(), Position::new(1, 0));
    }

    // Scenario C: play with nothing loaded.
    #[test]
    fn test_scenario_play_without_course() {
        let store = PlayerStore::new(FailingSource);
        let _ = store.play(0, 1);
        assert_eq!(store.position(), Position::new(0, 0));
    }

    // Scenario D: transport error on first load.
    #[tokio::test]
    async fn test_scenario_load_transport_error() {
        let store = PlayerStore::new(FailingSource);
        store.load(CourseId(1)).await;
        assert!(!store.is_loading());
        assert!(store.course().is_none());
    }
}
