//! Progress tracking.
//!
//! [`PlayerStore`] owns the learner's course and cursor, exposes the
//! `play` / `next` / `load` / `reset_progress` transitions, notifies
//! subscribers after every change and persists a snapshot through a
//! [`Persistence`] decorator.

#![warn(missing_docs)]

pub mod persist;
pub mod store;
mod subscribe;

pub use persist::{Persistence, PersistConfig, PersistedProgress, STORAGE_KEY};
pub use store::{Advance, LoadOutcome, PlayBounds, PlayerStore, PlayerStoreBuilder, StoreConfig};
pub use subscribe::{Listener, Subscription};
