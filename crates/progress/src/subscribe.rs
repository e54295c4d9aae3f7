//! Change listeners.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use courseplay_core::ProgressState;

/// Callback invoked with the committed state after every change.
pub type Listener = Arc<dyn Fn(&ProgressState) + Send + Sync>;

/// Registered listeners, kept in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl Registry {
    fn insert(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }
}

/// Shared listener registry.
pub(crate) type SharedRegistry = Arc<Mutex<Registry>>;

pub(crate) fn subscribe(registry: &SharedRegistry, listener: Listener) -> Subscription {
    let id = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(listener);
    Subscription {
        id,
        registry: Arc::downgrade(registry),
    }
}

/// Call every listener with `state`.
///
/// The registry lock is released before the callbacks run, so listeners
/// may subscribe, unsubscribe or drive the store themselves.
pub(crate) fn notify(registry: &SharedRegistry, state: &ProgressState) {
    let listeners: Vec<Listener> = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .iter()
        .map(|(_, l)| l.clone())
        .collect();

    for listener in listeners {
        listener(state);
    }
}

/// Handle returned by `PlayerStore::subscribe`.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[must_use = "dropping a Subscription keeps the listener registered forever"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop receiving updates. Returns `false` if already removed or the
    /// store is gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
