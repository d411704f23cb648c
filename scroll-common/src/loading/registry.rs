//! Loading registry and subscription bus
//!
//! The registry is the single source of truth for "what is currently
//! loading". A key is present if and only if its operation is in flight.
//! There is no reference counting: starting a key that is already loading
//! overwrites its state, and one `stop` clears it.
//!
//! Every mutating call (`start`, `update_progress` on a present key,
//! `stop`, `clear`) notifies all listeners synchronously before returning,
//! with one shared [`LoadingSnapshot`] of the post-mutation state.
//!
//! # Examples
//!
//! ```
//! use scroll_common::loading::{keys, LoadingRegistry};
//!
//! let registry = LoadingRegistry::new();
//!
//! registry.start(keys::courses::ENROLL, Some("Enrolling…"), None);
//! assert!(registry.is_any_loading());
//!
//! registry.update_progress(keys::courses::ENROLL, 50.0, None);
//! let state = registry.get_state(keys::courses::ENROLL).unwrap();
//! assert_eq!(state.progress, Some(50.0));
//!
//! registry.stop(keys::courses::ENROLL);
//! assert!(!registry.is_any_loading());
//! ```

use super::keys;
use super::state::{LoadingSnapshot, OperationState};
use crate::config::LoadingConfig;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, warn};

type Listener = Arc<dyn Fn(&LoadingSnapshot) + Send + Sync>;

struct RegistryState {
    states: BTreeMap<String, OperationState>,
    latest: LoadingSnapshot,
}

impl RegistryState {
    /// Bump the version and rebuild the shared snapshot
    fn publish(&mut self) -> LoadingSnapshot {
        let version = self.latest.version() + 1;
        self.latest = LoadingSnapshot::new(version, self.states.clone());
        self.latest.clone()
    }
}

struct Inner {
    state: Mutex<RegistryState>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    config: LoadingConfig,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        // Listeners never run under this lock, so poisoning can only come
        // from a panic in our own bookkeeping; the map is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_listener(&self, id: u64) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}

/// Process-wide tracker of in-flight asynchronous operations
///
/// Construct one at startup and hand clones to every consumer; clones share
/// the same state and listeners. The registry lives as long as any clone.
///
/// All operations are synchronous, never block on I/O, and never fail.
#[derive(Clone)]
pub struct LoadingRegistry {
    inner: Arc<Inner>,
}

impl LoadingRegistry {
    /// Create an empty registry with default configuration
    pub fn new() -> Self {
        Self::with_config(LoadingConfig::default())
    }

    /// Create an empty registry
    pub fn with_config(config: LoadingConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState {
                    states: BTreeMap::new(),
                    latest: LoadingSnapshot::default(),
                }),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    /// Configuration this registry was built with
    pub fn config(&self) -> &LoadingConfig {
        &self.inner.config
    }

    /// Mark `key` as loading, replacing any existing state for it
    ///
    /// `progress` starts unset. Any string is accepted as a key.
    pub fn start(&self, key: impl Into<String>, message: Option<&str>, operation: Option<&str>) {
        let key = key.into();

        if self.inner.config.warn_on_unknown_keys && !keys::is_documented_key(&key) {
            warn!("Loading started for undocumented operation key '{}'", key);
        }

        let snapshot = {
            let mut state = self.inner.lock_state();
            let replaced = state.states.insert(
                key.clone(),
                OperationState::started(
                    message.map(str::to_string),
                    operation.map(str::to_string),
                ),
            );
            if replaced.is_some() {
                debug!("Loading restarted: {} (previous state overwritten)", key);
            } else {
                debug!("Loading started: {}", key);
            }
            state.publish()
        };

        self.notify(&snapshot);
    }

    /// Record progress for a loading key
    ///
    /// Keeps `is_loading` and `operation`; replaces `message` only when one
    /// is given. If `key` is not loading this does nothing and notifies no
    /// one, so late progress reports cannot resurrect a stopped operation.
    pub fn update_progress(&self, key: &str, progress: f64, message: Option<&str>) {
        let snapshot = {
            let mut state = self.inner.lock_state();
            let Some(entry) = state.states.get_mut(key) else {
                return;
            };
            entry.progress = Some(progress);
            if let Some(message) = message {
                entry.message = Some(message.to_string());
            }
            state.publish()
        };

        self.notify(&snapshot);
    }

    /// Clear `key`
    ///
    /// Always notifies, even when `key` was not loading, so callers may stop
    /// defensively.
    pub fn stop(&self, key: &str) {
        let snapshot = {
            let mut state = self.inner.lock_state();
            if state.states.remove(key).is_some() {
                debug!("Loading stopped: {}", key);
            }
            state.publish()
        };

        self.notify(&snapshot);
    }

    /// Remove every entry, then notify once
    pub fn clear(&self) {
        let snapshot = {
            let mut state = self.inner.lock_state();
            let cleared = state.states.len();
            state.states.clear();
            debug!("Loading registry cleared ({} operations)", cleared);
            state.publish()
        };

        self.notify(&snapshot);
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.inner.lock_state().states.contains_key(key)
    }

    pub fn is_any_loading(&self) -> bool {
        !self.inner.lock_state().states.is_empty()
    }

    /// Number of keys currently loading
    pub fn len(&self) -> usize {
        self.inner.lock_state().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_state().states.is_empty()
    }

    /// Current state for `key`, or `None` when it is not loading
    pub fn get_state(&self, key: &str) -> Option<OperationState> {
        self.inner.lock_state().states.get(key).cloned()
    }

    /// Owned copy of every loading key and its state
    ///
    /// Mutating the returned map has no effect on the registry.
    pub fn get_all_states(&self) -> HashMap<String, OperationState> {
        self.inner
            .lock_state()
            .states
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot delivered by the most recent notification
    pub fn snapshot(&self) -> LoadingSnapshot {
        self.inner.lock_state().latest.clone()
    }

    /// Register a listener for every future change
    ///
    /// The listener is not called with the current state; call
    /// [`LoadingRegistry::snapshot`] for that. Listeners run synchronously on
    /// the thread that mutated the registry, in subscription order. They may
    /// call back into the registry. A panicking listener is logged and
    /// skipped; it does not affect other listeners or the caller.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LoadingSnapshot) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.lock_listeners().push((id, Arc::new(listener)));
        debug!("Loading listener {} subscribed", id);

        Subscription {
            registry: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Number of registered listeners
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_listeners().len()
    }

    fn notify(&self, snapshot: &LoadingSnapshot) {
        // Fixed copy of the listener set: (un)subscribing during delivery
        // only affects the next round.
        let listeners: Vec<(u64, Listener)> = self.inner.lock_listeners().clone();

        for (id, listener) in listeners {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (*listener)(snapshot)));
            if let Err(payload) = outcome {
                error!(
                    "Loading listener {} panicked during notification (version {}): {}",
                    id,
                    snapshot.version(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl Default for LoadingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoadingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("LoadingRegistry")
            .field("loading", &state.states.keys().collect::<Vec<_>>())
            .field("version", &state.latest.version())
            .field("subscribers", &self.inner.lock_listeners().len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle for one registered listener
///
/// Dropping the handle unsubscribes the listener, like dropping a broadcast
/// receiver. Use [`Subscription::detach`] to keep the listener for the
/// lifetime of the registry.
#[must_use = "dropping a Subscription immediately unsubscribes its listener"]
pub struct Subscription {
    registry: Weak<Inner>,
    id: Option<u64>,
}

impl Subscription {
    /// Remove this exact listener
    ///
    /// Deliveries already in progress still reach it; later ones do not.
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    /// Keep the listener registered without holding the handle
    pub fn detach(mut self) {
        self.id = None;
    }

    /// True while the listener is still registered
    pub fn is_active(&self) -> bool {
        match (self.id, self.registry.upgrade()) {
            (Some(id), Some(inner)) => inner
                .lock_listeners()
                .iter()
                .any(|(listener_id, _)| *listener_id == id),
            _ => false,
        }
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(inner) = self.registry.upgrade() {
            if inner.remove_listener(id) {
                debug!("Loading listener {} unsubscribed", id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
