//! Broadcast bridge for loading updates
//!
//! Registry listeners are synchronous callbacks. Async consumers (SSE
//! handlers, background tasks) instead subscribe to a `tokio::broadcast`
//! channel fed by a [`LoadingEventBridge`], receiving one serializable
//! [`LoadingUpdate`] per registry notification.
//!
//! The channel is lossy: with no receivers an update is dropped, and slow
//! receivers observe `RecvError::Lagged` and skip ahead. Each update carries
//! the full state, so skipping never leaves a consumer inconsistent.

use super::registry::{LoadingRegistry, Subscription};
use super::state::{LoadingSnapshot, OperationState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::debug;

/// Serializable form of one registry snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingUpdate {
    /// Snapshot version; newer updates have larger versions
    pub version: u64,
    /// When the update was produced
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// True if any key is loading
    pub any_loading: bool,
    /// Every loading key and its state
    pub states: BTreeMap<String, OperationState>,
}

impl LoadingUpdate {
    pub fn from_snapshot(snapshot: &LoadingSnapshot) -> Self {
        Self {
            version: snapshot.version(),
            timestamp: chrono::Utc::now(),
            any_loading: snapshot.is_any_loading(),
            states: snapshot.states().clone(),
        }
    }
}

/// Forwards every registry notification into a broadcast channel
///
/// The bridge stays attached while the value is alive; dropping it removes
/// its registry listener and closes the channel once receivers drain.
pub struct LoadingEventBridge {
    tx: broadcast::Sender<LoadingUpdate>,
    capacity: usize,
    _subscription: Subscription,
}

impl LoadingEventBridge {
    /// Attach to `registry` with the given channel capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a `tokio::broadcast` requirement).
    pub fn attach(registry: &LoadingRegistry, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let forward = tx.clone();
        let subscription = registry.subscribe(move |snapshot| {
            // No receivers is fine; the next subscriber starts from snapshot()
            let _ = forward.send(LoadingUpdate::from_snapshot(snapshot));
        });
        debug!("Loading event bridge attached (capacity {})", capacity);

        Self {
            tx,
            capacity,
            _subscription: subscription,
        }
    }

    /// Attach using `event_capacity` from the registry's configuration
    ///
    /// A zero capacity (only reachable by building `LoadingConfig` in code)
    /// is raised to 1.
    pub fn attach_with_config(registry: &LoadingRegistry) -> Self {
        Self::attach(registry, registry.config().event_capacity.max(1))
    }

    /// Receive all updates produced after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LoadingUpdate> {
        self.tx.subscribe()
    }

    /// Number of live receivers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
