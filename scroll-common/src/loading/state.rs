//! Operation state and snapshot types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

/// State of one in-flight operation
///
/// An entry only exists while its operation is loading, so `is_loading`
/// is always `true` for states read from the registry. Absence means
/// "not loading".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    /// Always true while present in the registry
    pub is_loading: bool,

    /// Human-readable status text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Progress percentage (0-100), only set once the operation reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// Label distinguishing sub-operations sharing a key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl OperationState {
    /// Fresh state as created by `start`
    pub fn started(message: Option<String>, operation: Option<String>) -> Self {
        Self {
            is_loading: true,
            message,
            progress: None,
            operation,
        }
    }
}

/// Immutable view of the whole registry after one mutation
///
/// Cloning shares the underlying map. Every listener in a notification
/// round receives the same instance.
#[derive(Debug, Clone, Default)]
pub struct LoadingSnapshot {
    version: u64,
    states: Arc<BTreeMap<String, OperationState>>,
}

impl LoadingSnapshot {
    pub(crate) fn new(version: u64, states: BTreeMap<String, OperationState>) -> Self {
        Self {
            version,
            states: Arc::new(states),
        }
    }

    /// Mutation counter; increases by one for every notifying registry call
    ///
    /// Consumers receiving snapshots on several threads can drop any
    /// snapshot older than the newest one they have seen.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// State for `key`, if loading
    pub fn get(&self, key: &str) -> Option<&OperationState> {
        self.states.get(key)
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.states.contains_key(key)
    }

    pub fn is_any_loading(&self) -> bool {
        !self.states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Loading keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationState)> {
        self.states.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Borrow the sorted key → state map
    pub fn states(&self) -> &BTreeMap<String, OperationState> {
        &self.states
    }

    /// Owned copy of the map, detached from the snapshot
    pub fn to_map(&self) -> HashMap<String, OperationState> {
        self.states
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// True if both values share the same underlying map
    pub fn ptr_eq(&self, other: &LoadingSnapshot) -> bool {
        Arc::ptr_eq(&self.states, &other.states)
    }
}
