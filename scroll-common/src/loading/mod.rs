//! In-flight operation tracking
//!
//! [`LoadingRegistry`] records which operations are running, with optional
//! message, progress and sub-operation label, and notifies subscribers on
//! every change. The scoped helpers ([`LoadingRegistry::with_loading`],
//! [`LoadingRegistry::with_progress`]) bracket async work so a key never
//! stays loading after its work completes, fails, panics or is dropped.

pub mod events;
pub mod keys;
mod registry;
mod scoped;
mod state;

pub use events::{LoadingEventBridge, LoadingUpdate};
pub use keys::KeyCategory;
pub use registry::{LoadingRegistry, Subscription};
pub use scoped::{LoadingGuard, ProgressReporter};
pub use state::{LoadingSnapshot, OperationState};
