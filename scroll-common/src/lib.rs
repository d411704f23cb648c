//! # ScrollUniversity Common Library
//!
//! Shared code for ScrollUniversity services:
//! - Loading registry: in-flight operation tracking with subscribers
//! - Scoped loading helpers for async work
//! - Loading update broadcast and SSE streaming
//! - Configuration loading and logging setup

pub mod config;
pub mod error;
pub mod loading;
pub mod logging;
pub mod sse;

pub use error::{Error, Result};
pub use loading::{LoadingRegistry, OperationState};
