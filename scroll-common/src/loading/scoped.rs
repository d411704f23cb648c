//! Scoped operation helpers
//!
//! Brackets around a unit of asynchronous work that guarantee the key is
//! stopped on every exit path: normal completion, an `Err` result, a panic,
//! or the future being dropped before it completes (`tokio::time::timeout`,
//! `select!`, an aborted task).
//!
//! A future that never completes and is never dropped keeps its key loading.
//! [`LoadingRegistry::with_loading_timeout`] is the opt-in escape hatch.

use super::registry::LoadingRegistry;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// RAII bracket: `start` on creation, `stop` exactly once on finish or drop
#[must_use = "dropping a LoadingGuard immediately stops its key"]
#[derive(Debug)]
pub struct LoadingGuard {
    registry: LoadingRegistry,
    key: String,
    armed: bool,
}

impl LoadingGuard {
    /// Key this guard will stop
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Progress reporter bound to this guard's key
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            registry: self.registry.clone(),
            key: self.key.clone(),
        }
    }

    /// Stop the key now instead of at drop
    pub fn finish(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.armed) {
            self.registry.stop(&self.key);
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!("Loading guard for '{}' released without finish", self.key);
        }
        self.release();
    }
}

/// Progress-reporting capability handed to [`LoadingRegistry::with_progress`]
///
/// Reports after the bracket has ended are ignored, because progress updates
/// on a stopped key are no-ops.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    registry: LoadingRegistry,
    key: String,
}

impl ProgressReporter {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Report progress (0-100), keeping the current message
    pub fn report(&self, progress: f64) {
        self.registry.update_progress(&self.key, progress, None);
    }

    /// Report progress and replace the status message
    pub fn report_with_message(&self, progress: f64, message: &str) {
        self.registry
            .update_progress(&self.key, progress, Some(message));
    }
}

impl LoadingRegistry {
    /// Start `key` and return a guard that stops it when finished or dropped
    pub fn guard(&self, key: impl Into<String>, message: Option<&str>) -> LoadingGuard {
        let key = key.into();
        self.start(key.as_str(), message, None);
        LoadingGuard {
            registry: self.clone(),
            key,
            armed: true,
        }
    }

    /// Run `operation` with `key` marked as loading
    ///
    /// `start` runs before `operation` is invoked and `stop` runs exactly
    /// once after it settles. The output, including any `Err`, is returned
    /// unchanged.
    ///
    /// ```
    /// # tokio_test_block(async {
    /// use scroll_common::loading::{keys, LoadingRegistry};
    ///
    /// let registry = LoadingRegistry::new();
    /// let enrolled: Result<u32, String> = registry
    ///     .with_loading(keys::courses::ENROLL, Some("Enrolling…"), || async { Ok(42) })
    ///     .await;
    ///
    /// assert_eq!(enrolled, Ok(42));
    /// assert!(!registry.is_loading(keys::courses::ENROLL));
    /// # });
    /// # fn tokio_test_block<F: std::future::Future>(f: F) {
    /// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
    /// # }
    /// ```
    pub async fn with_loading<F, Fut>(&self, key: &str, message: Option<&str>, operation: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let guard = self.guard(key, message);
        let output = operation().await;
        guard.finish();
        output
    }

    /// Like [`LoadingRegistry::with_loading`], passing `operation` a
    /// [`ProgressReporter`] bound to `key`
    pub async fn with_progress<F, Fut>(
        &self,
        key: &str,
        initial_message: Option<&str>,
        operation: F,
    ) -> Fut::Output
    where
        F: FnOnce(ProgressReporter) -> Fut,
        Fut: Future,
    {
        let guard = self.guard(key, initial_message);
        let output = operation(guard.reporter()).await;
        guard.finish();
        output
    }

    /// Like [`LoadingRegistry::with_loading`], force-stopping `key` if
    /// `operation` has not settled within `timeout`
    ///
    /// On timeout the operation's future is dropped and
    /// [`Error::Timeout`] is returned.
    pub async fn with_loading_timeout<F, Fut>(
        &self,
        key: &str,
        message: Option<&str>,
        timeout: Duration,
        operation: F,
    ) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        match tokio::time::timeout(timeout, self.with_loading(key, message, operation)).await {
            Ok(output) => Ok(output),
            Err(_) => {
                let after_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!("Operation '{}' timed out after {}ms, stopped", key, after_ms);
                Err(Error::Timeout {
                    key: key.to_string(),
                    after_ms,
                })
            }
        }
    }

    /// Apply `operation_timeout_ms` from configuration, if set
    ///
    /// Without a configured deadline this waits as long as the operation
    /// takes and always returns `Ok`.
    pub async fn with_default_timeout<F, Fut>(
        &self,
        key: &str,
        message: Option<&str>,
        operation: F,
    ) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        match self.config().operation_timeout_ms {
            Some(ms) => {
                self.with_loading_timeout(key, message, Duration::from_millis(ms), operation)
                    .await
            }
            None => Ok(self.with_loading(key, message, operation).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadingConfig;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    struct EnrollError(&'static str);

    #[tokio::test]
    async fn test_with_loading_returns_value_and_stops() {
        let registry = LoadingRegistry::new();
        let observer = registry.clone();

        let value = registry
            .with_loading("course:enroll", Some("Enrolling"), || async move {
                assert!(observer.is_loading("course:enroll"));
                assert_eq!(
                    observer.get_state("course:enroll").unwrap().message.as_deref(),
                    Some("Enrolling")
                );
                7
            })
            .await;

        assert_eq!(value, 7);
        assert!(!registry.is_loading("course:enroll"));
    }

    #[tokio::test]
    async fn test_with_loading_passes_error_through() {
        let registry = LoadingRegistry::new();

        let result: std::result::Result<(), EnrollError> = registry
            .with_loading("course:enroll", None, || async { Err(EnrollError("course full")) })
            .await;

        assert_eq!(result, Err(EnrollError("course full")));
        assert!(!registry.is_loading("course:enroll"));
    }

    #[tokio::test]
    async fn test_with_loading_stops_exactly_once() {
        let registry = LoadingRegistry::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = registry.subscribe(move |snapshot| {
            sink.lock().unwrap().push(snapshot.is_loading("data:save"));
        });

        registry.with_loading("data:save", None, || async {}).await;

        assert_eq!(*events.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_with_progress_reports_through_registry() {
        let registry = LoadingRegistry::new();
        let progress_seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress_seen);
        let _sub = registry.subscribe(move |snapshot| {
            if let Some(state) = snapshot.get("file:upload") {
                sink.lock().unwrap().push((state.progress, state.message.clone()));
            }
        });

        let result = registry
            .with_progress("file:upload", Some("Uploading"), |update| async move {
                update.report(30.0);
                tokio::task::yield_now().await;
                update.report_with_message(70.0, "Finalizing");
                "done"
            })
            .await;

        assert_eq!(result, "done");
        assert!(!registry.is_loading("file:upload"));
        assert_eq!(
            *progress_seen.lock().unwrap(),
            vec![
                (None, Some("Uploading".to_string())),
                (Some(30.0), Some("Uploading".to_string())),
                (Some(70.0), Some("Finalizing".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_reporter_after_completion_is_ignored() {
        let registry = LoadingRegistry::new();
        let leaked = registry
            .with_progress("ai:transcribe", None, |update| async move { update })
            .await;

        leaked.report(99.0);
        assert!(!registry.is_loading("ai:transcribe"));
    }

    #[tokio::test]
    async fn test_dropped_future_stops_key() {
        let registry = LoadingRegistry::new();

        let pending = registry.with_loading("ai:generate_lecture", None, || {
            std::future::pending::<()>()
        });
        let outcome = tokio::time::timeout(Duration::from_millis(20), pending).await;

        assert!(outcome.is_err());
        assert!(!registry.is_loading("ai:generate_lecture"));
    }

    #[tokio::test]
    async fn test_panicking_operation_stops_key() {
        let registry = LoadingRegistry::new();
        let task_registry = registry.clone();

        let handle = tokio::spawn(async move {
            task_registry
                .with_loading("payment:process", None, || async {
                    panic!("gateway crashed");
                })
                .await
        });

        assert!(handle.await.unwrap_err().is_panic());
        assert!(!registry.is_loading("payment:process"));
    }

    #[tokio::test]
    async fn test_with_loading_timeout_elapsed() {
        let registry = LoadingRegistry::new();

        let err = registry
            .with_loading_timeout(
                "ai:tutor_chat",
                Some("Thinking"),
                Duration::from_millis(10),
                || std::future::pending::<u8>(),
            )
            .await
            .unwrap_err();

        match err {
            Error::Timeout { key, after_ms } => {
                assert_eq!(key, "ai:tutor_chat");
                assert_eq!(after_ms, 10);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(!registry.is_loading("ai:tutor_chat"));
    }

    #[tokio::test]
    async fn test_with_loading_timeout_completes_in_time() {
        let registry = LoadingRegistry::new();
        let value = registry
            .with_loading_timeout("data:load", None, Duration::from_secs(5), || async { 3 })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert!(!registry.is_loading("data:load"));
    }

    #[tokio::test]
    async fn test_with_default_timeout_uses_config() {
        let registry = LoadingRegistry::with_config(LoadingConfig {
            operation_timeout_ms: Some(10),
            ..LoadingConfig::default()
        });
        let result = registry
            .with_default_timeout("data:load", None, || std::future::pending::<()>())
            .await;
        assert!(matches!(result, Err(Error::Timeout { after_ms: 10, .. })));

        let unbounded = LoadingRegistry::new();
        let result = unbounded
            .with_default_timeout("data:load", None, || async { "ok" })
            .await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[test]
    fn test_guard_finish_and_drop() {
        let registry = LoadingRegistry::new();

        let guard = registry.guard("profile:upload_avatar", Some("Uploading"));
        assert_eq!(guard.key(), "profile:upload_avatar");
        assert!(registry.is_loading("profile:upload_avatar"));
        guard.finish();
        assert!(!registry.is_loading("profile:upload_avatar"));

        {
            let _guard = registry.guard("profile:update", None);
            assert!(registry.is_loading("profile:update"));
        }
        assert!(!registry.is_loading("profile:update"));
    }

    #[test]
    fn test_guard_reporter_updates_progress() {
        let registry = LoadingRegistry::new();
        let guard = registry.guard("course:load_degree", None);
        let reporter = guard.reporter();
        reporter.report(12.5);
        assert_eq!(
            registry.get_state("course:load_degree").unwrap().progress,
            Some(12.5)
        );
        assert_eq!(reporter.key(), "course:load_degree");
    }
}
