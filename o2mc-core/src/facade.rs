//! `O2mc`, the entry point host applications hold on to.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::tracker::{DispatchOutcome, DispatchTimer, Tagger};

/// Configured tagging client.
///
/// Owns one [`Tagger`] for its whole lifetime and, once started, the timer
/// that dispatches its events. Instances share nothing with each other.
/// Dropping the facade aborts its timer.
pub struct O2mc {
    config: TrackerConfig,
    dispatch_interval: Duration,
    tracker: Arc<Tagger>,
    timer: Mutex<Option<DispatchTimer>>,
    runtime: Handle,
}

impl O2mc {
    /// Create a client for `app_id` dispatching to `endpoint` every `dispatch_interval`.
    ///
    /// With `force_start_timer` the dispatch timer starts right away;
    /// otherwise it waits for [`start_timer`](Self::start_timer).
    /// Must be called from within a tokio runtime, which will drive the timer.
    ///
    /// # Errors
    ///
    /// `Error::Config` if `app_id` is empty, `endpoint` is not an http(s) URL
    /// or `dispatch_interval` is zero; `Error::Runtime` outside a runtime.
    pub fn new(
        app_id: impl Into<String>,
        endpoint: impl Into<String>,
        dispatch_interval: Duration,
        force_start_timer: bool,
    ) -> Result<Self> {
        Self::from_config(TrackerConfig::new(
            app_id,
            endpoint,
            dispatch_interval,
            force_start_timer,
        ))
    }

    /// Create a client from a loaded configuration
    pub fn from_config(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let dispatch_interval = config.dispatch_interval()?;

        let runtime = Handle::try_current()
            .map_err(|e| Error::Runtime(format!("O2mc must be created inside a tokio runtime: {}", e)))?;

        let tracker = Arc::new(Tagger::new(&config)?);

        let client = Self {
            config,
            dispatch_interval,
            tracker,
            timer: Mutex::new(None),
            runtime,
        };

        tracing::info!(
            app_id = %client.config.app_id,
            endpoint = %client.config.endpoint,
            interval_secs = client.config.dispatch_interval_secs,
            force_start_timer = client.config.force_start_timer,
            "O2mc initialized"
        );

        if client.config.force_start_timer {
            client.start_timer();
        }

        Ok(client)
    }

    /// The dispatch component, for tracking events
    pub fn tracker(&self) -> &Tagger {
        &self.tracker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Period of the dispatch timer
    pub fn dispatch_interval(&self) -> Duration {
        self.dispatch_interval
    }

    fn timer(&self) -> MutexGuard<'_, Option<DispatchTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start periodic dispatching.
    ///
    /// Returns false if the timer was already running.
    pub fn start_timer(&self) -> bool {
        let mut timer = self.timer();
        if timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        *timer = Some(DispatchTimer::spawn(
            &self.runtime,
            Arc::clone(&self.tracker),
            self.dispatch_interval,
        ));
        true
    }

    /// Stop periodic dispatching.
    ///
    /// Returns false if no timer was running. Buffered events stay buffered,
    /// and a dispatch the timer had in flight is abandoned with its batch
    /// kept pending. Use [`shutdown`](Self::shutdown) to let it finish.
    pub fn stop_timer(&self) -> bool {
        // Dropping the timer aborts it
        self.timer().take().is_some()
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Run one dispatch cycle immediately
    pub async fn flush(&self) -> DispatchOutcome {
        self.tracker.dispatch().await
    }

    /// Stop the timer, wait for it, then dispatch whatever is left
    pub async fn shutdown(self) -> DispatchOutcome {
        let timer = self.timer().take();
        if let Some(timer) = timer {
            timer.shutdown().await;
        }
        let outcome = self.flush().await;
        tracing::info!(app_id = %self.config.app_id, ?outcome, "O2mc shut down");
        outcome
    }
}

impl std::fmt::Debug for O2mc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("O2mc")
            .field("config", &self.config)
            .field("tracker", &self.tracker)
            .field("timer_running", &self.is_timer_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "http://127.0.0.1:9/collect";

    #[tokio::test]
    async fn test_new_with_valid_config() {
        let o2mc = O2mc::new("app-123", ENDPOINT, Duration::from_secs(30), false).unwrap();
        assert_eq!(o2mc.tracker().app_id(), "app-123");
        assert_eq!(o2mc.tracker().endpoint().as_str(), ENDPOINT);
        assert!(!o2mc.is_timer_running());
    }

    #[tokio::test]
    async fn test_new_rejects_bad_config() {
        let err = O2mc::new("", ENDPOINT, Duration::from_secs(30), false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = O2mc::new("app-123", "", Duration::from_secs(30), true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = O2mc::new("app-123", ENDPOINT, Duration::ZERO, true).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_dispatch_interval_kept_from_config() {
        let o2mc = O2mc::new("app-123", ENDPOINT, Duration::from_millis(250), false).unwrap();
        assert_eq!(o2mc.dispatch_interval(), Duration::from_millis(250));

        let mut config = TrackerConfig::new("app-123", ENDPOINT, Duration::from_secs(1), false);
        config.dispatch_interval_secs = 1.5;
        let o2mc = O2mc::from_config(config).unwrap();
        assert_eq!(o2mc.dispatch_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_new_outside_runtime() {
        let err = O2mc::new("app-123", ENDPOINT, Duration::from_secs(30), false).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[tokio::test]
    async fn test_timer_start_stop() {
        let o2mc = O2mc::new("app-123", ENDPOINT, Duration::from_secs(60), false).unwrap();

        assert!(o2mc.start_timer());
        assert!(o2mc.is_timer_running());
        assert!(!o2mc.start_timer());

        assert!(o2mc.stop_timer());
        assert!(!o2mc.is_timer_running());
        assert!(!o2mc.stop_timer());
    }

    #[tokio::test]
    async fn test_force_start_runs_timer() {
        let o2mc = O2mc::new("app-123", ENDPOINT, Duration::from_secs(60), true).unwrap();
        assert!(o2mc.is_timer_running());
    }

    #[tokio::test]
    async fn test_instances_are_independent() {
        let a = O2mc::new("app-123", ENDPOINT, Duration::from_secs(30), false).unwrap();
        let b = O2mc::new("app-123", ENDPOINT, Duration::from_secs(30), false).unwrap();

        assert!(!std::ptr::eq(a.tracker(), b.tracker()));

        a.tracker().track("only in a");
        assert_eq!(a.tracker().pending_events(), 1);
        assert_eq!(b.tracker().pending_events(), 0);
    }
}
