//! The dispatch component owned by the facade.
//!
//! Tracked events go to the event bus. Each dispatch cycle turns buffered
//! events into a batch, picks the pending batch from the batch bus, and
//! sends it. Network failures are logged and counted, never returned: a
//! collector outage must not break the host application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use reqwest::Url;

use crate::config::{parse_endpoint, TrackerConfig};
use crate::error::Result;
use crate::types::{DeviceInformation, Event};

use super::batch_bus::BatchBus;
use super::client::DispatchClient;
use super::event_bus::EventBus;

/// Result of one dispatch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Batch accepted by the endpoint
    Sent { number: u64, events: usize },
    /// Batch rejected or unreachable; kept for the next cycle
    Failed { number: u64, retries: usize },
    /// Batch given up on (non-retryable error or retries exhausted)
    Dropped { number: u64, events: usize },
    /// Nothing to send, or the failed batch was discarded by a reset
    Idle,
    /// A previous dispatch is still in flight
    Busy,
}

/// Dispatch statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    /// Batches accepted by the endpoint
    pub batches_sent: usize,
    /// Events inside accepted batches
    pub events_sent: usize,
    /// Failed dispatch attempts
    pub failures: usize,
    /// Batches discarded after failing
    pub batches_dropped: usize,
    /// Events inside discarded batches
    pub events_dropped: usize,
}

struct TaggerState {
    events: EventBus,
    batches: BatchBus,
    session_identifier: Option<String>,
    stats: DispatchStats,
}

/// Collects tagged events and ships them to the collector endpoint.
///
/// Obtained from [`O2mc::tracker`](crate::O2mc::tracker); all methods take
/// `&self` and are safe to call from any thread.
pub struct Tagger {
    app_id: String,
    client: DispatchClient,
    max_retries: usize,
    endpoint: RwLock<Url>,
    tracking: AtomicBool,
    state: Mutex<TaggerState>,
}

impl Tagger {
    pub(crate) fn new(config: &TrackerConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let client = DispatchClient::new(config.timeout())?;

        Ok(Self {
            app_id: config.app_id.clone(),
            client,
            max_retries: config.max_retries,
            endpoint: RwLock::new(endpoint),
            tracking: AtomicBool::new(true),
            state: Mutex::new(TaggerState {
                events: EventBus::default(),
                batches: BatchBus::new(config.app_id.clone(), DeviceInformation::current()),
                session_identifier: None,
                stats: DispatchStats::default(),
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, TaggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track an event by name
    pub fn track(&self, name: impl Into<String>) {
        self.record(Event::new(name, None));
    }

    /// Track an event carrying a value (string, number, or any JSON)
    pub fn track_with_properties(
        &self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) {
        self.record(Event::new(name, Some(value.into())));
    }

    fn record(&self, event: Event) {
        if !self.is_tracking() {
            tracing::debug!(name = %event.name, "Tracking stopped, ignoring event");
            return;
        }
        self.state().events.add(event);
    }

    /// Stop recording events until [`resume`](Self::resume) is called.
    ///
    /// Events already buffered are kept and still dispatched.
    pub fn stop(&self) {
        self.tracking.store(false, Ordering::SeqCst);
        tracing::info!(app_id = %self.app_id, "Tracking stopped");
    }

    pub fn resume(&self) {
        self.tracking.store(true, Ordering::SeqCst);
        tracing::info!(app_id = %self.app_id, "Tracking resumed");
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// Discard buffered events, queued and pending batches, and the retry counter
    pub fn reset(&self) {
        let mut state = self.state();
        state.events.clear();
        state.batches.clear();
        tracing::info!(app_id = %self.app_id, "Tracker reset");
    }

    /// Point subsequent dispatches at a different endpoint
    pub fn set_endpoint(&self, endpoint: &str) -> Result<()> {
        let url = parse_endpoint(endpoint)?;
        tracing::info!(endpoint = %url, "Endpoint changed");
        *self.endpoint.write().unwrap_or_else(PoisonError::into_inner) = url;
        Ok(())
    }

    pub fn endpoint(&self) -> Url {
        self.endpoint
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Generate a new session identifier attached to every later batch
    pub fn set_session_identifier(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.state().session_identifier = Some(id.clone());
        tracing::debug!(session_identifier = %id, "Session identifier set");
        id
    }

    pub fn session_identifier(&self) -> Option<String> {
        self.state().session_identifier.clone()
    }

    /// Events not yet accepted by the endpoint
    pub fn pending_events(&self) -> usize {
        let state = self.state();
        state.events.len() + state.batches.event_count()
    }

    pub fn stats(&self) -> DispatchStats {
        self.state().stats.clone()
    }

    /// Run one dispatch cycle now
    pub async fn dispatch(&self) -> DispatchOutcome {
        self.dispatch_cycle(false).await
    }

    /// One dispatch cycle. With `announce` set an empty batch is sent when
    /// there is nothing else to send.
    pub(crate) async fn dispatch_cycle(&self, announce: bool) -> DispatchOutcome {
        let (batch, endpoint) = {
            let mut state = self.state();
            if state.batches.awaiting_callback() {
                tracing::debug!("Dispatch already in flight, skipping cycle");
                return DispatchOutcome::Busy;
            }

            let session = state.session_identifier.clone();
            if !state.events.is_empty() {
                let events = state.events.drain();
                let batch = state.batches.generate_batch(events, session.clone());
                state.batches.add(batch);
            }

            state.batches.set_pending_batch(session.clone());
            if state.batches.pending_batch().is_none() {
                if !announce {
                    return DispatchOutcome::Idle;
                }
                let batch = state.batches.generate_batch(Vec::new(), session);
                state.batches.set_pending(batch);
            }

            let Some(batch) = state.batches.on_dispatch() else {
                return DispatchOutcome::Idle;
            };
            (batch, self.endpoint())
        };

        let number = batch.number;
        let events = batch.events.len();

        let mut in_flight = InFlight { tagger: self, armed: true };
        let result = self.client.send_batch(&endpoint, &batch).await;
        in_flight.armed = false;

        match result {
            Ok(()) => {
                let mut state = self.state();
                state.batches.last_batch_succeeded();
                state.stats.batches_sent += 1;
                state.stats.events_sent += events;
                tracing::debug!(
                    endpoint = %endpoint,
                    number,
                    events,
                    "Dispatched batch"
                );
                DispatchOutcome::Sent { number, events }
            }
            Err(e) => {
                let mut state = self.state();
                state.stats.failures += 1;

                let superseded = !state
                    .batches
                    .pending_batch()
                    .is_some_and(|pending| pending.number == number);
                if superseded {
                    state.batches.cancel_dispatch();
                    tracing::debug!(
                        number,
                        error = %e,
                        "Failed batch was discarded by a reset"
                    );
                    return DispatchOutcome::Idle;
                }

                state.batches.last_batch_failed();
                let retries = state.batches.retries();

                if !e.is_retryable() || retries > self.max_retries {
                    state.batches.discard_pending();
                    state.stats.batches_dropped += 1;
                    state.stats.events_dropped += events;
                    tracing::warn!(
                        endpoint = %endpoint,
                        number,
                        events,
                        retries,
                        error = %e,
                        "Dropping batch"
                    );
                    DispatchOutcome::Dropped { number, events }
                } else {
                    tracing::warn!(
                        endpoint = %endpoint,
                        number,
                        retries,
                        error = %e,
                        "Failed to dispatch batch"
                    );
                    DispatchOutcome::Failed { number, retries }
                }
            }
        }
    }
}

/// Clears the in-flight flag if a dispatch future is dropped mid-request.
struct InFlight<'a> {
    tagger: &'a Tagger,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.tagger.state().batches.cancel_dispatch();
        }
    }
}

impl std::fmt::Debug for Tagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tagger")
            .field("app_id", &self.app_id)
            .field("endpoint", &self.endpoint().as_str())
            .field("tracking", &self.is_tracking())
            .finish_non_exhaustive()
    }
}
