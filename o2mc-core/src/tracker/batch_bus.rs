//! Batches waiting to be dispatched.
//!
//! Generated batches queue up here until a dispatch cycle promotes them to
//! the single *pending* batch. A pending batch stays put across failed
//! attempts; only success or a discard clears it. Several queued batches
//! are merged into one fresh batch so the metadata is sent once.

use chrono::Utc;

use crate::types::{Batch, DeviceInformation, Event};

#[derive(Debug)]
pub(crate) struct BatchBus {
    app_id: String,
    device_information: DeviceInformation,
    batches: Vec<Batch>,
    pending: Option<Batch>,
    /// Batches generated so far; the next batch gets this number
    counter: u64,
    /// Consecutive failed dispatches
    retries: usize,
    awaiting_callback: bool,
}

impl BatchBus {
    pub fn new(app_id: String, device_information: DeviceInformation) -> Self {
        Self {
            app_id,
            device_information,
            batches: Vec::new(),
            pending: None,
            counter: 0,
            retries: 0,
            awaiting_callback: false,
        }
    }

    pub fn generate_batch(&mut self, events: Vec<Event>, session: Option<String>) -> Batch {
        tracing::debug!(events = events.len(), number = self.counter, "Generating batch");

        let batch = Batch {
            app_id: self.app_id.clone(),
            device_information: self.device_information.clone(),
            timestamp: Utc::now(),
            events,
            number: self.counter,
            retries: 0,
            session_identifier: session,
        };
        self.counter += 1;
        batch
    }

    pub fn add(&mut self, batch: Batch) {
        tracing::debug!(number = batch.number, "Added batch to BatchBus");
        self.batches.push(batch);
    }

    /// Promote queued batches to pending, merging when there is more than one.
    ///
    /// No-op if a batch is already pending.
    pub fn set_pending_batch(&mut self, session: Option<String>) {
        if self.pending.is_some() {
            return;
        }

        match self.batches.len() {
            0 => {}
            1 => {
                self.pending = self.batches.pop();
            }
            n => {
                tracing::debug!(batches = n, "Merging queued batches");
                let events = self
                    .batches
                    .drain(..)
                    .flat_map(|b| b.events)
                    .collect();
                let merged = self.generate_batch(events, session);
                self.pending = Some(merged);
            }
        }
    }

    pub fn pending_batch(&self) -> Option<&Batch> {
        self.pending.as_ref()
    }

    pub fn set_pending(&mut self, batch: Batch) {
        self.pending = Some(batch);
    }

    /// Mark the pending batch as in flight and return a copy to send
    pub fn on_dispatch(&mut self) -> Option<Batch> {
        let retries = self.retries;
        let batch = self.pending.as_mut()?;
        batch.retries = retries;
        self.awaiting_callback = true;
        Some(batch.clone())
    }

    pub fn last_batch_succeeded(&mut self) {
        self.retries = 0;
        self.pending = None;
        self.awaiting_callback = false;
        tracing::debug!("Last batch succeeded, retries reset");
    }

    pub fn last_batch_failed(&mut self) {
        // A reset during the attempt leaves nothing to retry
        if self.pending.is_some() {
            self.retries += 1;
        }
        self.awaiting_callback = false;
        tracing::debug!(retries = self.retries, "Last batch failed");
    }

    /// The attempt was abandoned before an answer arrived
    pub fn cancel_dispatch(&mut self) {
        self.awaiting_callback = false;
    }

    /// Give up on the pending batch; returns it if there was one
    pub fn discard_pending(&mut self) -> Option<Batch> {
        self.retries = 0;
        self.awaiting_callback = false;
        self.pending.take()
    }

    pub fn awaiting_callback(&self) -> bool {
        self.awaiting_callback
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Events held in queued and pending batches
    pub fn event_count(&self) -> usize {
        let queued: usize = self.batches.iter().map(|b| b.events.len()).sum();
        queued + self.pending.as_ref().map_or(0, |b| b.events.len())
    }

    /// Drop queued and pending batches and the retry counter.
    ///
    /// An in-flight dispatch still reports back, but finds nothing pending.
    pub fn clear(&mut self) {
        self.batches.clear();
        self.pending = None;
        self.retries = 0;
        tracing::debug!("Cleared the BatchBus");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> BatchBus {
        BatchBus::new("app".to_string(), DeviceInformation::current())
    }

    fn events(names: &[&str]) -> Vec<Event> {
        names.iter().map(|n| Event::new(*n, None)).collect()
    }

    #[test]
    fn test_batch_numbers_increase() {
        let mut bus = bus();
        assert_eq!(bus.generate_batch(vec![], None).number, 0);
        assert_eq!(bus.generate_batch(vec![], None).number, 1);
        assert_eq!(bus.generate_batch(vec![], None).number, 2);
    }

    #[test]
    fn test_single_batch_becomes_pending() {
        let mut bus = bus();
        let batch = bus.generate_batch(events(&["a"]), None);
        bus.add(batch);

        bus.set_pending_batch(None);
        let pending = bus.pending_batch().unwrap();
        assert_eq!(pending.number, 0);
        assert_eq!(pending.events.len(), 1);
    }

    #[test]
    fn test_multiple_batches_are_merged() {
        let mut bus = bus();
        let first = bus.generate_batch(events(&["a", "b"]), None);
        bus.add(first);
        let second = bus.generate_batch(events(&["c"]), None);
        bus.add(second);

        bus.set_pending_batch(Some("session".to_string()));
        let pending = bus.pending_batch().unwrap();
        let names: Vec<_> = pending.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        // Merged batch is a new batch
        assert_eq!(pending.number, 2);
        assert_eq!(pending.session_identifier.as_deref(), Some("session"));
        assert_eq!(bus.event_count(), 3);
    }

    #[test]
    fn test_pending_batch_not_replaced() {
        let mut bus = bus();
        let first = bus.generate_batch(events(&["a"]), None);
        bus.add(first);
        bus.set_pending_batch(None);

        let second = bus.generate_batch(events(&["b"]), None);
        bus.add(second);
        bus.set_pending_batch(None);

        assert_eq!(bus.pending_batch().unwrap().number, 0);
        assert_eq!(bus.event_count(), 2);
    }

    #[test]
    fn test_retries_tracking() {
        let mut bus = bus();
        let batch = bus.generate_batch(events(&["a"]), None);
        bus.add(batch);
        bus.set_pending_batch(None);

        let sent = bus.on_dispatch().unwrap();
        assert_eq!(sent.retries, 0);
        assert!(bus.awaiting_callback());

        bus.last_batch_failed();
        assert!(!bus.awaiting_callback());
        assert_eq!(bus.retries(), 1);

        let sent = bus.on_dispatch().unwrap();
        assert_eq!(sent.retries, 1);
        bus.last_batch_failed();
        assert_eq!(bus.retries(), 2);

        bus.on_dispatch();
        bus.last_batch_succeeded();
        assert_eq!(bus.retries(), 0);
        assert!(bus.pending_batch().is_none());
    }

    #[test]
    fn test_on_dispatch_without_pending() {
        let mut bus = bus();
        assert!(bus.on_dispatch().is_none());
        assert!(!bus.awaiting_callback());
    }

    #[test]
    fn test_discard_and_clear() {
        let mut bus = bus();
        let batch = bus.generate_batch(events(&["a"]), None);
        bus.add(batch);
        bus.set_pending_batch(None);
        bus.on_dispatch();
        bus.last_batch_failed();

        let dropped = bus.discard_pending().unwrap();
        assert_eq!(dropped.events.len(), 1);
        assert_eq!(bus.retries(), 0);

        let batch = bus.generate_batch(events(&["b"]), None);
        bus.add(batch);
        bus.clear();
        assert_eq!(bus.event_count(), 0);
        assert!(bus.pending_batch().is_none());
    }
}
