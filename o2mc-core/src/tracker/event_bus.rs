//! Buffer of tracked events that have not been put in a batch yet.

use crate::types::Event;

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    events: Vec<Event>,
}

impl EventBus {
    pub fn add(&mut self, event: Event) {
        tracing::trace!(name = %event.name, "Added event to EventBus");
        self.events.push(event);
    }

    /// Take every buffered event, leaving the bus empty
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_empties_bus() {
        let mut bus = EventBus::default();
        bus.add(Event::new("a", None));
        bus.add(Event::new("b", None));
        assert_eq!(bus.len(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "a");
        assert!(bus.is_empty());
    }
}
