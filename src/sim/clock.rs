use std::collections::BinaryHeap;

use crate::error::SimError;

use super::event::{EventKind, ScheduledEvent};
use super::types::SimInstant;

/// Discrete-event clock: a min-heap of pending events and the current instant.
///
/// Time only moves forward; scheduling into the past is a fault.
///
/// # Examples
///
/// ```
/// use depot_sim::sim::clock::EventClock;
/// use depot_sim::sim::event::EventKind;
/// use depot_sim::sim::types::SimInstant;
///
/// let mut clock = EventClock::new();
/// clock.schedule(SimInstant::from_millis(20), EventKind::Departure { charger: 1 }).unwrap();
/// clock.schedule(SimInstant::from_millis(10), EventKind::Departure { charger: 0 }).unwrap();
///
/// let first = clock.pop_next().unwrap();
/// assert_eq!(first.at.as_millis(), 10);
/// assert_eq!(clock.now().as_millis(), 10);
/// ```
#[derive(Debug, Default)]
pub struct EventClock {
    now: SimInstant,
    next_seq: u64,
    queue: BinaryHeap<ScheduledEvent>,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated instant (that of the last popped event).
    pub fn now(&self) -> SimInstant {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queues `kind` to happen at `at`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimulationFault` if `at` is before the current instant.
    pub fn schedule(&mut self, at: SimInstant, kind: EventKind) -> Result<(), SimError> {
        let event = ScheduledEvent {
            at,
            seq: self.next_seq,
            kind,
        };
        if at < self.now {
            return Err(SimError::fault(
                event.to_string(),
                format!("scheduled before current time {}", self.now),
            ));
        }
        self.next_seq += 1;
        self.queue.push(event);
        Ok(())
    }

    /// Pops the earliest event and advances the clock to it.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        let event = self.queue.pop()?;
        debug_assert!(event.at >= self.now, "event queue went back in time");
        self.now = event.at;
        Some(event)
    }
}
