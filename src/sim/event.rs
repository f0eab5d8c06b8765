use std::cmp::Ordering;
use std::fmt;

use crate::demand::ArrivalRequest;

use super::types::SimInstant;

/// What happens at a scheduled instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// A charger finishes its session and becomes idle.
    Departure { charger: usize },
    /// A vehicle arrives and asks for a charger.
    Arrival(ArrivalRequest),
}

impl EventKind {
    /// Processing rank at equal instants: departures come first so a charger
    /// freed at the arrival instant can serve that arrival.
    fn rank(&self) -> u8 {
        match self {
            Self::Departure { .. } => 0,
            Self::Arrival(_) => 1,
        }
    }
}

/// An event in the queue, ordered by `(at, kind rank, seq)`.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledEvent {
    pub at: SimInstant,
    /// Insertion counter; keeps ordering total and FIFO among equal keys.
    pub seq: u64,
    pub kind: EventKind,
}

impl ScheduledEvent {
    fn key(&self) -> (SimInstant, u8, u64) {
        (self.at, self.kind.rank(), self.seq)
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` pops the earliest event first.
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Departure { charger } => {
                write!(f, "Departure(charger={charger}, at={})", self.at)
            }
            EventKind::Arrival(req) => write!(
                f,
                "Arrival(at={}, requested={} kW, energy={:.3} kWh)",
                self.at, req.demand.requested_power_kw, req.demand.energy_required_kwh
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BinaryHeap;

    use super::*;
    use crate::demand::TripDemand;

    fn arrival(at: u64, seq: u64) -> ScheduledEvent {
        ScheduledEvent {
            at: SimInstant::from_millis(at),
            seq,
            kind: EventKind::Arrival(ArrivalRequest {
                arrival: SimInstant::from_millis(at),
                demand: TripDemand {
                    distance_km: 10.0,
                    energy_required_kwh: 1.8,
                    requested_group: 0,
                    requested_power_kw: 11.0,
                },
            }),
        }
    }

    fn departure(at: u64, seq: u64) -> ScheduledEvent {
        ScheduledEvent {
            at: SimInstant::from_millis(at),
            seq,
            kind: EventKind::Departure { charger: 0 },
        }
    }

    #[test]
    fn departure_wins_ties_with_arrival() {
        let mut heap = BinaryHeap::new();
        heap.push(arrival(100, 0));
        heap.push(departure(100, 1));
        let first = heap.pop().unwrap();
        assert!(matches!(first.kind, EventKind::Departure { .. }));
    }

    #[test]
    fn earlier_instant_pops_first() {
        let mut heap = BinaryHeap::new();
        heap.push(departure(300, 0));
        heap.push(arrival(50, 1));
        heap.push(departure(200, 2));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop())
            .map(|e| e.at.as_millis())
            .collect();
        assert_eq!(order, vec![50, 200, 300]);
    }

    #[test]
    fn display_names_the_kind() {
        assert!(departure(5, 0).to_string().starts_with("Departure"));
        assert!(arrival(5, 0).to_string().starts_with("Arrival"));
    }
}
