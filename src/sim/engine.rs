//! Discrete-event engine that drives arrivals, assignments, and departures
//! over one simulated year.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace};

use crate::calendar::Calendar;
use crate::demand::{ArrivalRequest, DemandModel};
use crate::error::SimError;

use super::clock::EventClock;
use super::event::{EventKind, ScheduledEvent};
use super::pool::ChargerPool;
use super::stats::StatsAggregator;
use super::types::{ChargingEvent, SimInstant, SimulationConfig, SimulationResult};

/// Arrival outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    arrivals: u64,
    rejected: u64,
    no_demand: u64,
    fallback: u64,
}

/// Simulation engine owning the clock, demand model, charger pool, and
/// statistics of one run.
///
/// Arrivals are pulled from the demand model one at a time, so at most one
/// arrival is pending in the event queue.
pub struct Engine {
    config: SimulationConfig,
    seed: u64,
    calendar: Calendar,
    demand: DemandModel,
    pool: ChargerPool,
    clock: EventClock,
    stats: StatsAggregator,
    rng: ChaCha8Rng,
    events: Vec<ChargingEvent>,
    counters: Counters,
}

impl Engine {
    /// Validates `config` and prepares a run.
    ///
    /// Without a configured seed one is drawn from OS entropy; the seed in use
    /// is reported by [`Engine::seed`] and in the result.
    ///
    /// # Errors
    ///
    /// Returns `SimError::InvalidConfiguration` listing every violated constraint.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(SimError::InvalidConfiguration(errors));
        }
        let calendar = Calendar::new(config.year)?;
        let demand = DemandModel::new(&calendar, &config)?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        Ok(Self {
            seed,
            pool: ChargerPool::new(&config.chargers),
            clock: EventClock::new(),
            stats: StatsAggregator::new(&config.chargers, calendar.clone()),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
            counters: Counters::default(),
            demand,
            calendar,
            config,
        })
    }

    /// Seed of this run's random stream.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Processes every event of the year and returns the result.
    ///
    /// Sessions still running at the end of the year complete after it.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimulationFault` if an internal invariant breaks.
    pub fn run(mut self) -> Result<SimulationResult, SimError> {
        self.pull_arrival()?;

        while let Some(event) = self.clock.pop_next() {
            let arrival = matches!(event.kind, EventKind::Arrival(_));
            self.dispatch(event)?;
            if arrival {
                self.pull_arrival()?;
            }
        }

        Ok(self.finish())
    }

    fn dispatch(&mut self, event: ScheduledEvent) -> Result<(), SimError> {
        match event.kind {
            EventKind::Arrival(request) => self.handle_arrival(request),
            EventKind::Departure { charger } => self.pool.release(charger, event.at),
        }
    }

    /// Schedules the next arrival, if the year has one left.
    fn pull_arrival(&mut self) -> Result<(), SimError> {
        match self.demand.next_request(&mut self.rng) {
            Some(request) => self
                .clock
                .schedule(request.arrival, EventKind::Arrival(request)),
            None => Ok(()),
        }
    }

    fn handle_arrival(&mut self, request: ArrivalRequest) -> Result<(), SimError> {
        let now = self.clock.now();
        self.counters.arrivals += 1;

        let demand = request.demand;
        if !demand.needs_charge() {
            self.counters.no_demand += 1;
            return Ok(());
        }

        let Some(assignment) =
            self.pool
                .assign(now, demand.requested_power_kw, demand.energy_required_kwh)?
        else {
            self.counters.rejected += 1;
            trace!(
                at = %now,
                requested_kw = demand.requested_power_kw,
                busy = self.pool.busy_count(),
                "arrival rejected, no idle charger"
            );
            return Ok(());
        };
        if assignment.fallback {
            self.counters.fallback += 1;
        }

        let event = ChargingEvent {
            charger_type_power_kw: assignment.power_kw,
            start_time: self.local_time(now, "session start")?,
            end_time: self.local_time(assignment.busy_until, "session end")?,
            energy_kwh: demand.energy_required_kwh,
            power_kw: assignment.power_kw,
            requested_power_kw: demand.requested_power_kw,
            charger_index: assignment.charger,
        };
        self.stats
            .record(&event, assignment.group, now, assignment.busy_until)?;
        self.events.push(event);

        self.clock.schedule(
            assignment.busy_until,
            EventKind::Departure {
                charger: assignment.charger,
            },
        )
    }

    fn local_time(
        &self,
        instant: SimInstant,
        what: &str,
    ) -> Result<chrono::DateTime<chrono::FixedOffset>, SimError> {
        self.calendar.local_time(instant).ok_or_else(|| {
            SimError::fault(
                format!("{what} at {instant}"),
                "instant has no local wall-clock time",
            )
        })
    }

    fn finish(self) -> SimulationResult {
        let stats = self.stats.finish();
        let c = self.counters;

        debug!(
            year = self.config.year,
            seed = self.seed,
            arrivals = c.arrivals,
            events = stats.total_charging_events,
            rejected = c.rejected,
            no_demand = c.no_demand,
            fallback = c.fallback,
            actual_max_kw = stats.actual_max_kw,
            concurrency = stats.concurrency_factor,
            "simulation finished"
        );

        SimulationResult {
            total_energy_kwh: stats.total_energy_kwh,
            theoretical_max_kw: stats.theoretical_max_kw,
            actual_max_kw: stats.actual_max_kw,
            concurrency_factor: stats.concurrency_factor,
            total_charging_events: stats.total_charging_events,
            seed: self.seed,
            total_arrivals: c.arrivals,
            rejected_arrivals: c.rejected,
            no_demand_arrivals: c.no_demand,
            fallback_assignments: c.fallback,
            charging_events: self.events,
            period_statistics: stats.period_statistics,
            charger_statistics: stats.charger_statistics,
        }
    }
}

/// Runs one simulated year for `config`.
///
/// # Errors
///
/// Returns `SimError::InvalidConfiguration` before any event is processed if
/// the configuration is rejected, or `SimError::SimulationFault` if an
/// internal invariant breaks.
///
/// # Examples
///
/// ```
/// use depot_sim::sim::engine::run_simulation;
/// use depot_sim::sim::types::{ChargerSpec, SimulationConfig};
///
/// let config = SimulationConfig {
///     chargers: vec![ChargerSpec::new(11.0, 2)],
///     arrival_multiplier: 0.1,
///     seed: Some(7),
///     ..SimulationConfig::default()
/// };
/// let result = run_simulation(&config).unwrap();
/// assert!(result.actual_max_kw <= result.theoretical_max_kw);
/// assert_eq!(result.seed, 7);
/// ```
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationResult, SimError> {
    Engine::new(config.clone())?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::TripDemand;
    use crate::sim::types::{ChargerSpec, MS_PER_HOUR};

    fn config(chargers: Vec<ChargerSpec>, multiplier: f64, seed: u64) -> SimulationConfig {
        SimulationConfig {
            chargers,
            arrival_multiplier: multiplier,
            seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn invalid_config_lists_all_errors() {
        let cfg = SimulationConfig {
            chargers: vec![],
            arrival_multiplier: 0.0,
            year: 1900,
            ..SimulationConfig::default()
        };
        let Err(SimError::InvalidConfiguration(errors)) = Engine::new(cfg) else {
            panic!("expected InvalidConfiguration");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"chargers"));
        assert!(fields.contains(&"simulation.arrival_multiplier"));
        assert!(fields.contains(&"simulation.year"));
    }

    #[test]
    fn arrival_outcomes_add_up() {
        let result = run_simulation(&config(vec![ChargerSpec::new(11.0, 3)], 1.0, 11)).unwrap();
        assert_eq!(
            result.total_arrivals,
            result.total_charging_events + result.rejected_arrivals + result.no_demand_arrivals
        );
        assert_eq!(result.total_charging_events, result.charging_events.len() as u64);
        assert!(result.no_demand_arrivals > 0);
    }

    #[test]
    fn energy_total_matches_event_sum() {
        let result = run_simulation(&config(vec![ChargerSpec::new(22.0, 4)], 0.5, 5)).unwrap();
        let sum: f64 = result.charging_events.iter().map(|e| e.energy_kwh).sum();
        assert_eq!(sum, result.total_energy_kwh);
    }

    #[test]
    fn sessions_end_after_they_start() {
        let result = run_simulation(&config(vec![ChargerSpec::new(11.0, 2)], 0.3, 2)).unwrap();
        assert!(
            result
                .charging_events
                .iter()
                .all(|e| e.end_time > e.start_time)
        );
    }

    #[test]
    fn fallback_only_counts_mismatched_ratings() {
        let chargers = vec![ChargerSpec::new(11.0, 1), ChargerSpec::new(50.0, 1)];
        let result = run_simulation(&config(chargers, 2.0, 3)).unwrap();
        let mismatched = result
            .charging_events
            .iter()
            .filter(|e| e.power_kw != e.requested_power_kw)
            .count() as u64;
        assert_eq!(mismatched, result.fallback_assignments);
    }

    fn request(at: SimInstant, energy_kwh: f64) -> ArrivalRequest {
        ArrivalRequest {
            arrival: at,
            demand: TripDemand {
                distance_km: energy_kwh / 18.0 * 100.0,
                energy_required_kwh: energy_kwh,
                requested_group: 0,
                requested_power_kw: 11.0,
            },
        }
    }

    #[test]
    fn charger_freed_at_an_arrival_instant_serves_that_arrival() {
        let mut engine = Engine::new(config(vec![ChargerSpec::new(11.0, 1)], 1.0, 1)).unwrap();
        let start = SimInstant::from_millis(8 * MS_PER_HOUR);
        let freed = start.plus_millis(MS_PER_HOUR);

        // The second arrival is queued before the departure it ties with.
        engine
            .clock
            .schedule(start, EventKind::Arrival(request(start, 11.0)))
            .unwrap();
        engine
            .clock
            .schedule(freed, EventKind::Arrival(request(freed, 5.5)))
            .unwrap();
        while let Some(event) = engine.clock.pop_next() {
            engine.dispatch(event).unwrap();
        }

        let result = engine.finish();
        assert_eq!(result.rejected_arrivals, 0);
        assert_eq!(result.total_charging_events, 2);
        let events = &result.charging_events;
        assert_eq!(events[1].start_time, events[0].end_time);
        assert!(events.iter().all(|e| e.charger_index == 0));
        assert_eq!(result.actual_max_kw, 11.0);
    }

    #[test]
    fn seed_is_drawn_when_absent() {
        let cfg = SimulationConfig {
            arrival_multiplier: 0.05,
            ..SimulationConfig::default()
        };
        let engine = Engine::new(cfg).unwrap();
        let seed = engine.seed();
        assert_eq!(engine.run().unwrap().seed, seed);
    }
}
