//! Vehicle demand: when vehicles arrive and how much they need to charge.

/// Time-varying arrival process.
pub mod arrival;
/// Trip distance and charger-type sampling.
pub mod trip;

use rand::Rng;

pub use arrival::ArrivalProcess;
pub use trip::{TripDemand, TripSampler};

use crate::calendar::Calendar;
use crate::error::ConfigError;
use crate::sim::types::{SimInstant, SimulationConfig};

/// One vehicle showing up at the depot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrivalRequest {
    pub arrival: SimInstant,
    pub demand: TripDemand,
}

/// Arrival process and trip sampler sharing one random stream.
///
/// Per arrival the stream is consumed in a fixed order: exponential gap and
/// acceptance draw for every thinning candidate, then trip distance, then
/// requested charger type.
#[derive(Debug, Clone)]
pub struct DemandModel {
    arrivals: ArrivalProcess,
    trips: TripSampler,
}

impl DemandModel {
    /// Builds the demand model for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the arrival rate or charger weights are unusable.
    pub fn new(calendar: &Calendar, config: &SimulationConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            arrivals: ArrivalProcess::new(calendar, config.arrival_multiplier)?,
            trips: TripSampler::new(&config.chargers, config.energy_per_km)?,
        })
    }

    /// Draws the next vehicle, or `None` after the last arrival of the year.
    pub fn next_request<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<ArrivalRequest> {
        let arrival = self.arrivals.next_arrival(rng)?;
        let demand = self.trips.sample(rng);
        Some(ArrivalRequest { arrival, demand })
    }
}
