use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;

use crate::error::ConfigError;
use crate::sim::types::ChargerSpec;

/// Trip distances driven before arriving at the depot, as
/// `(probability in percent, km)`. The remaining 0.03 % is a 0 km trip.
pub const TRIP_DISTANCE_TABLE: [(f64, f64); 9] = [
    (34.31, 0.0),
    (4.90, 5.0),
    (9.80, 10.0),
    (11.76, 20.0),
    (8.82, 30.0),
    (11.76, 50.0),
    (10.78, 100.0),
    (4.90, 200.0),
    (2.94, 300.0),
];

/// Charging need of one arriving vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripDemand {
    pub distance_km: f64,
    pub energy_required_kwh: f64,
    /// Index of the requested charger spec.
    pub requested_group: usize,
    pub requested_power_kw: f64,
}

impl TripDemand {
    /// A 0 km trip leaves nothing to recharge.
    pub fn needs_charge(&self) -> bool {
        self.energy_required_kwh > 0.0
    }
}

/// Samples trip distance and requested charger type per arrival.
///
/// Each call consumes exactly two draws: the distance uniform, then the
/// charger-type index weighted by each spec's `count`.
#[derive(Debug, Clone)]
pub struct TripSampler {
    /// Cumulative probability thresholds paired with km.
    cumulative: Vec<(f64, f64)>,
    charger_type: WeightedIndex<u32>,
    powers: Vec<f64>,
    /// kWh per 100 km.
    energy_per_km: f64,
}

impl TripSampler {
    /// Builds a sampler for the given charger inventory and consumption rate.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if no charger group has a positive count.
    pub fn new(chargers: &[ChargerSpec], energy_per_km: f64) -> Result<Self, ConfigError> {
        let charger_type = WeightedIndex::new(chargers.iter().map(|c| c.count)).map_err(|e| {
            ConfigError::new("chargers", format!("cannot weight charger types: {e}"))
        })?;

        let mut acc = 0.0;
        let cumulative = TRIP_DISTANCE_TABLE
            .iter()
            .map(|&(pct, km)| {
                acc += pct / 100.0;
                (acc, km)
            })
            .collect();

        Ok(Self {
            cumulative,
            charger_type,
            powers: chargers.iter().map(|c| c.power_kw).collect(),
            energy_per_km,
        })
    }

    /// Maps a uniform draw in `[0, 1)` to a trip distance in km.
    pub fn distance_for(&self, u: f64) -> f64 {
        self.cumulative
            .iter()
            .find(|(threshold, _)| u <= *threshold)
            .map_or(0.0, |&(_, km)| km)
    }

    /// Energy needed to cover `distance_km` (kWh).
    pub fn energy_for(&self, distance_km: f64) -> f64 {
        distance_km / 100.0 * self.energy_per_km
    }

    /// Draws the charging need of one arriving vehicle.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TripDemand {
        let distance_km = self.distance_for(rng.random());
        let requested_group = self.charger_type.sample(rng);

        TripDemand {
            distance_km,
            energy_required_kwh: self.energy_for(distance_km),
            requested_group,
            requested_power_kw: self.powers[requested_group],
        }
    }
}
