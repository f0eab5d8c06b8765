//! Core simulation types: run configuration, charging events, and results.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::calendar::check_year;
use crate::error::ConfigError;

/// Milliseconds in one simulated hour.
pub const MS_PER_HOUR: u64 = 3_600_000;

/// Absolute simulated instant, in milliseconds since local midnight of
/// 1 January of the simulated year.
///
/// # Examples
///
/// ```
/// use depot_sim::sim::types::SimInstant;
///
/// let t = SimInstant::from_hours_ceil(1.5);
/// assert_eq!(t.as_millis(), 5_400_000);
/// assert_eq!(t.as_hours(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimInstant(u64);

impl SimInstant {
    pub const ZERO: Self = Self(0);

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Converts a duration in hours to whole milliseconds, rounding up.
    pub fn from_hours_ceil(hours: f64) -> Self {
        Self(millis_ceil(hours))
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn as_hours(self) -> f64 {
        self.0 as f64 / MS_PER_HOUR as f64
    }

    /// Returns `self + ms`, saturating at `u64::MAX`.
    pub fn plus_millis(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms))
    }
}

impl fmt::Display for SimInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}h", self.as_hours())
    }
}

/// Rounds a non-negative duration in hours up to whole milliseconds.
pub(crate) fn millis_ceil(hours: f64) -> u64 {
    if !hours.is_finite() || hours <= 0.0 {
        return 0;
    }
    (hours * MS_PER_HOUR as f64).ceil() as u64
}

/// One group of identical chargers.
///
/// Parses from the `NxP` shorthand, where `N` is the charger count and `P`
/// the power rating in kW.
///
/// ```
/// use depot_sim::sim::types::ChargerSpec;
///
/// let spec: ChargerSpec = "3x22".parse().unwrap();
/// assert_eq!(spec.count, 3);
/// assert_eq!(spec.power_kw, 22.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChargerSpec {
    /// Power rating of every charger in the group (kW).
    pub power_kw: f64,
    /// Number of chargers in the group.
    pub count: u32,
}

impl ChargerSpec {
    pub fn new(power_kw: f64, count: u32) -> Self {
        Self { power_kw, count }
    }

    /// Installed power of the whole group (kW).
    pub fn installed_kw(&self) -> f64 {
        self.power_kw * f64::from(self.count)
    }

    /// Parses a comma-separated list such as `"5x11,3x22,1x50"`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first malformed entry.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ConfigError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for ChargerSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| {
            ConfigError::new(
                "chargers",
                format!("invalid charger specification \"{s}\": {why}"),
            )
        };
        let (count, power) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| invalid("expected NxP, e.g. 5x11"))?;
        let count = count
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(&format!("count: {e}")))?;
        let power_kw = power
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(&format!("power: {e}")))?;
        Ok(Self { power_kw, count })
    }
}

impl fmt::Display for ChargerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.count, self.power_kw)
    }
}

/// Parameters of one simulation run.
///
/// Immutable for the duration of a run; the sweep controller clones it per
/// tested charger count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationConfig {
    /// Charger inventory, in instance-numbering order.
    pub chargers: Vec<ChargerSpec>,
    /// Scales every entry of the arrival-rate table.
    pub arrival_multiplier: f64,
    /// Vehicle consumption in kWh per 100 km.
    pub energy_per_km: f64,
    /// Calendar year to simulate.
    pub year: i32,
    /// Seed for the run's random stream; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            chargers: vec![ChargerSpec::new(11.0, 20)],
            arrival_multiplier: 1.0,
            energy_per_km: 18.0,
            year: 2023,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Sum of installed charger power (kW).
    pub fn theoretical_max_kw(&self) -> f64 {
        self.chargers.iter().map(ChargerSpec::installed_kw).sum()
    }

    /// Total number of charger instances.
    pub fn charger_count(&self) -> usize {
        self.chargers.iter().map(|c| c.count as usize).sum()
    }

    /// Validates every field and returns each violated constraint.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.chargers.is_empty() {
            errors.push(ConfigError::new("chargers", "must not be empty"));
        }
        for (i, c) in self.chargers.iter().enumerate() {
            if !(c.power_kw.is_finite() && c.power_kw > 0.0) {
                errors.push(ConfigError::new(
                    format!("chargers[{i}].power_kw"),
                    format!("must be a finite value > 0, got {}", c.power_kw),
                ));
            }
            if c.count < 1 {
                errors.push(ConfigError::new(
                    format!("chargers[{i}].count"),
                    "must be >= 1",
                ));
            }
        }
        if !(self.arrival_multiplier.is_finite() && self.arrival_multiplier > 0.0) {
            errors.push(ConfigError::new(
                "simulation.arrival_multiplier",
                format!("must be a finite value > 0, got {}", self.arrival_multiplier),
            ));
        }
        if !(self.energy_per_km.is_finite() && self.energy_per_km > 0.0) {
            errors.push(ConfigError::new(
                "simulation.energy_per_km",
                format!("must be a finite value > 0, got {}", self.energy_per_km),
            ));
        }
        if let Err(e) = check_year(self.year) {
            errors.push(e);
        }

        errors
    }
}

/// A vehicle that was assigned a charger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingEvent {
    /// Power rating of the assigned charger's type (kW).
    pub charger_type_power_kw: f64,
    /// Local wall-clock start of the session.
    pub start_time: DateTime<FixedOffset>,
    /// Local wall-clock end of the session.
    pub end_time: DateTime<FixedOffset>,
    /// Energy delivered during the session (kWh).
    pub energy_kwh: f64,
    /// Charging power drawn for the whole session (kW).
    pub power_kw: f64,
    /// Power rating the vehicle asked for; differs from `power_kw` after a fallback.
    pub requested_power_kw: f64,
    /// Index of the charger instance in the pool.
    pub charger_index: usize,
}

/// Calendar bucket kinds for period statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Day,
    Week,
    Month,
    Year,
}

impl PeriodType {
    pub const ALL: [Self; 4] = [Self::Day, Self::Week, Self::Month, Self::Year];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event totals for one calendar bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodStatistic {
    pub period_type: PeriodType,
    /// ISO date for days, ISO week number, month number (1-12), or year.
    pub period_value: String,
    pub total_events: u64,
    /// Sum of `power_kw` over events starting in the bucket.
    pub total_power_kw: f64,
}

/// Event totals for one charger power rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargerTypeStatistic {
    pub charger_type_power_kw: f64,
    pub total_events: u64,
    pub total_power_kw: f64,
    pub total_energy_kwh: f64,
    /// `total_power_kw / total_events`, or 0 without events.
    pub avg_power_kw: f64,
}

/// Headline KPIs and detail collections of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub total_energy_kwh: f64,
    pub theoretical_max_kw: f64,
    pub actual_max_kw: f64,
    pub concurrency_factor: f64,
    pub total_charging_events: u64,
    /// Seed actually used for the run's random stream.
    pub seed: u64,
    /// Arrivals generated over the year, served or not.
    pub total_arrivals: u64,
    /// Arrivals that found every charger busy.
    pub rejected_arrivals: u64,
    /// Arrivals whose sampled trip needed no charge.
    pub no_demand_arrivals: u64,
    /// Sessions placed on a charger type other than the requested one.
    pub fallback_assignments: u64,
    pub charging_events: Vec<ChargingEvent>,
    pub period_statistics: Vec<PeriodStatistic>,
    pub charger_statistics: Vec<ChargerTypeStatistic>,
}

impl SimulationResult {
    /// Period statistics of one bucket kind, in ascending order.
    pub fn periods(&self, period_type: PeriodType) -> impl Iterator<Item = &PeriodStatistic> {
        self.period_statistics
            .iter()
            .filter(move |s| s.period_type == period_type)
    }

    /// Share of arrivals with a charging need that were turned away.
    pub fn rejection_rate(&self) -> f64 {
        let wanting = self.total_charging_events + self.rejected_arrivals;
        if wanting == 0 {
            0.0
        } else {
            self.rejected_arrivals as f64 / wanting as f64
        }
    }
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Simulation Report ---")?;
        writeln!(f, "Seed:                  {}", self.seed)?;
        writeln!(f, "Total energy:          {:.2} kWh", self.total_energy_kwh)?;
        writeln!(f, "Theoretical max:       {:.2} kW", self.theoretical_max_kw)?;
        writeln!(f, "Actual max:            {:.2} kW", self.actual_max_kw)?;
        writeln!(f, "Concurrency factor:    {:.3}", self.concurrency_factor)?;
        writeln!(
            f,
            "Charging events:       {} of {} arrivals",
            self.total_charging_events, self.total_arrivals
        )?;
        write!(
            f,
            "Rejected / no demand:  {} / {} ({:.1}% rejected)",
            self.rejected_arrivals,
            self.no_demand_arrivals,
            self.rejection_rate() * 100.0
        )
    }
}
