//! Streaming aggregation of charging events into run statistics.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar::Calendar;
use crate::error::SimError;

use super::types::{
    ChargerSpec, ChargerTypeStatistic, ChargingEvent, PeriodStatistic, PeriodType, SimInstant,
};

/// Calendar bucket; the derived order groups days, weeks, months, then years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PeriodKey {
    Day(NaiveDate),
    Week(u32),
    Month(u32),
    Year(i32),
}

impl PeriodKey {
    fn period_type(self) -> PeriodType {
        match self {
            Self::Day(_) => PeriodType::Day,
            Self::Week(_) => PeriodType::Week,
            Self::Month(_) => PeriodType::Month,
            Self::Year(_) => PeriodType::Year,
        }
    }

    fn value(self) -> String {
        match self {
            Self::Day(date) => date.to_string(),
            Self::Week(w) | Self::Month(w) => w.to_string(),
            Self::Year(y) => y.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    events: u64,
    power_kw: f64,
    energy_kwh: f64,
}

impl Totals {
    fn add(&mut self, event: &ChargingEvent) {
        self.events += 1;
        self.power_kw += event.power_kw;
        self.energy_kwh += event.energy_kwh;
    }
}

/// Busy-state change of one charger group.
#[derive(Debug, Clone, Copy)]
struct Transition {
    at: SimInstant,
    acquire: bool,
    group: usize,
}

/// Statistics produced by [`StatsAggregator::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunStatistics {
    pub total_energy_kwh: f64,
    pub theoretical_max_kw: f64,
    pub actual_max_kw: f64,
    pub concurrency_factor: f64,
    pub total_charging_events: u64,
    pub period_statistics: Vec<PeriodStatistic>,
    pub charger_statistics: Vec<ChargerTypeStatistic>,
}

/// Folds charging events into energy, period, charger-type, and
/// coincident-power statistics.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    calendar: Calendar,
    group_power: Vec<f64>,
    group_count: Vec<u32>,
    /// Distinct power ratings, ascending, with their totals.
    types: Vec<(f64, Totals)>,
    periods: BTreeMap<PeriodKey, Totals>,
    transitions: Vec<Transition>,
    total_energy_kwh: f64,
    total_events: u64,
}

impl StatsAggregator {
    pub fn new(chargers: &[ChargerSpec], calendar: Calendar) -> Self {
        let mut powers: Vec<f64> = chargers.iter().map(|c| c.power_kw).collect();
        powers.sort_by(f64::total_cmp);
        powers.dedup();

        Self {
            calendar,
            group_power: chargers.iter().map(|c| c.power_kw).collect(),
            group_count: chargers.iter().map(|c| c.count).collect(),
            types: powers.into_iter().map(|p| (p, Totals::default())).collect(),
            periods: BTreeMap::new(),
            transitions: Vec::new(),
            total_energy_kwh: 0.0,
            total_events: 0,
        }
    }

    /// Records a session on a charger of `group` running from `start` to `end`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimulationFault` if `start` has no local calendar date
    /// or `group` is unknown.
    pub fn record(
        &mut self,
        event: &ChargingEvent,
        group: usize,
        start: SimInstant,
        end: SimInstant,
    ) -> Result<(), SimError> {
        let describe = || format!("ChargingEvent(charger={}, at={start})", event.charger_index);

        if group >= self.group_power.len() {
            return Err(SimError::fault(describe(), format!("unknown charger group {group}")));
        }
        let keys = self
            .calendar
            .period_keys(start)
            .ok_or_else(|| SimError::fault(describe(), "start has no local calendar date"))?;

        for key in [
            PeriodKey::Day(keys.date),
            PeriodKey::Week(keys.iso_week),
            PeriodKey::Month(keys.month),
            PeriodKey::Year(keys.year),
        ] {
            self.periods.entry(key).or_default().add(event);
        }

        if let Some((_, totals)) = self
            .types
            .iter_mut()
            .find(|(p, _)| *p == event.charger_type_power_kw)
        {
            totals.add(event);
        }

        self.transitions.push(Transition {
            at: start,
            acquire: true,
            group,
        });
        self.transitions.push(Transition {
            at: end,
            acquire: false,
            group,
        });

        self.total_energy_kwh += event.energy_kwh;
        self.total_events += 1;
        Ok(())
    }

    /// Peak coincident power over all recorded sessions (kW).
    ///
    /// Sweeps transitions in time order with releases before acquisitions at
    /// equal instants. Power is summed per group from busy counts, in the same
    /// order as the installed total, so a fully busy depot reports exactly
    /// the installed power.
    pub fn coincident_peak_kw(&self) -> f64 {
        let mut order: Vec<&Transition> = self.transitions.iter().collect();
        order.sort_by_key(|t| (t.at, t.acquire));

        let mut busy = vec![0_u32; self.group_power.len()];
        let mut peak = 0.0_f64;
        for t in order {
            if t.acquire {
                busy[t.group] += 1;
                let power = self.coincident_kw(&busy);
                peak = peak.max(power);
            } else {
                busy[t.group] = busy[t.group].saturating_sub(1);
            }
        }
        peak
    }

    fn coincident_kw(&self, busy: &[u32]) -> f64 {
        self.group_power
            .iter()
            .zip(busy)
            .map(|(power, n)| power * f64::from(*n))
            .sum()
    }

    fn theoretical_max_kw(&self) -> f64 {
        self.group_power
            .iter()
            .zip(&self.group_count)
            .map(|(power, n)| power * f64::from(*n))
            .sum()
    }

    /// Produces the final statistics in their stable output order.
    pub fn finish(self) -> RunStatistics {
        let theoretical_max_kw = self.theoretical_max_kw();
        let actual_max_kw = self.coincident_peak_kw();
        let concurrency_factor = if theoretical_max_kw > 0.0 {
            actual_max_kw / theoretical_max_kw
        } else {
            0.0
        };

        let period_statistics = self
            .periods
            .iter()
            .map(|(key, totals)| PeriodStatistic {
                period_type: key.period_type(),
                period_value: key.value(),
                total_events: totals.events,
                total_power_kw: totals.power_kw,
            })
            .collect();

        let charger_statistics = self
            .types
            .iter()
            .map(|(power, totals)| ChargerTypeStatistic {
                charger_type_power_kw: *power,
                total_events: totals.events,
                total_power_kw: totals.power_kw,
                total_energy_kwh: totals.energy_kwh,
                avg_power_kw: if totals.events > 0 {
                    totals.power_kw / totals.events as f64
                } else {
                    0.0
                },
            })
            .collect();

        RunStatistics {
            total_energy_kwh: self.total_energy_kwh,
            theoretical_max_kw,
            actual_max_kw,
            concurrency_factor,
            total_charging_events: self.total_events,
            period_statistics,
            charger_statistics,
        }
    }
}
