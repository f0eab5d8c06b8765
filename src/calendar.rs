//! Calendar and daylight-saving resolution for the simulated year.
//!
//! Simulated time runs on [`SimInstant`], an absolute millisecond counter
//! starting at local midnight on 1 January. Arrival intensity and period
//! bucketing both work in local wall-clock time of the depot's reference
//! timezone, so every conversion goes through [`Calendar`].

use std::ops::RangeInclusive;

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta, TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;

use crate::error::ConfigError;
use crate::sim::types::{MS_PER_HOUR, SimInstant};

/// Timezone the depot operates in.
pub const REFERENCE_TZ: Tz = chrono_tz::Europe::Berlin;

/// Years with daylight-saving rules available for [`REFERENCE_TZ`].
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 1980..=2037;

/// Local calendar keys of one instant, used for period bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodKeys {
    pub date: NaiveDate,
    pub iso_week: u32,
    pub month: u32,
    pub year: i32,
}

/// Local dates on which the clock jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstTransitions {
    /// Day with 23 local hours.
    pub spring_forward: Option<NaiveDate>,
    /// Day with 25 local hours.
    pub fall_back: Option<NaiveDate>,
}

/// Maps simulated instants of one year to local wall-clock time.
#[derive(Debug, Clone)]
pub struct Calendar {
    year: i32,
    start_utc: DateTime<Utc>,
    horizon: SimInstant,
}

/// Rejects years outside [`SUPPORTED_YEARS`].
///
/// # Errors
///
/// Returns a `ConfigError` on field `simulation.year`.
pub fn check_year(year: i32) -> Result<(), ConfigError> {
    if SUPPORTED_YEARS.contains(&year) {
        return Ok(());
    }
    Err(ConfigError::new(
        "simulation.year",
        format!(
            "must be within {}..={}, got {year}",
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        ),
    ))
}

impl Calendar {
    /// Creates the calendar for `year`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `year` is outside [`SUPPORTED_YEARS`].
    pub fn new(year: i32) -> Result<Self, ConfigError> {
        check_year(year)?;

        let start_utc = local_midnight_utc(year, 1, 1)?;
        let end_utc = local_midnight_utc(year + 1, 1, 1)?;
        let span_ms = (end_utc - start_utc).num_milliseconds();
        let horizon = u64::try_from(span_ms)
            .map(SimInstant::from_millis)
            .map_err(|_| ConfigError::new("simulation.year", "calendar year has no length"))?;

        Ok(Self {
            year,
            start_utc,
            horizon,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// UTC instant of local midnight on 1 January.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start_utc
    }

    /// Length of the simulated year; arrivals are generated in `[0, horizon)`.
    pub fn horizon(&self) -> SimInstant {
        self.horizon
    }

    /// Number of whole absolute hours in the year (8760 or 8784).
    pub fn hours_in_year(&self) -> usize {
        (self.horizon.as_millis() / MS_PER_HOUR) as usize
    }

    /// Local wall-clock time of `instant`, or `None` if it is not representable.
    pub fn local(&self, instant: SimInstant) -> Option<DateTime<Tz>> {
        let ms = i64::try_from(instant.as_millis()).ok()?;
        let delta = TimeDelta::try_milliseconds(ms)?;
        let utc = self.start_utc.checked_add_signed(delta)?;
        Some(utc.with_timezone(&REFERENCE_TZ))
    }

    /// Local wall-clock time of `instant` with its UTC offset.
    pub fn local_time(&self, instant: SimInstant) -> Option<DateTime<FixedOffset>> {
        self.local(instant).map(|t| t.fixed_offset())
    }

    /// Local hour of day (0-23) and weekday of `instant`.
    pub fn local_hour_and_weekday(&self, instant: SimInstant) -> Option<(u32, Weekday)> {
        self.local(instant).map(|t| (t.hour(), t.weekday()))
    }

    /// Local calendar keys of `instant`.
    pub fn period_keys(&self, instant: SimInstant) -> Option<PeriodKeys> {
        let date = self.local(instant)?.date_naive();
        Some(PeriodKeys {
            date,
            iso_week: date.iso_week().week(),
            month: date.month(),
            year: date.year(),
        })
    }

    /// Evaluates `rate(local_hour, weekday)` once per absolute hour of the year.
    ///
    /// The reference timezone only shifts by whole hours on hour boundaries,
    /// so the result is exact for a rate that is constant within a local hour.
    pub fn hourly_profile(&self, mut rate: impl FnMut(u32, Weekday) -> f64) -> Vec<f64> {
        (0..self.hours_in_year() as u64)
            .map(|h| {
                self.local_hour_and_weekday(SimInstant::from_millis(h * MS_PER_HOUR))
                    .map_or(0.0, |(hour, weekday)| rate(hour, weekday))
            })
            .collect()
    }

    /// Local length of `date` in hours (23, 24, or 25).
    pub fn day_length_hours(&self, date: NaiveDate) -> Option<i64> {
        let next = date.succ_opt()?;
        let start = local_midnight_utc(date.year(), date.month(), date.day()).ok()?;
        let end = local_midnight_utc(next.year(), next.month(), next.day()).ok()?;
        Some((end - start).num_hours())
    }

    /// Finds the spring-forward and fall-back dates of the year.
    pub fn dst_transitions(&self) -> DstTransitions {
        let mut transitions = DstTransitions {
            spring_forward: None,
            fall_back: None,
        };
        let Some(first) = NaiveDate::from_ymd_opt(self.year, 1, 1) else {
            return transitions;
        };
        for date in first.iter_days().take_while(|d| d.year() == self.year) {
            match self.day_length_hours(date) {
                Some(23) => transitions.spring_forward = Some(date),
                Some(25) => transitions.fall_back = Some(date),
                _ => {}
            }
        }
        transitions
    }
}

fn local_midnight_utc(year: i32, month: u32, day: u32) -> Result<DateTime<Utc>, ConfigError> {
    REFERENCE_TZ
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| {
            ConfigError::new(
                "simulation.year",
                format!("local midnight of {year}-{month:02}-{day:02} is not unique"),
            )
        })
}
