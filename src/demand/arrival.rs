use chrono::Weekday;
use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::calendar::Calendar;
use crate::error::ConfigError;
use crate::sim::types::{MS_PER_HOUR, SimInstant, millis_ceil};

/// Vehicles per hour arriving on Monday to Friday at multiplier 1.0,
/// indexed by local hour of day. Sums to about 100 vehicles per day.
pub const WEEKDAY_RATE_PER_HOUR: [f64; 24] = [
    0.94, 0.94, 0.94, 0.94, 0.94, 0.94, 0.94, 0.94, // 00-08
    2.83, 2.83, // 08-10
    5.66, 5.66, 5.66, // 10-13
    7.55, 7.55, 7.55, // 13-16
    10.38, 10.38, 10.38, // 16-19
    4.72, 4.72, 4.72, // 19-22
    0.94, 0.94, // 22-24
];

/// Vehicles per hour arriving on Saturday and Sunday at multiplier 1.0.
/// Flatter than the weekday curve, about 66 vehicles per day.
pub const WEEKEND_RATE_PER_HOUR: [f64; 24] = [
    0.94, 0.94, 0.94, 0.94, 0.94, 0.94, 0.94, 0.94, // 00-08
    1.42, 1.42, // 08-10
    3.77, 3.77, 3.77, // 10-13
    4.72, 4.72, 4.72, // 13-16
    5.66, 5.66, 5.66, // 16-19
    3.77, 3.77, 3.77, // 19-22
    0.94, 0.94, // 22-24
];

/// Base arrival intensity (vehicles per hour) for a local hour and weekday.
pub fn base_rate(hour: u32, weekday: Weekday) -> f64 {
    let table = match weekday {
        Weekday::Sat | Weekday::Sun => &WEEKEND_RATE_PER_HOUR,
        _ => &WEEKDAY_RATE_PER_HOUR,
    };
    table.get(hour as usize).copied().unwrap_or(0.0)
}

/// Inhomogeneous Poisson arrival process over one simulated year.
///
/// Candidates come from a homogeneous process at the peak rate and are kept
/// with probability `rate(t) / peak` (thinning). Each candidate consumes two
/// draws from the caller's generator: the exponential gap, then the
/// acceptance uniform. Instants are whole milliseconds and strictly
/// increasing; the process ends for good once a candidate reaches the
/// horizon.
#[derive(Debug, Clone)]
pub struct ArrivalProcess {
    /// Arrival rate per absolute hour of the year, multiplier applied.
    rates: Vec<f64>,
    peak_rate: f64,
    gap: Exp<f64>,
    cursor: SimInstant,
    horizon: SimInstant,
    exhausted: bool,
}

impl ArrivalProcess {
    /// Builds the process for the calendar year scaled by `multiplier`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the scaled peak rate is not a finite value > 0.
    pub fn new(calendar: &Calendar, multiplier: f64) -> Result<Self, ConfigError> {
        let rates = calendar.hourly_profile(|hour, weekday| base_rate(hour, weekday) * multiplier);
        let peak_rate = rates.iter().copied().fold(0.0_f64, f64::max);
        let invalid = || {
            ConfigError::new(
                "simulation.arrival_multiplier",
                format!("scaled peak arrival rate must be finite and > 0, got {peak_rate}"),
            )
        };
        if !(peak_rate.is_finite() && peak_rate > 0.0) {
            return Err(invalid());
        }
        let gap = Exp::new(peak_rate).map_err(|_| invalid())?;

        Ok(Self {
            rates,
            peak_rate,
            gap,
            cursor: SimInstant::ZERO,
            horizon: calendar.horizon(),
            exhausted: false,
        })
    }

    /// Arrival rate (vehicles per hour) in effect at `instant`.
    pub fn rate_at(&self, instant: SimInstant) -> f64 {
        let hour = (instant.as_millis() / MS_PER_HOUR) as usize;
        self.rates.get(hour).copied().unwrap_or(0.0)
    }

    /// Rate of the candidate process used for thinning.
    pub fn peak_rate(&self) -> f64 {
        self.peak_rate
    }

    /// Expected number of arrivals over the whole year.
    pub fn expected_arrivals(&self) -> f64 {
        self.rates.iter().sum()
    }

    /// Draws the next arrival, or `None` once the year is over.
    pub fn next_arrival<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<SimInstant> {
        while !self.exhausted {
            let gap_hours = self.gap.sample(rng);
            let accept: f64 = rng.random();

            let candidate = self.cursor.plus_millis(millis_ceil(gap_hours).max(1));
            if candidate >= self.horizon {
                self.exhausted = true;
                break;
            }
            self.cursor = candidate;

            if accept * self.peak_rate < self.rate_at(candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Drains the process into an iterator bound to `rng`.
    pub fn arrivals<'a, R: Rng + ?Sized>(
        &'a mut self,
        rng: &'a mut R,
    ) -> impl Iterator<Item = SimInstant> + 'a {
        std::iter::from_fn(move || self.next_arrival(rng))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn process(multiplier: f64) -> ArrivalProcess {
        let cal = Calendar::new(2023).unwrap();
        ArrivalProcess::new(&cal, multiplier).unwrap()
    }

    #[test]
    fn weekday_table_sums_to_about_one_hundred() {
        let total: f64 = WEEKDAY_RATE_PER_HOUR.iter().sum();
        assert!((total - 100.0).abs() < 0.1, "total = {total}");
        assert!(WEEKEND_RATE_PER_HOUR.iter().sum::<f64>() < total);
    }

    #[test]
    fn base_rate_peaks_in_the_late_afternoon() {
        assert_eq!(base_rate(17, Weekday::Wed), 10.38);
        assert_eq!(base_rate(3, Weekday::Wed), 0.94);
        assert_eq!(base_rate(17, Weekday::Sun), 5.66);
        assert_eq!(base_rate(24, Weekday::Mon), 0.0);
    }

    #[test]
    fn arrivals_are_strictly_increasing_and_inside_the_year() {
        let mut p = process(1.0);
        let horizon = p.horizon;
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let arrivals: Vec<SimInstant> = p.arrivals(&mut rng).collect();
        assert!(!arrivals.is_empty());
        assert!(arrivals.windows(2).all(|w| w[0] < w[1]));
        assert!(arrivals.iter().all(|t| *t < horizon));
    }

    #[test]
    fn arrival_count_tracks_expected_volume() {
        let mut p = process(1.0);
        let expected = p.expected_arrivals();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = p.arrivals(&mut rng).count() as f64;
        // Poisson with mean ~33k: five standard deviations is under 1000.
        assert!((n - expected).abs() < 5.0 * expected.sqrt(), "n={n} expected={expected}");
    }

    #[test]
    fn exhausted_process_stays_exhausted() {
        let mut p = process(1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        while p.next_arrival(&mut rng).is_some() {}
        assert!(p.next_arrival(&mut rng).is_none());
    }

    #[test]
    fn same_seed_same_instants() {
        let mut a = process(2.0);
        let mut b = process(2.0);
        let mut rng_a = ChaCha8Rng::seed_from_u64(99);
        let mut rng_b = ChaCha8Rng::seed_from_u64(99);
        let xs: Vec<_> = a.arrivals(&mut rng_a).take(500).collect();
        let ys: Vec<_> = b.arrivals(&mut rng_b).take(500).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn night_hours_see_fewer_arrivals_than_evening_peak() {
        let cal = Calendar::new(2023).unwrap();
        let mut p = ArrivalProcess::new(&cal, 1.0).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut night = 0;
        let mut peak = 0;
        for t in p.arrivals(&mut rng) {
            match cal.local_hour_and_weekday(t).map(|h| h.0) {
                Some(2) => night += 1,
                Some(17) => peak += 1,
                _ => {}
            }
        }
        assert!(peak > 5 * night, "peak={peak} night={night}");
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let cal = Calendar::new(2023).unwrap();
        assert!(ArrivalProcess::new(&cal, 0.0).is_err());
        assert!(ArrivalProcess::new(&cal, f64::INFINITY).is_err());
    }
}
