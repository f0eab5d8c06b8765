//! Charger-count sweep: reruns the simulation for a range of depot sizes.
//!
//! Every point replaces the count of the first charger spec and keeps
//! everything else, including one seed shared by all points, so points differ
//! only in depot size.

use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, SimError};

use super::engine::run_simulation;
use super::types::{ChargerSpec, SimulationConfig, SimulationResult};

/// Inclusive range of charger counts, `min, min + step, ... <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SweepRange {
    pub min: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for SweepRange {
    fn default() -> Self {
        Self {
            min: 1,
            max: 30,
            step: 1,
        }
    }
}

impl SweepRange {
    pub fn new(min: u32, max: u32, step: u32) -> Self {
        Self { min, max, step }
    }

    /// Returns every violated constraint.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for (field, value) in [("min", self.min), ("max", self.max), ("step", self.step)] {
            if value < 1 {
                errors.push(ConfigError::new(format!("sweep.{field}"), "must be >= 1"));
            }
        }
        if self.min > self.max {
            errors.push(ConfigError::new(
                "sweep.min",
                format!("must be <= sweep.max ({}), got {}", self.max, self.min),
            ));
        }
        errors
    }

    /// Charger counts covered by the range, ascending.
    ///
    /// # Examples
    ///
    /// ```
    /// use depot_sim::sim::sweep::SweepRange;
    ///
    /// assert_eq!(SweepRange::new(1, 5, 2).counts(), vec![1, 3, 5]);
    /// assert_eq!(SweepRange::new(2, 7, 3).counts(), vec![2, 5]);
    /// ```
    pub fn counts(&self) -> Vec<u32> {
        if self.step == 0 || self.min > self.max {
            return Vec::new();
        }
        (self.min..=self.max).step_by(self.step as usize).collect()
    }
}

/// Cooperative cancellation flag, checked between sweep points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one sweep point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PointOutcome {
    Completed(Box<SimulationResult>),
    Faulted { error: String },
}

/// One tested depot size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepPoint {
    /// Count given to the first charger spec.
    pub charger_count: u32,
    /// Full inventory used for this point.
    pub chargers: Vec<ChargerSpec>,
    pub outcome: PointOutcome,
}

impl SweepPoint {
    pub fn result(&self) -> Option<&SimulationResult> {
        match &self.outcome {
            PointOutcome::Completed(result) => Some(result),
            PointOutcome::Faulted { .. } => None,
        }
    }
}

/// Sweep points ordered by ascending charger count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// Seed shared by every point.
    pub seed: u64,
    pub range: SweepRange,
    pub points: Vec<SweepPoint>,
    /// Stopped early; `points` is the completed ascending prefix.
    pub cancelled: bool,
}

/// Per-point configurations after validation and seed resolution.
fn plan(
    base: &SimulationConfig,
    range: SweepRange,
) -> Result<(u64, Vec<SimulationConfig>), SimError> {
    let mut errors = range.validate();
    errors.extend(base.validate());
    if !errors.is_empty() {
        return Err(SimError::InvalidConfiguration(errors));
    }

    let seed = base.seed.unwrap_or_else(|| rand::rng().random());
    let configs = range
        .counts()
        .into_iter()
        .map(|count| {
            let mut config = base.clone();
            config.seed = Some(seed);
            if let Some(first) = config.chargers.first_mut() {
                first.count = count;
            }
            config
        })
        .collect();
    Ok((seed, configs))
}

fn run_point(config: &SimulationConfig) -> SweepPoint {
    let charger_count = config.chargers.first().map_or(0, |c| c.count);
    let outcome = match run_simulation(config) {
        Ok(result) => {
            info!(
                chargers = charger_count,
                actual_max_kw = result.actual_max_kw,
                theoretical_max_kw = result.theoretical_max_kw,
                concurrency = result.concurrency_factor,
                rejected = result.rejected_arrivals,
                "sweep point finished"
            );
            PointOutcome::Completed(Box::new(result))
        }
        Err(e) => {
            warn!(chargers = charger_count, error = %e, "sweep point failed");
            PointOutcome::Faulted {
                error: e.to_string(),
            }
        }
    };
    SweepPoint {
        charger_count,
        chargers: config.chargers.clone(),
        outcome,
    }
}

/// Runs every sweep point in order on the calling thread.
///
/// # Errors
///
/// Returns `SimError::InvalidConfiguration` if the range or base configuration
/// is rejected. Failures of single points are recorded in the report.
///
/// # Examples
///
/// ```
/// use depot_sim::sim::sweep::{CancelToken, SweepRange, run_sweep};
/// use depot_sim::sim::types::{ChargerSpec, SimulationConfig};
///
/// let base = SimulationConfig {
///     chargers: vec![ChargerSpec::new(11.0, 1)],
///     arrival_multiplier: 0.05,
///     seed: Some(1),
///     ..SimulationConfig::default()
/// };
/// let report = run_sweep(&base, SweepRange::new(1, 3, 2), &CancelToken::new()).unwrap();
/// let counts: Vec<u32> = report.points.iter().map(|p| p.charger_count).collect();
/// assert_eq!(counts, vec![1, 3]);
/// ```
pub fn run_sweep(
    base: &SimulationConfig,
    range: SweepRange,
    cancel: &CancelToken,
) -> Result<SweepReport, SimError> {
    run_sweep_with(base, range, cancel, |_| {})
}

/// Same as [`run_sweep`], calling `on_point` after each finished point.
///
/// # Errors
///
/// Same as [`run_sweep`].
pub fn run_sweep_with(
    base: &SimulationConfig,
    range: SweepRange,
    cancel: &CancelToken,
    mut on_point: impl FnMut(&SweepPoint),
) -> Result<SweepReport, SimError> {
    let (seed, configs) = plan(base, range)?;

    let mut points = Vec::with_capacity(configs.len());
    let mut cancelled = false;
    for config in &configs {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let point = run_point(config);
        on_point(&point);
        points.push(point);
    }

    Ok(SweepReport {
        seed,
        range,
        points,
        cancelled,
    })
}

/// Runs sweep points on up to `workers` scoped threads.
///
/// Workers pull points from a shared cursor; the report is ordered by count
/// regardless of completion order. After cancellation only the contiguous
/// prefix of completed points is reported.
///
/// # Errors
///
/// Same as [`run_sweep`].
pub fn run_sweep_parallel(
    base: &SimulationConfig,
    range: SweepRange,
    workers: usize,
    cancel: &CancelToken,
) -> Result<SweepReport, SimError> {
    run_sweep_parallel_with(base, range, workers, cancel, |_| {})
}

/// Same as [`run_sweep_parallel`], calling `on_point` on the worker thread
/// after each finished point.
///
/// Points finished by a worker stay in the report even if that worker panics
/// later; a point lost to a panic is reported as faulted.
///
/// # Errors
///
/// Same as [`run_sweep`].
pub fn run_sweep_parallel_with(
    base: &SimulationConfig,
    range: SweepRange,
    workers: usize,
    cancel: &CancelToken,
    on_point: impl Fn(&SweepPoint) + Sync,
) -> Result<SweepReport, SimError> {
    let (seed, configs) = plan(base, range)?;
    let workers = workers.clamp(1, configs.len().max(1));
    let cursor = AtomicUsize::new(0);
    let finished = Mutex::new(Vec::with_capacity(configs.len()));

    let worker = || {
        while !cancel.is_cancelled() {
            let i = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(config) = configs.get(i) else {
                break;
            };
            let point = run_point(config);
            finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((i, point.clone()));
            on_point(&point);
        }
    };

    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(scope.spawn(&worker));
        }
        for handle in handles {
            if handle.join().is_err() {
                warn!("sweep worker panicked");
            }
        }
    });

    let mut slots: Vec<Option<SweepPoint>> = vec![None; configs.len()];
    let finished = finished.into_inner().unwrap_or_else(PoisonError::into_inner);
    for (i, point) in finished {
        slots[i] = Some(point);
    }

    let cancelled = cancel.is_cancelled() && slots.iter().any(Option::is_none);
    let points = if cancelled {
        slots.into_iter().map_while(|slot| slot).collect()
    } else {
        slots
            .into_iter()
            .zip(&configs)
            .map(|(slot, config)| {
                slot.unwrap_or_else(|| {
                    let charger_count = config.chargers.first().map_or(0, |c| c.count);
                    warn!(chargers = charger_count, "sweep point lost to a worker panic");
                    SweepPoint {
                        charger_count,
                        chargers: config.chargers.clone(),
                        outcome: PointOutcome::Faulted {
                            error: "sweep worker panicked".to_string(),
                        },
                    }
                })
            })
            .collect()
    };

    Ok(SweepReport {
        seed,
        range,
        points,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SimulationConfig {
        SimulationConfig {
            chargers: vec![ChargerSpec::new(11.0, 1), ChargerSpec::new(50.0, 1)],
            arrival_multiplier: 0.2,
            seed: Some(9),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn counts_follow_min_max_step() {
        assert_eq!(SweepRange::new(1, 5, 2).counts(), vec![1, 3, 5]);
        assert_eq!(SweepRange::new(3, 3, 1).counts(), vec![3]);
        assert_eq!(SweepRange::new(1, 6, 2).counts(), vec![1, 3, 5]);
        assert!(SweepRange::new(4, 2, 1).counts().is_empty());
    }

    #[test]
    fn malformed_range_is_rejected() {
        let errors = SweepRange::new(0, 5, 0).validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["sweep.min", "sweep.step"]);
        assert_eq!(SweepRange::new(6, 5, 1).validate().len(), 1);
        assert!(SweepRange::default().validate().is_empty());

        let err = run_sweep(&base(), SweepRange::new(5, 1, 1), &CancelToken::new()).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn points_vary_only_the_first_spec() {
        let report = run_sweep(&base(), SweepRange::new(1, 3, 1), &CancelToken::new()).unwrap();
        assert_eq!(report.seed, 9);
        assert!(!report.cancelled);
        for (point, count) in report.points.iter().zip(1..) {
            assert_eq!(point.charger_count, count);
            assert_eq!(point.chargers[0], ChargerSpec::new(11.0, count));
            assert_eq!(point.chargers[1], ChargerSpec::new(50.0, 1));
            assert_eq!(point.result().unwrap().seed, 9);
        }
    }

    #[test]
    fn cancelled_before_start_reports_nothing() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let report = run_sweep(&base(), SweepRange::new(1, 3, 1), &cancel).unwrap();
        assert!(report.cancelled);
        assert!(report.points.is_empty());
    }

    #[test]
    fn parallel_matches_sequential() {
        let range = SweepRange::new(1, 4, 1);
        let seq = run_sweep(&base(), range, &CancelToken::new()).unwrap();
        let par = run_sweep_parallel(&base(), range, 3, &CancelToken::new()).unwrap();
        assert_eq!(seq, par);
    }

    #[test]
    fn worker_panic_keeps_finished_points() {
        let range = SweepRange::new(1, 4, 1);
        let seq = run_sweep(&base(), range, &CancelToken::new()).unwrap();
        let par = run_sweep_parallel_with(&base(), range, 2, &CancelToken::new(), |point| {
            if point.charger_count == 2 {
                panic!("observer failure");
            }
        })
        .unwrap();
        assert!(!par.cancelled);
        assert_eq!(par.points, seq.points);
    }

    #[test]
    fn unsupported_year_fails_before_any_point() {
        let config = SimulationConfig {
            year: 1900,
            ..base()
        };
        let mut ran = 0;
        let err = run_sweep_with(&config, SweepRange::new(1, 3, 1), &CancelToken::new(), |_| {
            ran += 1;
        })
        .unwrap_err();
        assert!(err.is_invalid_configuration());
        assert!(err.to_string().contains("simulation.year"));
        assert_eq!(ran, 0);
    }

    #[test]
    fn missing_seed_is_shared_by_all_points() {
        let config = SimulationConfig {
            seed: None,
            ..base()
        };
        let report = run_sweep(&config, SweepRange::new(1, 2, 1), &CancelToken::new()).unwrap();
        assert!(
            report
                .points
                .iter()
                .all(|p| p.result().map(|r| r.seed) == Some(report.seed))
        );
    }
}
