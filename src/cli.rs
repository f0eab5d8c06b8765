//! Command-line options and how they override a scenario.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ScenarioConfig;
use crate::error::ConfigError;
use crate::sim::sweep::SweepRange;
use crate::sim::types::ChargerSpec;

/// EV depot charging simulator.
///
/// Simulates one calendar year of vehicles arriving at a depot and reports
/// energy delivered, peak coincident power, and the concurrency factor.
#[derive(Debug, Clone, Parser)]
#[command(name = "depot-sim", author, version)]
#[command(after_help = "Examples:\n  \
    depot-sim --chargers 5x11,3x22,1x50 -m 1.5 -s 42\n  \
    depot-sim --preset saturated --events-csv events.csv\n  \
    depot-sim --quick_test --test-min 1 --test-max 5 --test-step 2 --workers 4")]
pub struct Cli {
    /// Load scenario from TOML config file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Use a built-in preset (depot, mixed, saturated)
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Charger inventory, e.g. 5x11,3x22,1x50 (count x kW)
    #[arg(long, value_name = "NxP[,NxP...]")]
    pub chargers: Option<String>,

    /// Arrival-rate multiplier
    #[arg(short = 'm', long = "mult", value_name = "FACTOR")]
    pub multiplier: Option<f64>,

    /// Random seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Calendar year to simulate
    #[arg(long)]
    pub year: Option<i32>,

    /// Vehicle consumption in kWh per 100 km
    #[arg(long, value_name = "KWH")]
    pub consumption: Option<f64>,

    /// Write the JSON result to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Sweep the count of the first charger type
    #[arg(long = "quick_test", visible_alias = "quick-test")]
    pub quick_test: bool,

    /// Smallest charger count in the sweep
    #[arg(long = "test-min", value_name = "N")]
    pub test_min: Option<u32>,

    /// Largest charger count in the sweep
    #[arg(long = "test-max", value_name = "N")]
    pub test_max: Option<u32>,

    /// Charger count increment in the sweep
    #[arg(long = "test-step", value_name = "N")]
    pub test_step: Option<u32>,

    /// Export charging events to CSV
    #[arg(long = "events-csv", value_name = "PATH")]
    pub events_csv: Option<PathBuf>,

    /// Worker threads for the sweep
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub workers: usize,
}

impl Cli {
    /// Builds the scenario: `--scenario` file, else `--preset`, else the
    /// default depot, then applies every command-line override.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the scenario cannot be loaded or `--chargers`
    /// is malformed. Range checks are left to [`ScenarioConfig::validate`].
    pub fn load_scenario(&self) -> Result<ScenarioConfig, ConfigError> {
        let mut scenario = match (&self.scenario, &self.preset) {
            (Some(path), _) => ScenarioConfig::from_toml_file(path)?,
            (None, Some(name)) => ScenarioConfig::from_preset(name)?,
            (None, None) => ScenarioConfig::default(),
        };

        if let Some(text) = &self.chargers {
            scenario.chargers = ChargerSpec::parse_list(text)?;
        }
        let sim = &mut scenario.simulation;
        if let Some(m) = self.multiplier {
            sim.arrival_multiplier = m;
        }
        if let Some(seed) = self.seed {
            sim.seed = Some(seed);
        }
        if let Some(year) = self.year {
            sim.year = year;
        }
        if let Some(c) = self.consumption {
            sim.energy_per_km = c;
        }

        scenario.sweep = self.sweep_range(scenario.sweep);
        Ok(scenario)
    }

    /// `base` with the `--test-*` flags applied.
    pub fn sweep_range(&self, base: SweepRange) -> SweepRange {
        SweepRange {
            min: self.test_min.unwrap_or(base.min),
            max: self.test_max.unwrap_or(base.max),
            step: self.test_step.unwrap_or(base.step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("depot-sim").chain(args.iter().copied()))
            .expect("parse should succeed")
    }

    #[test]
    fn defaults_give_the_depot_preset() {
        let cli = parse(&[]);
        assert!(!cli.quick_test);
        assert_eq!(cli.workers, 1);
        assert_eq!(cli.load_scenario().unwrap(), ScenarioConfig::depot());
    }

    #[test]
    fn flags_override_the_preset() {
        let cli = parse(&[
            "--preset", "mixed", "--chargers", "2x22", "-m", "2.5", "-s", "42", "--year", "2024",
            "--consumption", "20",
        ]);
        let scenario = cli.load_scenario().unwrap();
        assert_eq!(scenario.chargers, vec![ChargerSpec::new(22.0, 2)]);
        assert_eq!(scenario.simulation.arrival_multiplier, 2.5);
        assert_eq!(scenario.simulation.seed, Some(42));
        assert_eq!(scenario.simulation.year, 2024);
        assert_eq!(scenario.simulation.energy_per_km, 20.0);
    }

    #[test]
    fn quick_test_accepts_both_spellings() {
        assert!(parse(&["--quick_test"]).quick_test);
        assert!(parse(&["--quick-test"]).quick_test);
    }

    #[test]
    fn test_flags_override_the_sweep_range() {
        let cli = parse(&["--quick_test", "--test-min", "1", "--test-max", "5", "--test-step", "2"]);
        let scenario = cli.load_scenario().unwrap();
        assert_eq!(scenario.sweep.counts(), vec![1, 3, 5]);
    }

    #[test]
    fn scenario_and_preset_are_exclusive() {
        let err = Cli::try_parse_from(["depot-sim", "--scenario", "a.toml", "--preset", "mixed"]);
        assert!(err.is_err());
    }

    #[test]
    fn malformed_chargers_are_a_config_error() {
        let err = parse(&["--chargers", "5x"]).load_scenario().unwrap_err();
        assert_eq!(err.field, "chargers");
    }
}
