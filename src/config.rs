//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::sim::sweep::SweepRange;
use crate::sim::types::{ChargerSpec, SimulationConfig};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the `depot` preset. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or pick a built-in scenario with
/// [`ScenarioConfig::from_preset`].
///
/// ```toml
/// [simulation]
/// arrival_multiplier = 1.5
/// year = 2024
///
/// [[chargers]]
/// power_kw = 11.0
/// count = 5
///
/// [[chargers]]
/// power_kw = 50.0
/// count = 1
///
/// [sweep]
/// min = 1
/// max = 10
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Demand and calendar parameters.
    #[serde(default)]
    pub simulation: SimulationSection,
    /// Charger inventory, in instance-numbering order.
    #[serde(default = "default_chargers")]
    pub chargers: Vec<ChargerSpec>,
    /// Charger-count range for sweep runs.
    #[serde(default)]
    pub sweep: SweepRange,
}

/// Demand and calendar parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// Scales the hourly arrival-rate table (must be > 0).
    pub arrival_multiplier: f64,
    /// Vehicle consumption in kWh per 100 km (must be > 0).
    pub energy_per_km: f64,
    /// Calendar year to simulate.
    pub year: i32,
    /// Random seed; drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        let d = SimulationConfig::default();
        Self {
            arrival_multiplier: d.arrival_multiplier,
            energy_per_km: d.energy_per_km,
            year: d.year,
            seed: d.seed,
        }
    }
}

fn default_chargers() -> Vec<ChargerSpec> {
    SimulationConfig::default().chargers
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::depot()
    }
}

impl ScenarioConfig {
    /// Returns the default depot: 20 chargers of 11 kW at base demand.
    pub fn depot() -> Self {
        Self {
            simulation: SimulationSection::default(),
            chargers: default_chargers(),
            sweep: SweepRange::default(),
        }
    }

    /// Returns a mixed depot of AC and DC chargers.
    pub fn mixed() -> Self {
        Self {
            chargers: vec![
                ChargerSpec::new(11.0, 5),
                ChargerSpec::new(22.0, 3),
                ChargerSpec::new(50.0, 1),
            ],
            sweep: SweepRange::new(1, 10, 1),
            ..Self::depot()
        }
    }

    /// Returns a single charger under heavy demand, so it is busy at peak.
    pub fn saturated() -> Self {
        Self {
            simulation: SimulationSection {
                arrival_multiplier: 20.0,
                ..SimulationSection::default()
            },
            chargers: vec![ChargerSpec::new(11.0, 1)],
            sweep: SweepRange::new(1, 5, 1),
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["depot", "mixed", "saturated"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "depot" => Ok(Self::depot()),
            "mixed" => Ok(Self::mixed()),
            "saturated" => Ok(Self::saturated()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                "scenario",
                format!("cannot read \"{}\": {e}", path.display()),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Run configuration described by this scenario.
    pub fn to_simulation_config(&self) -> SimulationConfig {
        let s = &self.simulation;
        SimulationConfig {
            chargers: self.chargers.clone(),
            arrival_multiplier: s.arrival_multiplier,
            energy_per_km: s.energy_per_km,
            year: s.year,
            seed: s.seed,
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = self.to_simulation_config().validate();
        errors.extend(self.sweep.validate());
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depot_preset_valid() {
        let cfg = ScenarioConfig::depot();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "depot should be valid: {errors:?}");
        assert_eq!(cfg.to_simulation_config(), SimulationConfig::default());
    }

    #[test]
    fn from_preset_unknown() {
        let e = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
arrival_multiplier = 1.5
energy_per_km = 20.0
year = 2024
seed = 99

[[chargers]]
power_kw = 11.0
count = 5

[[chargers]]
power_kw = 50.0
count = 1

[sweep]
min = 2
max = 8
step = 2
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.year, 2024);
        assert_eq!(cfg.simulation.seed, Some(99));
        assert_eq!(
            cfg.chargers,
            vec![ChargerSpec::new(11.0, 5), ChargerSpec::new(50.0, 1)]
        );
        assert_eq!(cfg.sweep.counts(), vec![2, 4, 6, 8]);
        assert_eq!(cfg.to_simulation_config().theoretical_max_kw(), 105.0);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 7
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.simulation.seed, Some(7));
        assert_eq!(cfg.simulation.year, 2023);
        assert_eq!(cfg.chargers, vec![ChargerSpec::new(11.0, 20)]);
        assert_eq!(cfg.sweep, SweepRange::default());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[simulation]
year = 2023
bogus_field = true
"#;
        let err = ScenarioConfig::from_toml_str(toml).unwrap_err();
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn unknown_charger_field_is_rejected() {
        let toml = r#"
[[chargers]]
power_kw = 11.0
count = 2
connector = "type2"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_collects_every_error() {
        let mut cfg = ScenarioConfig::depot();
        cfg.simulation.year = 2100;
        cfg.simulation.energy_per_km = 0.0;
        cfg.chargers.clear();
        cfg.sweep.step = 0;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        for expected in ["chargers", "simulation.energy_per_km", "simulation.year", "sweep.step"] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}: {fields:?}");
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ScenarioConfig::from_toml_file(Path::new("/nonexistent/depot.toml")).unwrap_err();
        assert_eq!(err.field, "scenario");
        assert!(err.message.contains("depot.toml"));
    }
}
