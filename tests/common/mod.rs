//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use depot_sim::sim::engine::run_simulation;
use depot_sim::sim::types::{ChargerSpec, SimulationConfig, SimulationResult};

/// Small mixed depot at moderate demand with a fixed seed.
pub fn mixed_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        chargers: vec![
            ChargerSpec::new(11.0, 3),
            ChargerSpec::new(22.0, 2),
            ChargerSpec::new(50.0, 1),
        ],
        arrival_multiplier: 1.0,
        seed: Some(seed),
        ..SimulationConfig::default()
    }
}

/// One 11 kW charger under demand far above its capacity.
pub fn saturated_config(seed: u64) -> SimulationConfig {
    SimulationConfig {
        chargers: vec![ChargerSpec::new(11.0, 1)],
        arrival_multiplier: 20.0,
        seed: Some(seed),
        ..SimulationConfig::default()
    }
}

/// Runs `config`, panicking on any error.
pub fn run(config: &SimulationConfig) -> SimulationResult {
    run_simulation(config).expect("simulation should succeed")
}
