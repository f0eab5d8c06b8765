//! EV depot charging simulator.
//!
//! Simulates one calendar year of electric vehicles arriving at a depot with
//! a fixed pool of chargers and reports delivered energy, peak coincident
//! power, and the concurrency factor, optionally across a range of depot
//! sizes.

/// Local wall-clock time and DST for the simulated year.
pub mod calendar;
pub mod cli;
pub mod config;
/// Arrival process and per-vehicle charging demand.
pub mod demand;
pub mod error;
pub mod io;
/// Event engine, charger pool, statistics, and sweeps.
pub mod sim;

pub use error::{ConfigError, SimError};
