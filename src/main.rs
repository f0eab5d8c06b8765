//! Depot simulator entry point: CLI wiring and scenario-driven runs.

use std::fmt;
use std::io;
use std::process;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use depot_sim::calendar::Calendar;
use depot_sim::cli::Cli;
use depot_sim::config::ScenarioConfig;
use depot_sim::io::export::{export_events_csv, export_json, write_json};
use depot_sim::sim::engine::run_simulation;
use depot_sim::sim::sweep::{CancelToken, SweepReport, run_sweep, run_sweep_parallel};
use depot_sim::sim::types::SimulationResult;

fn exit_with(e: impl fmt::Display) -> ! {
    eprintln!("error: {e}");
    process::exit(1);
}

/// Writes `value` to `--output` if given, else to stdout.
fn emit<T: serde::Serialize>(cli: &Cli, value: &T) {
    let written = match &cli.output {
        Some(path) => export_json(value, path).map(|()| {
            info!(path = %path.display(), "results written");
        }),
        None => write_json(value, io::stdout().lock()),
    };
    if let Err(e) = written {
        exit_with(format_args!("failed to write results: {e}"));
    }
}

fn run_single(cli: &Cli, scenario: &ScenarioConfig) -> SimulationResult {
    let result = run_simulation(&scenario.to_simulation_config()).unwrap_or_else(|e| exit_with(e));

    if let Some(path) = &cli.events_csv {
        if let Err(e) = export_events_csv(&result.charging_events, path) {
            exit_with(format_args!("failed to write CSV: {e}"));
        }
        info!(path = %path.display(), events = result.charging_events.len(), "events written");
    }
    result
}

fn run_quick_test(cli: &Cli, scenario: &ScenarioConfig) -> SweepReport {
    if cli.events_csv.is_some() {
        warn!("--events-csv is ignored in sweep mode");
    }
    let base = scenario.to_simulation_config();
    let cancel = CancelToken::new();
    let report = if cli.workers > 1 {
        run_sweep_parallel(&base, scenario.sweep, cli.workers, &cancel)
    } else {
        run_sweep(&base, scenario.sweep, &cancel)
    };
    report.unwrap_or_else(|e| exit_with(e))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let scenario = cli.load_scenario().unwrap_or_else(|e| exit_with(e));

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let sim = &scenario.simulation;
    if let Ok(calendar) = Calendar::new(sim.year) {
        let dst = calendar.dst_transitions();
        info!(
            year = sim.year,
            spring_forward = ?dst.spring_forward,
            fall_back = ?dst.fall_back,
            "calendar resolved"
        );
    }
    info!(
        chargers = %scenario
            .chargers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","),
        multiplier = sim.arrival_multiplier,
        year = sim.year,
        "starting simulation"
    );

    if cli.quick_test {
        let report = run_quick_test(&cli, &scenario);
        emit(&cli, &report);
    } else {
        let result = run_single(&cli, &scenario);
        if cli.output.is_some() {
            println!("{result}");
        }
        emit(&cli, &result);
    }
}
