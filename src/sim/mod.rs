/// Event queue and simulated time.
pub mod clock;
pub mod engine;
/// Arrival and departure events.
pub mod event;
/// Charger inventory and assignment policy.
pub mod pool;
pub mod stats;
pub mod sweep;
pub mod types;

pub use engine::{Engine, run_simulation};
pub use sweep::{
    CancelToken, SweepRange, SweepReport, run_sweep, run_sweep_parallel, run_sweep_parallel_with,
    run_sweep_with,
};
