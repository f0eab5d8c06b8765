//! Error types shared by configuration, calendar, and simulation code.

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field} — {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.year"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    /// The configuration was rejected before any event was processed.
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfiguration(Vec<ConfigError>),

    /// An internal invariant broke while processing `event`.
    #[error("simulation fault while processing {event}: {message}")]
    SimulationFault { event: String, message: String },
}

impl SimError {
    pub(crate) fn fault(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SimulationFault {
            event: event.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_invalid_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfiguration(vec![err])
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
