//! Charger pool and the assignment policy.
//!
//! Each charger is either idle or busy until a committed departure instant.
//! An arriving vehicle gets the lowest-indexed idle charger of the requested
//! power rating, else the lowest-indexed idle charger of any rating, else it
//! is turned away. There is no waiting room.

use crate::error::SimError;

use super::types::{ChargerSpec, SimInstant, millis_ceil};

/// One physical charger.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargerInstance {
    /// Power rating (kW).
    pub power_kw: f64,
    /// Index of the spec this charger was built from.
    pub group: usize,
    busy_until: Option<SimInstant>,
}

impl ChargerInstance {
    pub fn is_idle(&self) -> bool {
        self.busy_until.is_none()
    }

    pub fn busy_until(&self) -> Option<SimInstant> {
        self.busy_until
    }
}

/// Outcome of a successful assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub charger: usize,
    pub group: usize,
    pub power_kw: f64,
    pub busy_until: SimInstant,
    /// The charger's rating differs from the requested one.
    pub fallback: bool,
}

/// Fixed set of chargers, numbered spec by spec in configuration order.
#[derive(Debug, Clone)]
pub struct ChargerPool {
    chargers: Vec<ChargerInstance>,
}

impl ChargerPool {
    pub fn new(specs: &[ChargerSpec]) -> Self {
        let chargers = specs
            .iter()
            .enumerate()
            .flat_map(|(group, spec)| {
                (0..spec.count).map(move |_| ChargerInstance {
                    power_kw: spec.power_kw,
                    group,
                    busy_until: None,
                })
            })
            .collect();
        Self { chargers }
    }

    pub fn chargers(&self) -> &[ChargerInstance] {
        &self.chargers
    }

    pub fn busy_count(&self) -> usize {
        self.chargers.iter().filter(|c| !c.is_idle()).count()
    }

    /// Picks an idle charger for a vehicle, without changing state.
    pub fn select(&self, requested_power_kw: f64) -> Option<usize> {
        let idle = || self.chargers.iter().enumerate().filter(|(_, c)| c.is_idle());
        idle()
            .find(|(_, c)| c.power_kw == requested_power_kw)
            .or_else(|| idle().next())
            .map(|(i, _)| i)
    }

    /// Assigns a charger at `now` for `energy_kwh`, or returns `None` if every
    /// charger is busy.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimulationFault` if the session would not last a
    /// positive, representable duration.
    pub fn assign(
        &mut self,
        now: SimInstant,
        requested_power_kw: f64,
        energy_kwh: f64,
    ) -> Result<Option<Assignment>, SimError> {
        let Some(index) = self.select(requested_power_kw) else {
            return Ok(None);
        };
        let charger = &mut self.chargers[index];

        let hours = energy_kwh / charger.power_kw;
        if !(hours.is_finite() && hours > 0.0) {
            return Err(SimError::fault(
                format!("assignment(charger={index}, at={now})"),
                format!(
                    "session of {energy_kwh} kWh at {} kW has non-positive duration",
                    charger.power_kw
                ),
            ));
        }
        let busy_until = now.plus_millis(millis_ceil(hours).max(1));
        charger.busy_until = Some(busy_until);

        Ok(Some(Assignment {
            charger: index,
            group: charger.group,
            power_kw: charger.power_kw,
            busy_until,
            fallback: charger.power_kw != requested_power_kw,
        }))
    }

    /// Frees `charger` at its committed departure instant `now`.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimulationFault` if the charger is unknown, idle, or
    /// committed to a different instant.
    pub fn release(&mut self, charger: usize, now: SimInstant) -> Result<(), SimError> {
        let event = || format!("Departure(charger={charger}, at={now})");
        let slot = self
            .chargers
            .get_mut(charger)
            .ok_or_else(|| SimError::fault(event(), "no such charger"))?;
        match slot.busy_until {
            Some(until) if until == now => {
                slot.busy_until = None;
                Ok(())
            }
            Some(until) => Err(SimError::fault(
                event(),
                format!("charger is committed until {until}"),
            )),
            None => Err(SimError::fault(event(), "charger is already idle")),
        }
    }
}
