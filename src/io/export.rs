//! CSV export of charging events and JSON export of run results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::sim::types::ChargingEvent;

/// Column header for charging-event CSV export.
const HEADER: &str = "start_time,end_time,charger_index,charger_type_power_kw,\
                      requested_power_kw,power_kw,energy_kwh";

/// Exports charging events to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_events_csv(events: &[ChargingEvent], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_events_csv(events, io::BufWriter::new(file))
}

/// Writes charging events as CSV to any writer, one row per event.
///
/// Times are RFC 3339 local wall-clock times with their UTC offset.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_events_csv(events: &[ChargingEvent], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for e in events {
        wtr.write_record(&[
            e.start_time.to_rfc3339(),
            e.end_time.to_rfc3339(),
            e.charger_index.to_string(),
            e.charger_type_power_kw.to_string(),
            e.requested_power_kw.to_string(),
            e.power_kw.to_string(),
            format!("{:.4}", e.energy_kwh),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `value` as pretty-printed JSON to a file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation, serialization, or writing fails.
pub fn export_json<T: Serialize>(value: &T, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_json(value, io::BufWriter::new(file))
}

/// Writes `value` as pretty-printed JSON to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if serialization or writing fails.
pub fn write_json<T: Serialize>(value: &T, mut writer: impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()
}
