//! Plain-text and JSON output of the CLI commands.

use std::io::{self, Write};

use binday_core::model::{CollectionSchedule, ScheduleSnapshot};
use binday_core::sensor::sensors;
use binday_core::store::EventStore;

/// One line per bin type with its state and the number of known dates.
pub(crate) fn write_sensors(out: &mut impl Write, snapshot: Option<&ScheduleSnapshot>) -> io::Result<()> {
    for sensor in sensors(snapshot) {
        writeln!(
            out,
            "{}: {} ({} dates)",
            sensor.bin,
            sensor.state,
            sensor.all_dates.len()
        )?;
    }
    Ok(())
}

/// One line per stored date listing its bin types.
pub(crate) fn write_events(out: &mut impl Write, store: &EventStore) -> io::Result<()> {
    if store.is_empty() {
        return writeln!(out, "No stored events in {}", store.path().display());
    }
    for (date, bins) in store.iter() {
        let labels: Vec<String> = bins.iter().map(ToString::to_string).collect();
        writeln!(out, "{date}: {}", labels.join(", "))?;
    }
    Ok(())
}

/// The schedule as pretty-printed JSON.
pub(crate) fn write_schedule(out: &mut impl Write, schedule: &CollectionSchedule) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, schedule)?;
    writeln!(out)
}
