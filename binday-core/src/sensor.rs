//! Per-bin view of the latest published schedule.

use std::fmt;

use chrono::NaiveDate;

use crate::model::{BinType, ScheduleSnapshot, ScheduleSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// State shown for one bin type.
pub enum SensorState {
    /// No successful refresh has produced data.
    Unavailable,
    /// The last refresh succeeded but listed no date for this bin.
    NoCollectionScheduled,
    /// Next collection date.
    Next(NaiveDate),
}

impl SensorState {
    /// Derive the state of `bin` from the latest snapshot.
    #[must_use]
    pub fn for_bin(snapshot: Option<&ScheduleSnapshot>, bin: BinType) -> Self {
        match snapshot {
            Some(snapshot) if snapshot.source == ScheduleSource::Refreshed => snapshot
                .schedule
                .dates(bin)
                .first()
                .map_or(Self::NoCollectionScheduled, |date| Self::Next(*date)),
            _ => Self::Unavailable,
        }
    }
}

impl fmt::Display for SensorState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => formatter.write_str("unavailable"),
            Self::NoCollectionScheduled => formatter.write_str("No collection scheduled"),
            Self::Next(date) => write!(formatter, "{date}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Published state and attributes of one bin type.
pub struct BinSensor {
    /// Bin type the sensor reports on.
    pub bin: BinType,
    /// Current state.
    pub state: SensorState,
    /// Every known collection date, in document order.
    pub all_dates: Vec<NaiveDate>,
}

/// One sensor per bin type for the given snapshot.
#[must_use]
pub fn sensors(snapshot: Option<&ScheduleSnapshot>) -> Vec<BinSensor> {
    BinType::ALL
        .into_iter()
        .map(|bin| BinSensor {
            bin,
            state: SensorState::for_bin(snapshot, bin),
            all_dates: snapshot
                .map(|snapshot| snapshot.schedule.dates(bin).to_vec())
                .unwrap_or_default(),
        })
        .collect()
}
