//! Domain data structures for bin types, collection schedules, and calendar events.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Format of dates in persisted state and calendar requests.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Waste collection categories published by the council.
pub enum BinType {
    /// Black bin, general household waste.
    #[serde(rename = "Domestic Collections")]
    Domestic,
    /// Green bin, dry recycling.
    #[serde(rename = "Recycling Collections")]
    Recycling,
    /// Brown bin, garden and food waste.
    #[serde(rename = "Garden/Food Collections")]
    GardenFood,
}

impl BinType {
    /// Every bin type, in the order schedules list them.
    pub const ALL: [Self; 3] = [Self::Domestic, Self::Recycling, Self::GardenFood];

    /// Human-readable label, also used as the persisted key.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Domestic => "Domestic Collections",
            Self::Recycling => "Recycling Collections",
            Self::GardenFood => "Garden/Food Collections",
        }
    }
}

impl fmt::Display for BinType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown bin type: {0}")]
/// Returned when a label does not name one of the known bin types.
pub struct UnknownBinType(pub String);

impl FromStr for BinType {
    type Err = UnknownBinType;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bin| bin.label() == label)
            .ok_or_else(|| UnknownBinType(label.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Numeric council identifier for a property.
pub struct AddressId(pub String);

impl fmt::Display for AddressId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Upcoming collection dates per bin type.
///
/// Every bin type is always present, possibly with an empty list. Dates keep the
/// order in which the council page lists them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CollectionSchedule {
    dates: BTreeMap<BinType, Vec<NaiveDate>>,
}

impl CollectionSchedule {
    /// Schedule with no collections for any bin type.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dates: BinType::ALL
                .into_iter()
                .map(|bin| (bin, Vec::new()))
                .collect(),
        }
    }

    /// Append a collection date for a bin type.
    pub fn push(&mut self, bin: BinType, date: NaiveDate) {
        self.dates.entry(bin).or_default().push(date);
    }

    /// Collection dates for a bin type, in document order.
    #[must_use]
    pub fn dates(&self, bin: BinType) -> &[NaiveDate] {
        self.dates.get(&bin).map_or(&[], Vec::as_slice)
    }

    /// Iterate over all bin types and their dates.
    pub fn iter(&self) -> impl Iterator<Item = (BinType, &[NaiveDate])> {
        self.dates.iter().map(|(bin, dates)| (*bin, dates.as_slice()))
    }

    /// Whether no bin type has any collection date.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.values().all(Vec::is_empty)
    }

    /// Total number of (bin type, date) pairs.
    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.dates.values().map(Vec::len).sum()
    }
}

impl Default for CollectionSchedule {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Request for an all-day calendar event covering `[start_date, end_date)`.
pub struct AllDayEvent {
    /// Calendar the event is created in.
    pub target: String,
    /// Bin type the event stands for.
    pub bin: BinType,
    /// Event title.
    pub summary: String,
    /// First day of the event.
    pub start_date: NaiveDate,
    /// Day after the last day of the event (exclusive).
    pub end_date: NaiveDate,
    /// Free-text note attached to the event.
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Outcome of the fetch that produced a snapshot.
pub enum ScheduleSource {
    /// The council page was fetched and parsed.
    Refreshed,
    /// Every fetch attempt failed; the schedule is empty.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Schedule published at the end of a refresh.
pub struct ScheduleSnapshot {
    /// Extracted collection dates.
    pub schedule: CollectionSchedule,
    /// Whether the schedule came from a successful fetch.
    pub source: ScheduleSource,
    /// When the snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl ScheduleSnapshot {
    /// Snapshot of a freshly extracted schedule.
    #[must_use]
    pub fn refreshed(schedule: CollectionSchedule) -> Self {
        Self {
            schedule,
            source: ScheduleSource::Refreshed,
            updated_at: Utc::now(),
        }
    }

    /// Empty snapshot for a cycle whose fetch was exhausted.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            schedule: CollectionSchedule::empty(),
            source: ScheduleSource::Unavailable,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, ISO_DATE_FORMAT).unwrap()
    }

    #[test]
    fn empty_schedule_has_every_bin_type() {
        let schedule = CollectionSchedule::empty();
        let bins: Vec<BinType> = schedule.iter().map(|(bin, _dates)| bin).collect();
        assert_eq!(bins, BinType::ALL.to_vec());
        assert!(schedule.is_empty());
    }

    #[test]
    fn push_keeps_document_order() {
        let mut schedule = CollectionSchedule::empty();
        schedule.push(BinType::Recycling, date("2025-12-30"));
        schedule.push(BinType::Recycling, date("2025-12-16"));

        assert_eq!(
            schedule.dates(BinType::Recycling),
            &[date("2025-12-30"), date("2025-12-16")]
        );
        assert_eq!(schedule.collection_count(), 2);
    }

    #[test]
    fn bin_type_label_round_trips_through_from_str() {
        for bin in BinType::ALL {
            assert_eq!(bin.label().parse::<BinType>(), Ok(bin));
        }
        assert!("Glass Collections".parse::<BinType>().is_err());
    }

    #[test]
    fn schedule_serializes_with_labels_and_iso_dates() {
        let mut schedule = CollectionSchedule::empty();
        schedule.push(BinType::Domestic, date("2025-12-25"));

        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Domestic Collections": ["2025-12-25"],
                "Recycling Collections": [],
                "Garden/Food Collections": [],
            })
        );
    }
}
