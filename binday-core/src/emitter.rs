//! Creates calendar events for collection dates and records them in the event store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::model::{AllDayEvent, BinType, CollectionSchedule};
use crate::ports::{CalendarPort, PortError};
use crate::store::{EventStore, PersistResult};

/// Description attached to every created event.
pub const EVENT_DESCRIPTION: &str = "Automatic bin collection event.";
/// Pause between two successful event creations.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_secs(1);

/// User-chosen event titles per bin type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSummaries {
    overrides: HashMap<BinType, String>,
}

impl EventSummaries {
    /// Set the title used for a bin type. Blank titles are ignored.
    #[must_use]
    pub fn with(mut self, bin: BinType, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        if summary.trim().is_empty() {
            self.overrides.remove(&bin);
        } else {
            self.overrides.insert(bin, summary);
        }
        self
    }

    /// Title for a bin type, falling back to its label.
    #[must_use]
    pub fn summary_for(&self, bin: BinType) -> &str {
        self.overrides.get(&bin).map_or(bin.label(), String::as_str)
    }
}

/// Counters describing one emission pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionReport {
    /// Events created and recorded.
    pub created: usize,
    /// Pairs skipped because the store already knew them.
    pub skipped: usize,
    /// Pairs whose creation failed; they are retried next cycle.
    pub failed: usize,
}

/// Sends all-day events to a calendar backend.
pub struct EventEmitter {
    calendar: Arc<dyn CalendarPort>,
    target: String,
    summaries: EventSummaries,
    pacing_delay: Duration,
}

impl EventEmitter {
    /// Create an emitter writing to `target` through `calendar`.
    #[must_use]
    pub fn new(
        calendar: Arc<dyn CalendarPort>,
        target: impl Into<String>,
        summaries: EventSummaries,
    ) -> Self {
        Self {
            calendar,
            target: target.into(),
            summaries,
            pacing_delay: DEFAULT_PACING_DELAY,
        }
    }

    /// Override the pause between successful creations.
    #[must_use]
    pub fn with_pacing_delay(mut self, pacing_delay: Duration) -> Self {
        self.pacing_delay = pacing_delay;
        self
    }

    /// Calendar events are created in.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Build the all-day event for a collection.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Internal`] when `date` is the last representable day.
    pub fn build_event(&self, bin: BinType, date: NaiveDate) -> Result<AllDayEvent, PortError> {
        let end_date = date
            .succ_opt()
            .ok_or_else(|| PortError::Internal(format!("No day follows {date}")))?;
        Ok(AllDayEvent {
            target: self.target.clone(),
            bin,
            summary: self.summaries.summary_for(bin).to_owned(),
            start_date: date,
            end_date,
            description: EVENT_DESCRIPTION.to_owned(),
        })
    }

    /// Create the event for one collection.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`PortError`]; the caller decides whether to retry.
    pub async fn emit(&self, bin: BinType, date: NaiveDate) -> Result<(), PortError> {
        let event = self.build_event(bin, date)?;
        match self.calendar.create_event(&event).await {
            Ok(()) => {
                info!(%bin, %date, calendar = self.calendar.name(), "Created calendar event");
                Ok(())
            }
            Err(err) => {
                error!(%bin, %date, calendar = self.calendar.name(), error = %err, "Failed to create calendar event");
                Err(err)
            }
        }
    }

    /// Create events for every collection in `schedule` the store does not know yet.
    ///
    /// Each success is recorded before the next pair is considered. Failed pairs stay
    /// absent from the store.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::store::StoreError`] when a success cannot be recorded.
    pub async fn emit_pending(
        &self,
        schedule: &CollectionSchedule,
        store: &mut EventStore,
    ) -> PersistResult<EmissionReport> {
        let mut report = EmissionReport::default();
        for (bin, dates) in schedule.iter() {
            for date in dates {
                if store.contains(*date, bin) {
                    debug!(%bin, %date, "Skipping event creation as it's already stored");
                    report.skipped += 1;
                    continue;
                }
                if self.emit(bin, *date).await.is_err() {
                    report.failed += 1;
                    continue;
                }
                store.record(*date, bin).await?;
                report.created += 1;
                sleep(self.pacing_delay).await;
            }
        }
        Ok(report)
    }
}
