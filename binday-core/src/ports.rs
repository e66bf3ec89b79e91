//! Traits describing the schedule source and calendar capabilities.

use std::io::Error as IoError;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::{AddressId, AllDayEvent, CollectionSchedule};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to external collaborators.
pub enum PortError {
    /// Network layer failed or the server answered with an error status.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// A single attempt exceeded its time budget.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
    /// The calendar backend rejected or could not process an event.
    #[error("Calendar error: {0}")]
    Calendar(String),
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of fetching the council page with retries.
pub enum FetchResult {
    /// Raw HTML of the result page.
    Html(String),
    /// Every attempt failed; there is no update this cycle.
    Empty,
}

impl FetchResult {
    /// The fetched HTML, if any.
    #[must_use]
    pub fn into_html(self) -> Option<String> {
        match self {
            Self::Html(html) => Some(html),
            Self::Empty => None,
        }
    }
}

#[async_trait]
/// Source of the bin collection schedule for one address.
pub trait SchedulePort: Send + Sync {
    /// Address this port fetches the schedule for.
    fn address(&self) -> &AddressId;

    /// Fetch the raw result page, retrying within the port's budget.
    ///
    /// Failures never propagate; exhausting the budget yields [`FetchResult::Empty`].
    async fn fetch(&self) -> FetchResult;

    /// Turn a fetched page into a schedule.
    fn extract(&self, html: &str) -> CollectionSchedule;
}

#[async_trait]
/// Capability to create all-day events in an external calendar.
pub trait CalendarPort: Send + Sync {
    /// Short name of the backend, used in logs.
    fn name(&self) -> &str;

    /// Create a single all-day event.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the backend could not create the event.
    async fn create_event(&self, event: &AllDayEvent) -> Result<(), PortError>;
}
