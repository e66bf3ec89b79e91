//! Calendar backends events can be created in.

/// Home Assistant `calendar.create_event` service.
pub mod home_assistant;
/// Local iCalendar files.
pub mod ics;

pub use home_assistant::HomeAssistantCalendar;
pub use ics::IcsFileCalendar;
