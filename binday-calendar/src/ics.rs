//! Calendar backend writing one `.ics` file per target calendar.

use std::io::{BufReader, Cursor, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use binday_core::model::{AllDayEvent, BinType};
use binday_core::ports::{CalendarPort, PortError};
use chrono::{Local, NaiveDate};
use ical::IcalParser;
use ical::generator::{
    Emitter, IcalCalendar, IcalCalendarBuilder, IcalEvent, IcalEventBuilder, Property,
};
use ical::ical_property;
use tokio::fs;
use tracing::debug;

static PROD_ID: &str = "-//binday//armaghbanbridgecraigavon.gov.uk";
static TIMEZONE: &str = "Europe/London";
static FORMAT: &str = "%Y%m%d";

/// Writes events into `<dir>/<target>.ics`.
#[derive(Debug, Clone)]
pub struct IcsFileCalendar {
    dir: PathBuf,
}

impl IcsFileCalendar {
    /// Create a backend storing calendars in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File backing the calendar `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Calendar`] when `target` is not a plain file name.
    pub fn calendar_path(&self, target: &str) -> Result<PathBuf, PortError> {
        let name = target.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(PortError::Calendar(format!("Invalid calendar name {target:?}")));
        }
        Ok(self.dir.join(format!("{name}.ics")))
    }

    async fn load(path: &Path) -> Result<IcalCalendar, PortError> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(empty_calendar()),
            Err(err) => return Err(err.into()),
        };
        match IcalParser::new(BufReader::new(Cursor::new(text))).next() {
            Some(Ok(calendar)) => Ok(calendar),
            Some(Err(err)) => Err(PortError::Calendar(format!(
                "Failed to parse {}: {err}",
                path.display()
            ))),
            None => Ok(empty_calendar()),
        }
    }

    async fn store(path: &Path, calendar: &IcalCalendar) -> Result<(), PortError> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("ics.tmp");
        fs::write(&staging, calendar.generate()).await?;
        fs::rename(&staging, path).await?;
        Ok(())
    }
}

#[async_trait]
impl CalendarPort for IcsFileCalendar {
    fn name(&self) -> &str {
        "ics"
    }

    async fn create_event(&self, event: &AllDayEvent) -> Result<(), PortError> {
        let path = self.calendar_path(&event.target)?;
        let mut calendar = Self::load(&path).await?;

        let new_event = build_event(event);
        let uid = event_uid(event.bin, event.start_date);
        let before = calendar.events.len();
        calendar
            .events
            .retain(|existing| property_value(existing, "UID") != Some(uid.as_str()));
        if calendar.events.len() != before {
            debug!(uid, "Replacing existing calendar entry");
        }
        calendar.events.push(new_event);

        Self::store(&path, &calendar).await
    }
}

/// Stable identifier of the event for a collection.
#[must_use]
pub fn event_uid(bin: BinType, date: NaiveDate) -> String {
    let slug = match bin {
        BinType::Domestic => "domestic",
        BinType::Recycling => "recycling",
        BinType::GardenFood => "garden-food",
    };
    format!("{}-{slug}@binday", date.format(FORMAT))
}

fn empty_calendar() -> IcalCalendar {
    IcalCalendarBuilder::version("2.0")
        .gregorian()
        .prodid(PROD_ID)
        .build()
}

fn build_event(event: &AllDayEvent) -> IcalEvent {
    let changed = Local::now().format(FORMAT).to_string();
    IcalEventBuilder::tzid(TIMEZONE)
        .uid(event_uid(event.bin, event.start_date))
        .changed(&changed)
        .one_day(event.start_date.format(FORMAT).to_string())
        .set(Property {
            name: "DTEND".to_owned(),
            params: Some(vec![("VALUE".to_owned(), vec!["DATE".to_owned()])]),
            value: Some(event.end_date.format(FORMAT).to_string()),
        })
        .set(ical_property!("SUMMARY", &event.summary))
        .set(ical_property!("DESCRIPTION", &event.description))
        .set(ical_property!("TRANSP", "TRANSPARENT"))
        .build()
}

fn property_value<'event>(event: &'event IcalEvent, name: &str) -> Option<&'event str> {
    event
        .properties
        .iter()
        .find(|property| property.name == name)
        .and_then(|property| property.value.as_deref())
}
