//! TOML configuration of a bin collection instance.

use std::fs;
use std::io::Error as IoError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::coordinator::{DEFAULT_UPDATE_INTERVAL_HOURS, MIN_UPDATE_INTERVAL_HOURS};
use crate::emitter::EventSummaries;
use crate::model::{AddressId, BinType};

/// File the event store lives in unless configured otherwise.
pub const DEFAULT_STORAGE_PATH: &str = "binday_events.json";
/// Directory `.ics` calendars are written to unless configured otherwise.
pub const DEFAULT_ICS_DIR: &str = "calendars";

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading or validating the configuration.
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },
    /// The file is not valid TOML or does not match the layout.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// No address was given.
    #[error("No address configured")]
    MissingAddress,
    /// The address is not a numeric council address identifier.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
    /// The update interval is below the minimum.
    #[error("Update interval of {0} hours is below the minimum of {MIN_UPDATE_INTERVAL_HOURS}")]
    IntervalTooShort(u64),
    /// The calendar section cannot be used.
    #[error("Invalid calendar configuration: {0}")]
    InvalidCalendar(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Top-level configuration.
pub struct Config {
    /// Numeric address id or a pasted result-page URL.
    #[serde(default)]
    pub address: Option<String>,
    /// Hours between two update cycles.
    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: u64,
    /// Event store settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Calendar event creation settings.
    #[serde(default)]
    pub calendar: CalendarConfig,
    /// Per-bin event titles.
    #[serde(default)]
    pub summaries: SummariesConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Where the event store is persisted.
pub struct StorageConfig {
    /// Path of the JSON store file.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Calendar implementation events are created in.
pub enum CalendarBackend {
    /// Local `.ics` files.
    #[default]
    Ics,
    /// Home Assistant calendar service.
    HomeAssistant,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Calendar event creation settings.
pub struct CalendarConfig {
    /// Whether events are created at all.
    #[serde(default)]
    pub create_events: bool,
    /// Calendar identifier events are created in.
    #[serde(default)]
    pub target: Option<String>,
    /// Calendar implementation.
    #[serde(default)]
    pub backend: CalendarBackend,
    /// Output directory of the `ics` backend.
    #[serde(default = "default_ics_dir")]
    pub ics_dir: PathBuf,
    /// Connection of the `home_assistant` backend.
    #[serde(default)]
    pub home_assistant: Option<HomeAssistantConfig>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            create_events: false,
            target: None,
            backend: CalendarBackend::default(),
            ics_dir: default_ics_dir(),
            home_assistant: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Home Assistant REST connection.
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://homeassistant.local:8123`.
    pub base_url: String,
    /// Long-lived access token.
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
/// Optional event titles per bin type.
pub struct SummariesConfig {
    /// Title of domestic collections.
    #[serde(default)]
    pub domestic: Option<String>,
    /// Title of recycling collections.
    #[serde(default)]
    pub recycling: Option<String>,
    /// Title of garden/food collections.
    #[serde(default)]
    pub garden_food: Option<String>,
}

fn default_update_interval_hours() -> u64 {
    DEFAULT_UPDATE_INTERVAL_HOURS
}

fn default_storage_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORAGE_PATH)
}

fn default_ics_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ICS_DIR)
}

impl Config {
    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        text.parse()
    }

    /// Check the settings that make the instance unusable.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a missing or invalid address, an interval below the
    /// minimum, or an unusable Home Assistant URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.address_id()?;
        if self.update_interval_hours < MIN_UPDATE_INTERVAL_HOURS {
            return Err(ConfigError::IntervalTooShort(self.update_interval_hours));
        }
        if let Some(home_assistant) = &self.calendar.home_assistant {
            Url::parse(&home_assistant.base_url).map_err(|err| {
                ConfigError::InvalidCalendar(format!(
                    "home_assistant.base_url {:?}: {err}",
                    home_assistant.base_url
                ))
            })?;
        }
        Ok(())
    }

    /// The configured address as a numeric identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingAddress`] or [`ConfigError::InvalidAddress`].
    pub fn address_id(&self) -> Result<AddressId, ConfigError> {
        match self.address.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_address(raw),
            _ => Err(ConfigError::MissingAddress),
        }
    }

    /// Configured event titles.
    #[must_use]
    pub fn event_summaries(&self) -> EventSummaries {
        let pairs = [
            (BinType::Domestic, &self.summaries.domestic),
            (BinType::Recycling, &self.summaries.recycling),
            (BinType::GardenFood, &self.summaries.garden_food),
        ];
        pairs
            .into_iter()
            .fold(EventSummaries::default(), |summaries, (bin, summary)| match summary {
                Some(summary) => summaries.with(bin, summary.as_str()),
                None => summaries,
            })
    }

    /// Target calendar, ignoring blank values.
    #[must_use]
    pub fn calendar_target(&self) -> Option<&str> {
        self.calendar
            .target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Reduce user input to the bare address id.
///
/// Pasted result-page URLs yield their `address` query parameter, or an empty string
/// when they carry none.
#[must_use]
pub fn sanitize_address(raw: &str) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if !(lowered.starts_with("http://") || lowered.starts_with("https://")) {
        return trimmed.to_owned();
    }
    Url::parse(trimmed)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "address")
                .map(|(_, value)| value.trim().to_owned())
        })
        .unwrap_or_default()
}

/// Sanitize and validate an address.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidAddress`] unless the sanitized value is non-empty and
/// purely numeric.
pub fn parse_address(raw: &str) -> Result<AddressId, ConfigError> {
    let address = sanitize_address(raw);
    if address.is_empty() || !address.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ConfigError::InvalidAddress(raw.trim().to_owned()));
    }
    Ok(AddressId(address))
}
