//! Wiring of the HTTP client, calendar backend and coordinator from the config.

use std::sync::Arc;

use anyhow::{Context, Result};
use binday_calendar::{HomeAssistantCalendar, IcsFileCalendar};
use binday_core::config::{CalendarBackend, Config};
use binday_core::coordinator::{Coordinator, CoordinatorSettings, EmissionMode};
use binday_core::emitter::EventEmitter;
use binday_core::ports::CalendarPort;
use reqwest::Client;

/// Shared HTTP client for the council site and Home Assistant.
pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("binday/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

/// Decide how calendar events are created from the calendar section.
pub(crate) fn emission_mode(config: &Config, client: &Client) -> EmissionMode {
    if !config.calendar.create_events {
        return EmissionMode::Disabled;
    }
    let Some(target) = config.calendar_target() else {
        return EmissionMode::Misconfigured("no target calendar configured".to_owned());
    };
    let calendar: Arc<dyn CalendarPort> = match config.calendar.backend {
        CalendarBackend::Ics => Arc::new(IcsFileCalendar::new(config.calendar.ics_dir.clone())),
        CalendarBackend::HomeAssistant => match &config.calendar.home_assistant {
            Some(home_assistant) => Arc::new(HomeAssistantCalendar::new(
                client.clone(),
                &home_assistant.base_url,
                home_assistant.token.clone(),
            )),
            None => {
                return EmissionMode::Misconfigured(
                    "home_assistant backend selected without [calendar.home_assistant]".to_owned(),
                );
            }
        },
    };
    EmissionMode::Enabled(EventEmitter::new(calendar, target, config.event_summaries()))
}

/// Wire the provider, calendar backend and store into a coordinator.
pub(crate) fn coordinator(config: &Config) -> Result<Coordinator> {
    let client = http_client()?;
    let address = config.address_id()?;
    let source = binday_provider_abc::port(client.clone(), address);
    Ok(Coordinator::new(
        source,
        config.storage.path.clone(),
        emission_mode(config, &client),
        CoordinatorSettings::every_hours(config.update_interval_hours),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(toml: &str) -> EmissionMode {
        let config: Config = format!("address = \"12345\"\n{toml}").parse().unwrap();
        emission_mode(&config, &Client::new())
    }

    #[test]
    fn disabled_by_default() {
        assert!(matches!(mode(""), EmissionMode::Disabled));
    }

    #[test]
    fn enabled_without_target_is_misconfigured() {
        assert!(matches!(
            mode("[calendar]\ncreate_events = true"),
            EmissionMode::Misconfigured(_)
        ));
    }

    #[test]
    fn home_assistant_needs_connection() {
        assert!(matches!(
            mode("[calendar]\ncreate_events = true\ntarget = \"bins\"\nbackend = \"home_assistant\""),
            EmissionMode::Misconfigured(_)
        ));
    }

    #[test]
    fn ics_backend_targets_configured_calendar() {
        let EmissionMode::Enabled(emitter) =
            mode("[calendar]\ncreate_events = true\ntarget = \" bins \"")
        else {
            panic!("expected enabled emission");
        };
        assert_eq!(emitter.target(), "bins");
    }
}
