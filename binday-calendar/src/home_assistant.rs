//! Calendar backend calling the Home Assistant `calendar.create_event` service.

use async_trait::async_trait;
use binday_core::model::{AllDayEvent, ISO_DATE_FORMAT};
use binday_core::ports::{CalendarPort, PortError};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

const SERVICE_PATH: &str = "/api/services/calendar/create_event";
const ENTITY_PREFIX: &str = "calendar.";

#[derive(Debug, Serialize)]
struct CreateEventRequest<'event> {
    entity_id: String,
    summary: &'event str,
    start_date: String,
    end_date: String,
    description: &'event str,
}

/// Creates events through the Home Assistant REST API.
#[derive(Debug, Clone)]
pub struct HomeAssistantCalendar {
    client: Client,
    base_url: String,
    token: String,
}

impl HomeAssistantCalendar {
    /// Create a backend talking to the instance at `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CalendarPort for HomeAssistantCalendar {
    fn name(&self) -> &str {
        "home_assistant"
    }

    async fn create_event(&self, event: &AllDayEvent) -> Result<(), PortError> {
        let body = CreateEventRequest {
            entity_id: normalize_entity_id(&event.target),
            summary: &event.summary,
            start_date: event.start_date.format(ISO_DATE_FORMAT).to_string(),
            end_date: event.end_date.format(ISO_DATE_FORMAT).to_string(),
            description: &event.description,
        };
        debug!(entity_id = %body.entity_id, "Calling calendar.create_event");
        self.client
            .post(format!("{}{SERVICE_PATH}", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Prefix a bare calendar name with the `calendar.` domain.
#[must_use]
pub fn normalize_entity_id(target: &str) -> String {
    let target = target.trim();
    if target.starts_with(ENTITY_PREFIX) {
        target.to_owned()
    } else {
        format!("{ENTITY_PREFIX}{target}")
    }
}

#[cfg(test)]
mod tests {
    use binday_core::model::BinType;
    use chrono::NaiveDate;
    use serde_json::Value;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    // Accepts one request, answers with `status` and hands back the raw request.
    async fn serve_once(status: u16) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let (sender, receiver) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0_u8; 1024];
            loop {
                let read = socket.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                let text = String::from_utf8_lossy(&request);
                if let Some((head, body)) = text.split_once("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if body.len() >= length {
                        break;
                    }
                }
                if read == 0 {
                    break;
                }
            }
            let response =
                format!("HTTP/1.1 {status} X\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]");
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = sender.send(String::from_utf8_lossy(&request).into_owned());
        });
        (url, receiver)
    }

    fn event(target: &str) -> AllDayEvent {
        AllDayEvent {
            target: target.to_owned(),
            bin: BinType::GardenFood,
            summary: "Brown bin".to_owned(),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
            description: "Automatic bin collection event.".to_owned(),
        }
    }

    #[test]
    fn prefixes_bare_names() {
        assert_eq!(normalize_entity_id("bins"), "calendar.bins");
        assert_eq!(normalize_entity_id(" calendar.bins "), "calendar.bins");
    }

    #[tokio::test]
    async fn posts_service_call() {
        let (url, request) = serve_once(200).await;
        let calendar = HomeAssistantCalendar::new(Client::new(), &url, "secret");
        calendar.create_event(&event("bins")).await.unwrap();

        let request = request.await.unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        assert!(head.starts_with("POST /api/services/calendar/create_event HTTP/1.1"));
        assert!(head.to_ascii_lowercase().contains("authorization: bearer secret"));

        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["entity_id"], "calendar.bins");
        assert_eq!(body["summary"], "Brown bin");
        assert_eq!(body["start_date"], "2026-01-05");
        assert_eq!(body["end_date"], "2026-01-06");
        assert_eq!(body["description"], "Automatic bin collection event.");
    }

    #[tokio::test]
    async fn rejected_call_is_an_error() {
        let (url, _request) = serve_once(401).await;
        let calendar = HomeAssistantCalendar::new(Client::new(), &url, "wrong");
        let err = calendar.create_event(&event("bins")).await.unwrap_err();
        assert!(matches!(err, PortError::Network(_)));
    }
}
