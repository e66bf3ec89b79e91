//! Bounded-retry download of the council result page.

use std::time::Duration;

use binday_core::model::AddressId;
use binday_core::ports::{FetchResult, PortError};
use reqwest::Client;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Result page of the council bin day lookup.
pub const BASE_URL: &str = "https://www.armaghbanbridgecraigavon.gov.uk/resident/binday-result/";

/// Attempt budget of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub attempts: u32,
    /// Time budget of each attempt, covering send, status check and body read.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Downloads the result page for one address.
#[derive(Debug, Clone)]
pub struct AbcFetcher {
    client: Client,
    base_url: String,
    address: AddressId,
    policy: RetryPolicy,
}

impl AbcFetcher {
    /// Create a fetcher for `address` against the public council site.
    #[must_use]
    pub fn new(client: Client, address: AddressId) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
            address,
            policy: RetryPolicy::default(),
        }
    }

    /// Point the fetcher at another result page URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the attempt budget.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Address the page is fetched for.
    #[must_use]
    pub fn address(&self) -> &AddressId {
        &self.address
    }

    /// Fetch the page, retrying immediately after each failed attempt.
    pub async fn fetch(&self) -> FetchResult {
        for attempt in 1..=self.policy.attempts {
            match self.attempt().await {
                Ok(html) => {
                    debug!(attempt, bytes = html.len(), "Fetched bin collection page");
                    return FetchResult::Html(html);
                }
                Err(err) => error!(
                    attempt,
                    attempts = self.policy.attempts,
                    error = %err,
                    "Error fetching bin collection data"
                ),
            }
        }
        warn!(address = %self.address, "All fetch attempts failed");
        FetchResult::Empty
    }

    async fn attempt(&self) -> Result<String, PortError> {
        let request = self
            .client
            .get(&self.base_url)
            .query(&[("address", self.address.0.as_str())]);
        let body = async {
            let response = request.send().await?.error_for_status()?;
            Ok::<_, PortError>(response.text().await?)
        };
        timeout(self.policy.timeout, body)
            .await
            .map_err(|_elapsed| PortError::Timeout(self.policy.timeout))?
    }
}
