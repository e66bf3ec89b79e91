//! Schedule provider for Armagh Banbridge Craigavon Borough Council.

use std::sync::Arc;

use async_trait::async_trait;
use binday_core::model::{AddressId, CollectionSchedule};
use binday_core::ports::{FetchResult, SchedulePort};
use reqwest::Client;

/// HTML extraction of collection dates.
pub mod extract;
/// Retrying page download.
pub mod fetch;

pub use extract::extract;
pub use fetch::{AbcFetcher, BASE_URL, RetryPolicy};

/// Schedule source backed by the council result page.
pub struct AbcSchedulePort {
    fetcher: AbcFetcher,
}

impl AbcSchedulePort {
    /// Create a port using the given fetcher.
    #[must_use]
    pub fn new(fetcher: AbcFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SchedulePort for AbcSchedulePort {
    fn address(&self) -> &AddressId {
        self.fetcher.address()
    }

    async fn fetch(&self) -> FetchResult {
        self.fetcher.fetch().await
    }

    fn extract(&self, html: &str) -> CollectionSchedule {
        extract(html)
    }
}

/// Build the schedule port for an address on the public council site.
#[must_use]
pub fn port(client: Client, address: AddressId) -> Arc<dyn SchedulePort> {
    Arc::new(AbcSchedulePort::new(AbcFetcher::new(client, address)))
}
