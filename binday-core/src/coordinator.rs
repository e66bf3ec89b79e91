//! Periodic update cycle: fetch, extract, publish, and emit calendar events.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::emitter::{EmissionReport, EventEmitter};
use crate::model::{ScheduleSnapshot, ScheduleSource};
use crate::ports::{FetchResult, SchedulePort};
use crate::store::{DEFAULT_RETENTION_DAYS, EventStore, PersistResult};

/// Hours between two cycles unless configured otherwise.
pub const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 96;
/// Smallest accepted update interval in hours.
pub const MIN_UPDATE_INTERVAL_HOURS: u64 = 6;
/// Pause between publishing a schedule and creating calendar events.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(20);

const SECONDS_PER_HOUR: u64 = 3600;

/// Timing knobs of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Pause between the end of a cycle and the start of the next.
    pub update_interval: Duration,
    /// Pause between publishing and emitting.
    pub settle_delay: Duration,
    /// Age in days after which stored events are evicted on startup.
    pub retention_days: u32,
}

impl CoordinatorSettings {
    /// Settings with the given update interval in hours.
    #[must_use]
    pub fn every_hours(hours: u64) -> Self {
        Self {
            update_interval: Duration::from_secs(hours.saturating_mul(SECONDS_PER_HOUR)),
            ..Self::default()
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_HOURS * SECONDS_PER_HOUR),
            settle_delay: DEFAULT_SETTLE_DELAY,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Whether and how a cycle creates calendar events.
pub enum EmissionMode {
    /// Calendar event creation is turned off.
    Disabled,
    /// Creation is turned on but cannot run; the reason is logged every cycle.
    Misconfigured(String),
    /// Events are created through the emitter.
    Enabled(EventEmitter),
}

/// Result of a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Snapshot published by the refresh phase.
    pub snapshot: ScheduleSnapshot,
    /// Emission counters, when the emission phase ran.
    pub emission: Option<EmissionReport>,
}

/// Owns the event store and drives update cycles for one address.
pub struct Coordinator {
    source: Arc<dyn SchedulePort>,
    store_path: PathBuf,
    store: Option<EventStore>,
    emission: EmissionMode,
    settings: CoordinatorSettings,
    published: watch::Sender<Option<ScheduleSnapshot>>,
}

impl Coordinator {
    /// Create a coordinator. The store at `store_path` is loaded on the first cycle.
    #[must_use]
    pub fn new(
        source: Arc<dyn SchedulePort>,
        store_path: impl Into<PathBuf>,
        emission: EmissionMode,
        settings: CoordinatorSettings,
    ) -> Self {
        let (published, _receiver) = watch::channel(None);
        Self {
            source,
            store_path: store_path.into(),
            store: None,
            emission,
            settings,
            published,
        }
    }

    /// Receiver for published snapshots. Holds `None` until the first cycle ends.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ScheduleSnapshot>> {
        self.published.subscribe()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<ScheduleSnapshot> {
        self.published.borrow().clone()
    }

    /// The loaded event store, if a cycle has loaded it.
    #[must_use]
    pub fn store(&self) -> Option<&EventStore> {
        self.store.as_ref()
    }

    /// Run one refresh and, when enabled, one emission pass.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::store::StoreError`] when the event store cannot be loaded or
    /// written. Fetch and calendar failures degrade the cycle instead.
    pub async fn run_cycle(&mut self) -> PersistResult<CycleReport> {
        self.ensure_store_loaded().await?;

        info!(address = %self.source.address(), "Updating bin collection data");
        let snapshot = match self.source.fetch().await {
            FetchResult::Html(html) => ScheduleSnapshot::refreshed(self.source.extract(&html)),
            FetchResult::Empty => {
                warn!("No bin collection data available this cycle");
                ScheduleSnapshot::unavailable()
            }
        };
        self.published.send_replace(Some(snapshot.clone()));

        if snapshot.source == ScheduleSource::Unavailable {
            return Ok(CycleReport {
                snapshot,
                emission: None,
            });
        }

        let emission = match (&self.emission, self.store.as_mut()) {
            (EmissionMode::Disabled, _) | (_, None) => {
                debug!("Calendar event creation disabled");
                None
            }
            (EmissionMode::Misconfigured(reason), Some(_)) => {
                error!(reason = %reason, "Calendar event creation is enabled but misconfigured, skipping");
                None
            }
            (EmissionMode::Enabled(emitter), Some(store)) => {
                info!(
                    delay_secs = self.settings.settle_delay.as_secs(),
                    calendar = emitter.target(),
                    "Delaying calendar event creation"
                );
                sleep(self.settings.settle_delay).await;
                Some(emitter.emit_pending(&snapshot.schedule, store).await?)
            }
        };

        Ok(CycleReport { snapshot, emission })
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// The next cycle is scheduled only after the current one has finished.
    ///
    /// # Errors
    ///
    /// Stops at the first [`crate::store::StoreError`].
    pub async fn run<F>(mut self, shutdown: F) -> PersistResult
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                report = self.run_cycle() => log_report(&report?),
            }
            debug!(
                interval_secs = self.settings.update_interval.as_secs(),
                "Waiting for next update"
            );
            tokio::select! {
                () = &mut shutdown => break,
                () = sleep(self.settings.update_interval) => {}
            }
        }
        info!("Coordinator stopped");
        Ok(())
    }

    /// Forget every stored event, loading the store first if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::store::StoreError`] when the store cannot be loaded or written.
    pub async fn clear_events(&mut self) -> PersistResult {
        self.ensure_store_loaded().await?;
        match self.store.as_mut() {
            Some(store) => store.clear().await,
            None => Ok(()),
        }
    }

    async fn ensure_store_loaded(&mut self) -> PersistResult {
        if self.store.is_some() {
            return Ok(());
        }
        let mut store = EventStore::load(self.store_path.clone()).await?;
        let removed = store
            .prune(self.settings.retention_days, Local::now().date_naive())
            .await?;
        info!(
            path = %store.path().display(),
            stored = store.len(),
            removed,
            "Loaded stored bin collection events"
        );
        self.store = Some(store);
        Ok(())
    }
}

fn log_report(report: &CycleReport) {
    let collections = report.snapshot.schedule.collection_count();
    match report.emission {
        Some(emission) => info!(
            collections,
            created = emission.created,
            skipped = emission.skipped,
            failed = emission.failed,
            "Bin collection update finished"
        ),
        None => info!(collections, "Bin collection update finished"),
    }
}
