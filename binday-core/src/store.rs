//! Durable record of the calendar events that were already created.
//!
//! The record lives in a single JSON file shaped as
//! `{"version": 1, "key": "bin_collection_events", "data": {"<date>": ["<bin>", ...]}}`.
//! Every mutation is written to disk before the call returns, so a pair seen by
//! [`EventStore::contains`] survives a restart.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::model::{BinType, ISO_DATE_FORMAT};

/// Identifier stored alongside the record.
pub const STORAGE_KEY: &str = "bin_collection_events";
/// Schema version of the persisted record.
pub const STORAGE_VERSION: u64 = 1;
/// Days after which stored events are evicted on startup.
pub const DEFAULT_RETENTION_DAYS: u32 = 14;

#[derive(thiserror::Error, Debug)]
/// Failures while persisting the event record.
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("Failed to access event store {}: {source}", path.display())]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },
    /// The record could not be encoded.
    #[error("Failed to encode event store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result of an operation that persists the event record.
pub type PersistResult<T = ()> = Result<T, StoreError>;

#[derive(Serialize)]
struct Envelope<'record> {
    version: u64,
    key: &'record str,
    data: &'record BTreeMap<NaiveDate, BTreeSet<BinType>>,
}

/// File-backed set of (date, bin type) pairs already emitted as calendar events.
#[derive(Debug)]
pub struct EventStore {
    path: PathBuf,
    events: BTreeMap<NaiveDate, BTreeSet<BinType>>,
}

impl EventStore {
    /// Load the record stored at `path`.
    ///
    /// A missing file yields an empty record. Content that is not a valid record is
    /// discarded with a warning and replaced by an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when an existing file cannot be read.
    pub async fn load(path: impl Into<PathBuf>) -> PersistResult<Self> {
        let path = path.into();
        let events = match fs::read_to_string(&path).await {
            Ok(raw) => decode(&raw, &path),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No stored bin collection events found");
                BTreeMap::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        debug!(path = %path.display(), dates = events.len(), "Loaded stored bin collection events");
        Ok(Self { path, events })
    }

    /// Evict every date on or before `today - retention_days`, then persist.
    ///
    /// Returns the number of evicted dates.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the pruned record cannot be written.
    pub async fn prune(&mut self, retention_days: u32, today: NaiveDate) -> PersistResult<usize> {
        let mut kept = self.events.clone();
        if let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(retention_days))) {
            kept.retain(|date, _bins| *date > cutoff);
        }
        let removed = self.events.len() - kept.len();
        self.save(&kept).await?;
        self.events = kept;
        debug!(removed, remaining = self.events.len(), "Pruned stored bin collection events");
        Ok(removed)
    }

    /// Whether an event for `bin` on `date` was already created.
    #[must_use]
    pub fn contains(&self, date: NaiveDate, bin: BinType) -> bool {
        self.events.get(&date).is_some_and(|bins| bins.contains(&bin))
    }

    /// Remember that an event for `bin` on `date` was created.
    ///
    /// The record is on disk when this returns. Recording a known pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the record cannot be written.
    pub async fn record(&mut self, date: NaiveDate, bin: BinType) -> PersistResult {
        if self.contains(date, bin) {
            return Ok(());
        }
        let mut updated = self.events.clone();
        updated.entry(date).or_default().insert(bin);
        self.save(&updated).await?;
        self.events = updated;
        debug!(%date, %bin, "Added event to storage");
        Ok(())
    }

    /// Forget every stored event.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the emptied record cannot be written.
    pub async fn clear(&mut self) -> PersistResult {
        if self.events.is_empty() {
            info!("Attempted to clear bin events, but no data was found");
            return Ok(());
        }
        self.save(&BTreeMap::new()).await?;
        let dates = self.events.len();
        self.events.clear();
        info!(dates, "Cleared stored bin collection events");
        Ok(())
    }

    /// Whether no event is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of stored (date, bin type) pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.values().map(BTreeSet::len).sum()
    }

    /// Iterate over stored dates and the bin types recorded for them.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &BTreeSet<BinType>)> {
        self.events.iter().map(|(date, bins)| (*date, bins))
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Writes `events` to disk; the in-memory record is only replaced by callers on success.
    async fn save(&self, events: &BTreeMap<NaiveDate, BTreeSet<BinType>>) -> PersistResult {
        let envelope = Envelope {
            version: STORAGE_VERSION,
            key: STORAGE_KEY,
            data: events,
        };
        let bytes = serde_json::to_vec_pretty(&envelope)?;
        let staging = self.staging_path();

        self.write_synced(&staging, &bytes)
            .await
            .map_err(|source| StoreError::Io {
                path: staging.clone(),
                source,
            })?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn write_synced(&self, staging: &Path, bytes: &[u8]) -> Result<(), IoError> {
        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(staging).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }
}

fn decode(raw: &str, path: &Path) -> BTreeMap<NaiveDate, BTreeSet<BinType>> {
    let mut events = BTreeMap::new();
    let Some(data) = envelope_data(raw, path) else {
        return events;
    };

    for (key, value) in data {
        let Ok(date) = NaiveDate::parse_from_str(&key, ISO_DATE_FORMAT) else {
            warn!(key, "Dropping stored events with an invalid date key");
            continue;
        };
        let Value::Array(labels) = value else {
            warn!(%date, "Dropping stored events that are not a list");
            continue;
        };
        let bins: BTreeSet<BinType> = labels
            .iter()
            .filter_map(|label| match label.as_str().map(str::parse::<BinType>) {
                Some(Ok(bin)) => Some(bin),
                _ => {
                    warn!(%date, %label, "Dropping stored event with an unknown bin type");
                    None
                }
            })
            .collect();
        if !bins.is_empty() {
            events.insert(date, bins);
        }
    }
    events
}

fn envelope_data(raw: &str, path: &Path) -> Option<Map<String, Value>> {
    let envelope = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(envelope)) => envelope,
        Ok(_) => {
            warn!(path = %path.display(), "Invalid storage format detected, resetting data");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Unreadable storage detected, resetting data");
            return None;
        }
    };

    let version = envelope.get("version").and_then(Value::as_u64);
    if version != Some(STORAGE_VERSION) {
        warn!(?version, "Unsupported storage version, resetting data");
        return None;
    }

    match envelope.get("data") {
        Some(Value::Object(data)) => Some(data.clone()),
        None | Some(Value::Null) => None,
        Some(_) => {
            warn!(path = %path.display(), "Stored data is not a mapping, resetting data");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, ISO_DATE_FORMAT).unwrap()
    }

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("events.json")
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = EventStore::load(store_path(&dir)).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn record_survives_reload() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store
            .record(date("2025-12-25"), BinType::Domestic)
            .await
            .unwrap();

        let reloaded = EventStore::load(store_path(&dir)).await.unwrap();
        assert!(reloaded.contains(date("2025-12-25"), BinType::Domestic));
        assert!(!reloaded.contains(date("2025-12-25"), BinType::Recycling));
        assert_eq!(reloaded.len(), 1);
    }

    #[tokio::test]
    async fn record_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store.record(date("2025-12-25"), BinType::Domestic).await.unwrap();
        store.record(date("2025-12-25"), BinType::Domestic).await.unwrap();
        store.record(date("2025-12-25"), BinType::Recycling).await.unwrap();

        let raw = std::fs::read_to_string(store_path(&dir)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value["data"]["2025-12-25"],
            serde_json::json!(["Domestic Collections", "Recycling Collections"])
        );
        assert_eq!(value["version"], 1);
        assert_eq!(value["key"], STORAGE_KEY);
    }

    #[tokio::test]
    async fn prune_keeps_only_dates_after_cutoff() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        for text in ["2025-11-30", "2025-12-01", "2025-12-02", "2025-12-20"] {
            store.record(date(text), BinType::Domestic).await.unwrap();
        }

        let removed = store.prune(14, date("2025-12-15")).await.unwrap();

        assert_eq!(removed, 2);
        assert!(!store.contains(date("2025-11-30"), BinType::Domestic));
        assert!(!store.contains(date("2025-12-01"), BinType::Domestic));
        assert!(store.contains(date("2025-12-02"), BinType::Domestic));
        assert!(store.contains(date("2025-12-20"), BinType::Domestic));

        let reloaded = EventStore::load(store_path(&dir)).await.unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn malformed_file_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        for raw in ["not json", "[1, 2, 3]", r#"{"version": 1, "data": ["2025-12-25"]}"#] {
            std::fs::write(store_path(&dir), raw).unwrap();
            let store = EventStore::load(store_path(&dir)).await.unwrap();
            assert!(store.is_empty(), "expected empty store for {raw}");
        }
    }

    #[tokio::test]
    async fn legacy_and_unknown_entries_are_dropped() {
        let dir = TempDir::new().unwrap();
        let raw = serde_json::json!({
            "version": 1,
            "key": STORAGE_KEY,
            "data": {
                "2025-12-25": ["Domestic Collections", "Glass Collections"],
                "2025-12-26": "Recycling Collections",
                "25/12/2025": ["Domestic Collections"],
            }
        });
        std::fs::write(store_path(&dir), raw.to_string()).unwrap();

        let store = EventStore::load(store_path(&dir)).await.unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(date("2025-12-25"), BinType::Domestic));
    }

    #[tokio::test]
    async fn clear_empties_the_file() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store.record(date("2025-12-25"), BinType::GardenFood).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        let reloaded = EventStore::load(store_path(&dir)).await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("events.json");
        let mut store = EventStore::load(&path).await.unwrap();
        store.record(date("2026-01-02"), BinType::Recycling).await.unwrap();
        assert!(path.exists());
    }

    async fn block_staging(dir: &TempDir) {
        fs::create_dir(dir.path().join("events.json.tmp")).await.unwrap();
    }

    async fn unblock_staging(dir: &TempDir) {
        fs::remove_dir(dir.path().join("events.json.tmp")).await.unwrap();
    }

    #[tokio::test]
    async fn failed_record_is_not_remembered() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();

        block_staging(&dir).await;
        let first = store.record(date("2025-12-25"), BinType::Domestic).await;
        assert!(matches!(first, Err(StoreError::Io { .. })));
        assert!(!store.contains(date("2025-12-25"), BinType::Domestic));

        unblock_staging(&dir).await;
        store.record(date("2025-12-25"), BinType::Domestic).await.unwrap();
        let reloaded = EventStore::load(store_path(&dir)).await.unwrap();
        assert!(reloaded.contains(date("2025-12-25"), BinType::Domestic));
    }

    #[tokio::test]
    async fn failed_clear_keeps_events() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store.record(date("2025-12-25"), BinType::Recycling).await.unwrap();

        block_staging(&dir).await;
        assert!(store.clear().await.is_err());
        assert_eq!(store.len(), 1);

        unblock_staging(&dir).await;
        store.clear().await.unwrap();
        assert!(store.is_empty());
        let reloaded = EventStore::load(store_path(&dir)).await.unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn failed_prune_keeps_events() {
        let dir = TempDir::new().unwrap();
        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store.record(date("2025-11-01"), BinType::Domestic).await.unwrap();

        block_staging(&dir).await;
        assert!(store.prune(14, date("2025-12-15")).await.is_err());
        assert!(store.contains(date("2025-11-01"), BinType::Domestic));

        unblock_staging(&dir).await;
        assert_eq!(store.prune(14, date("2025-12-15")).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn staging_file_does_not_touch_siblings() {
        let dir = TempDir::new().unwrap();
        let sibling = dir.path().join("events.tmp");
        fs::write(&sibling, "keep me").await.unwrap();

        let mut store = EventStore::load(store_path(&dir)).await.unwrap();
        store.record(date("2025-12-25"), BinType::GardenFood).await.unwrap();

        assert_eq!(fs::read_to_string(&sibling).await.unwrap(), "keep me");
        assert!(!dir.path().join("events.json.tmp").exists());
    }

    #[tokio::test]
    async fn tmp_named_store_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.tmp");
        let mut store = EventStore::load(&path).await.unwrap();
        store.record(date("2025-12-25"), BinType::Domestic).await.unwrap();

        let reloaded = EventStore::load(&path).await.unwrap();
        assert!(reloaded.contains(date("2025-12-25"), BinType::Domestic));
    }
}
