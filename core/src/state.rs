use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::Section;
use crate::error::SyncError;
use crate::record::{Record, same_contents, seed_inventory};
use crate::store::{INVENTORY_KEY, KvStore, SOURCE_LINK_KEY};
use crate::sync::{SyncMode, SyncOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub message: String,
}

impl StatusMessage {
    fn success(message: String) -> Self {
        Self {
            kind: StatusKind::Success,
            message,
        }
    }

    fn error(message: String) -> Self {
        Self {
            kind: StatusKind::Error,
            message,
        }
    }
}

/// Application state shared by every view.
///
/// The collection is only ever replaced through [`InventoryState::finish_sync`];
/// views read it through the accessors. The collection and the source link
/// are written to the store whenever they change.
pub struct InventoryState {
    records: Vec<Record>,
    source_link: String,
    section: Section,
    selected: Option<Record>,
    syncing: bool,
    status: Option<StatusMessage>,
    last_updated: Option<DateTime<Utc>>,
    store: Box<dyn KvStore + Send>,
}

impl InventoryState {
    /// Restores the persisted collection and link. A missing or unreadable
    /// collection falls back to the demonstration seed.
    pub fn load(store: Box<dyn KvStore + Send>, default_link: &str) -> Self {
        let records = match store.get(INVENTORY_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Record>>(&json) {
                Ok(records) => records,
                Err(err) => {
                    warn!(error = %err, "stored inventory is unreadable, using seed data");
                    seed_inventory()
                }
            },
            Ok(None) => seed_inventory(),
            Err(err) => {
                warn!(error = %err, "failed to read stored inventory, using seed data");
                seed_inventory()
            }
        };

        let source_link = match store.get(SOURCE_LINK_KEY) {
            Ok(Some(link)) => link,
            Ok(None) => default_link.to_string(),
            Err(err) => {
                warn!(error = %err, "failed to read stored source link");
                default_link.to_string()
            }
        };

        debug!(records = records.len(), "inventory state loaded");
        Self {
            records,
            source_link,
            section: Section::Dashboard,
            selected: None,
            syncing: false,
            status: None,
            last_updated: None,
            store,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn source_link(&self) -> &str {
        &self.source_link
    }

    /// Stores a new source link. Returns `false` when nothing changed.
    pub fn set_source_link(&mut self, link: &str) -> bool {
        let link = link.trim();
        if link == self.source_link {
            return false;
        }
        self.source_link = link.to_string();
        if let Err(err) = self.store.set(SOURCE_LINK_KEY, &self.source_link) {
            warn!(error = %err, "failed to persist source link");
        }
        info!(link = %self.source_link, "source link changed");
        true
    }

    pub fn section(&self) -> Section {
        self.section
    }

    pub fn set_section(&mut self, section: Section) {
        self.section = section;
    }

    /// The selected record is a snapshot; a later sync does not clear it.
    pub fn selected(&self) -> Option<&Record> {
        self.selected.as_ref()
    }

    pub fn select(&mut self, record: Record) {
        self.selected = Some(record);
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn total_units(&self) -> u64 {
        self.records.iter().map(|record| record.quantity).sum()
    }

    pub fn location_count(&self) -> usize {
        self.records
            .iter()
            .map(|record| record.location.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn begin_sync(&mut self, mode: SyncMode) {
        if mode == SyncMode::Interactive {
            self.syncing = true;
            self.status = None;
        }
    }

    /// Forgets a fetch that belongs to a superseded source link.
    pub fn abandon_sync(&mut self, mode: SyncMode) {
        if mode == SyncMode::Interactive {
            self.syncing = false;
        }
    }

    /// Applies the result of a fetch. Errors become the status line in
    /// interactive mode and are only logged in background mode; either way
    /// the current collection is kept.
    pub fn finish_sync(
        &mut self,
        mode: SyncMode,
        result: Result<Vec<Record>, SyncError>,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        if mode == SyncMode::Interactive {
            self.syncing = false;
        }

        match result {
            Ok(records) => {
                let outcome = self.reconcile(records, now);
                if mode == SyncMode::Interactive {
                    let message = match outcome {
                        SyncOutcome::Replaced { records } => format!("Synced! {records} items."),
                        SyncOutcome::Unchanged { records } => {
                            format!("Already up to date. {records} items.")
                        }
                    };
                    self.status = Some(StatusMessage::success(message));
                }
                Ok(outcome)
            }
            Err(err) => {
                match mode {
                    SyncMode::Interactive => {
                        warn!(error = %err, "sync failed");
                        self.status = Some(StatusMessage::error(err.to_string()));
                    }
                    SyncMode::Background => {
                        warn!(error = %err, "background sync failed");
                    }
                }
                Err(err)
            }
        }
    }

    fn reconcile(&mut self, mut records: Vec<Record>, now: DateTime<Utc>) -> SyncOutcome {
        if same_contents(&records, &self.records) {
            debug!(records = records.len(), "sheet unchanged");
            return SyncOutcome::Unchanged {
                records: records.len(),
            };
        }

        let mut arrivals: HashMap<(&str, &str), DateTime<Utc>> = HashMap::new();
        for previous in &self.records {
            arrivals
                .entry((previous.name.as_str(), previous.location.as_str()))
                .or_insert(previous.arrival_date);
        }
        for record in &mut records {
            if let Some(arrival) = arrivals.get(&(record.name.as_str(), record.location.as_str())) {
                record.arrival_date = *arrival;
            }
        }

        self.records = records;
        self.last_updated = Some(now);
        self.persist_records();
        info!(records = self.records.len(), "inventory replaced");
        SyncOutcome::Replaced {
            records: self.records.len(),
        }
    }

    fn persist_records(&mut self) {
        let json = match serde_json::to_string(&self.records) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize inventory");
                return;
            }
        };
        if let Err(err) = self.store.set(INVENTORY_KEY, &json) {
            warn!(error = %err, "failed to persist inventory");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Duration;

    use super::*;
    use crate::store::{MemoryStore, StoreResult};

    #[derive(Clone, Default)]
    struct CountingStore {
        inner: Arc<Mutex<(MemoryStore, usize)>>,
    }

    impl CountingStore {
        fn writes(&self) -> usize {
            self.inner.lock().unwrap().1
        }
    }

    impl KvStore for CountingStore {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.lock().unwrap().0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.1 += 1;
            inner.0.set(key, value)
        }
    }

    fn record(name: &str, location: &str, quantity: &str, at: DateTime<Utc>) -> Record {
        let cols = vec![quantity.to_string(), name.to_string(), location.to_string(), "Ana".to_string()];
        Record::from_columns(&cols, 0, at).unwrap()
    }

    #[test]
    fn empty_store_starts_from_seed() {
        let state = InventoryState::load(Box::new(MemoryStore::new()), "");
        assert_eq!(state.records(), seed_inventory().as_slice());
        assert_eq!(state.source_link(), "");
        assert_eq!(state.section(), Section::Dashboard);
    }

    #[test]
    fn corrupt_store_falls_back_to_seed() {
        let mut store = MemoryStore::new();
        store.set(INVENTORY_KEY, "{not json").unwrap();
        store.set(SOURCE_LINK_KEY, "https://docs.google.com/spreadsheets/d/x").unwrap();
        let state = InventoryState::load(Box::new(store), "");
        assert_eq!(state.records().len(), seed_inventory().len());
        assert_eq!(state.source_link(), "https://docs.google.com/spreadsheets/d/x");
    }

    #[test]
    fn replacement_is_persisted_and_reloaded() {
        let store = CountingStore::default();
        let mut state = InventoryState::load(Box::new(store.clone()), "");
        let now = Utc::now();
        let outcome = state
            .finish_sync(SyncMode::Background, Ok(vec![record("Desk", "Room 1", "2", now)]), now)
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Replaced { records: 1 });
        assert_eq!(store.writes(), 1);
        assert_eq!(state.last_updated(), Some(now));

        let reloaded = InventoryState::load(Box::new(store), "");
        assert_eq!(reloaded.records(), state.records());
    }

    #[test]
    fn identical_content_is_unchanged_without_a_write() {
        let store = CountingStore::default();
        let mut state = InventoryState::load(Box::new(store.clone()), "");
        let first = Utc::now();
        state
            .finish_sync(SyncMode::Background, Ok(vec![record("Desk", "Room 1", "2", first)]), first)
            .unwrap();
        let writes = store.writes();

        let later = first + Duration::minutes(1);
        let outcome = state
            .finish_sync(SyncMode::Background, Ok(vec![record("Desk", "Room 1", "2", later)]), later)
            .unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged { records: 1 });
        assert_eq!(store.writes(), writes);
        assert_eq!(state.last_updated(), Some(first));
        assert_eq!(state.records()[0].arrival_date, first);
    }

    #[test]
    fn arrival_dates_carry_over_for_known_items() {
        let mut state = InventoryState::load(Box::new(MemoryStore::new()), "");
        let first = Utc::now() - Duration::days(40);
        state
            .finish_sync(SyncMode::Background, Ok(vec![record("Desk", "Room 1", "2", first)]), first)
            .unwrap();

        let now = Utc::now();
        state
            .finish_sync(
                SyncMode::Background,
                Ok(vec![record("Desk", "Room 1", "3", now), record("Lamp", "Room 1", "1", now)]),
                now,
            )
            .unwrap();
        assert_eq!(state.records()[0].arrival_date, first);
        assert_eq!(state.records()[1].arrival_date, now);
    }

    #[test]
    fn interactive_failure_sets_status_and_keeps_collection() {
        let mut state = InventoryState::load(Box::new(MemoryStore::new()), "");
        let before = state.records().to_vec();
        state.begin_sync(SyncMode::Interactive);
        assert!(state.is_syncing());

        let result = state.finish_sync(SyncMode::Interactive, Err(SyncError::AccessDenied), Utc::now());
        assert_eq!(result, Err(SyncError::AccessDenied));
        assert!(!state.is_syncing());
        assert_eq!(state.records(), before.as_slice());
        let status = state.status().unwrap();
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, SyncError::AccessDenied.to_string());
    }

    #[test]
    fn background_failure_is_silent() {
        let mut state = InventoryState::load(Box::new(MemoryStore::new()), "");
        let result = state.finish_sync(SyncMode::Background, Err(SyncError::EmptySource), Utc::now());
        assert!(result.is_err());
        assert!(state.status().is_none());
    }

    #[test]
    fn selection_survives_replacement() {
        let mut state = InventoryState::load(Box::new(MemoryStore::new()), "");
        let chosen = state.records()[0].clone();
        state.select(chosen.clone());
        let now = Utc::now();
        state
            .finish_sync(SyncMode::Background, Ok(vec![record("Desk", "Room 1", "2", now)]), now)
            .unwrap();
        assert_eq!(state.selected(), Some(&chosen));
    }

    #[test]
    fn link_changes_are_persisted_once() {
        let store = CountingStore::default();
        let mut state = InventoryState::load(Box::new(store.clone()), "");
        assert!(state.set_source_link(" https://docs.google.com/spreadsheets/d/abc "));
        assert!(!state.set_source_link("https://docs.google.com/spreadsheets/d/abc"));
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.get(SOURCE_LINK_KEY).unwrap().as_deref(),
            Some("https://docs.google.com/spreadsheets/d/abc")
        );
    }

    #[test]
    fn dashboard_totals() {
        let state = InventoryState::load(Box::new(MemoryStore::new()), "");
        assert_eq!(state.total_units(), 12 + 25 + 45 + 150 + 5);
        assert_eq!(state.location_count(), 5);
    }
}
