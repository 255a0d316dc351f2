pub mod assistant;
pub mod csv_line;
pub mod error;
pub mod poller;
pub mod record;
pub mod search;
pub mod sheet_link;
pub mod state;
pub mod store;
pub mod sync;

use serde::{Deserialize, Serialize};

pub use error::{AssistantError, StoreError, SyncError};
pub use poller::{SyncScheduler, SyncUpdate};
pub use record::Record;
pub use search::{Autocomplete, search};
pub use state::{InventoryState, StatusKind, StatusMessage};
pub use store::{KvStore, MemoryStore};
pub use sync::{HttpFetcher, SheetFetcher, SyncMode, SyncOutcome};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Section {
    Dashboard,
    Query,
    Inventory,
    Settings,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Dashboard,
        Section::Query,
        Section::Inventory,
        Section::Settings,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Query => "Query",
            Section::Inventory => "Inventory",
            Section::Settings => "Settings",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Link used when none has been saved yet.
    pub default_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub inactivity_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            request_timeout_secs: 15,
            default_link: String::new(),
        }
    }
}

impl SyncConfig {
    /// Replaces zero durations, which would poll or time out immediately,
    /// with the defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.interval_secs == 0 {
            tracing::warn!(default = defaults.interval_secs, "sync.interval_secs is 0, using default");
            self.interval_secs = defaults.interval_secs;
        }
        if self.request_timeout_secs == 0 {
            tracing::warn!(
                default = defaults.request_timeout_secs,
                "sync.request_timeout_secs is 0, using default"
            );
            self.request_timeout_secs = defaults.request_timeout_secs;
        }
        self
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_suggestions: 5 }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.0-flash".to_string(),
            timeout_secs: 30,
            inactivity_secs: 60,
        }
    }
}
