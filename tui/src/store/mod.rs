mod sqlite;

use std::path::Path;

use inventory_core::store::{KvStore, MemoryStore, StoreResult};
use inventory_core::StoreError;

pub use sqlite::SqliteStore;

const STORE_VAR: &str = "INVENTORY_STORE";

/// Opens the store selected by `INVENTORY_STORE` (`sqlite` by default,
/// `memory` for a throwaway session).
pub fn open_store(path: &Path) -> StoreResult<Box<dyn KvStore + Send>> {
    let backend = std::env::var(STORE_VAR).unwrap_or_else(|_| "sqlite".to_string());
    match backend.as_str() {
        "sqlite" => Ok(Box::new(SqliteStore::open(path)?)),
        "memory" => Ok(Box::new(MemoryStore::new())),
        other => Err(StoreError::Backend(format!("Unknown {STORE_VAR} '{other}'"))),
    }
}
