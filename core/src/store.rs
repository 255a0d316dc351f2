use std::collections::HashMap;

use crate::error::StoreError;

pub const INVENTORY_KEY: &str = "inventory_data";
pub const SOURCE_LINK_KEY: &str = "inventory_source_link";

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable string key-value storage for the collection and the source link.
pub trait KvStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
