//! InMemoryKeyValueStore - プロセス内 KV（テスト・CLI 用）

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;

use crate::domain::TrackerError;
use crate::ports::KeyValueStore;

#[derive(Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, Value>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, TrackerError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), TrackerError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TrackerError> {
        self.values.lock().remove(key);
        Ok(())
    }
}
