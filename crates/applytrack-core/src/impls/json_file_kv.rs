//! JsonFileKeyValueStore - 1 ファイルの JSON オブジェクトに永続化する KV
//!
//! # 実装詳細
//! - 起動時に全体を読み込み、書き込みごとに全体を書き出す（小さなデータ前提）
//! - 一時ファイル + rename で書き込みを atomic にする

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::domain::TrackerError;
use crate::ports::KeyValueStore;

pub struct JsonFileKeyValueStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, Value>>,
}

fn storage_error(operation: &str, path: &Path, err: std::io::Error) -> TrackerError {
    TrackerError::Storage(format!("{operation} {}: {err}", path.display()))
}

impl JsonFileKeyValueStore {
    /// Open (or lazily create) the store at `path`. A missing file is an
    /// empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TrackerError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(storage_error("read", &path, e)),
        };
        debug!(path = %path.display(), keys = values.len(), "key-value store opened");
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, Value>) -> Result<(), TrackerError> {
        let bytes = serde_json::to_vec_pretty(values)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| storage_error("create directory", parent, e))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file =
            fs::File::create(&temp_path).map_err(|e| storage_error("create", &temp_path, e))?;
        file.write_all(&bytes)
            .map_err(|e| storage_error("write", &temp_path, e))?;
        file.sync_all()
            .map_err(|e| storage_error("sync", &temp_path, e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| storage_error("rename", &self.path, e))
    }
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, TrackerError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), TrackerError> {
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value);
        if let Err(err) = self.flush(&values) {
            // keep memory and disk in agreement
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TrackerError> {
        let mut values = self.values.lock();
        let Some(previous) = values.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.flush(&values) {
            values.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("kv.json");

        let store = JsonFileKeyValueStore::open(&path).unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", json!([{"title": "Onsite"}])).unwrap();
        store.set("b", json!(1)).unwrap();
        store.remove("b").unwrap();
        drop(store);

        let reopened = JsonFileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap(), Some(json!([{"title": "Onsite"}])));
        assert_eq!(reopened.get("b").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonFileKeyValueStore::open(&path).err().unwrap();
        assert!(matches!(err, TrackerError::Serialization(_)));
    }
}
