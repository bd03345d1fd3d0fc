//! File-backed storage backend.

use crate::{LocalStore, StorageError, StorageResult};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Mutex;

/// JSON-file-backed store.
///
/// The whole store is one flat JSON object rewritten on every mutation.
/// That is fine for the handful of flow-state keys this subsystem keeps;
/// the mutex serializes read-modify-write within the process.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by the given file. The file is created lazily
    /// on first write; a missing file reads as an empty store.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_map(&self) -> StorageResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&content)
            .map_err(|e| StorageError::Encoding(format!("corrupt flow-state file: {}", e)))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::Encoding(
                "flow-state file is not a JSON object".to_string(),
            )),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(map.clone()))
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.lock.lock().unwrap();
        let map = self.read_map()?;
        Ok(map.get(key).and_then(|v| v.as_str()).map(String::from))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let _guard = self.lock.lock().unwrap();
        let mut map = self.read_map()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }
}
