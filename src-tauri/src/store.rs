// Key-value persistence for the soundboard records.
// One JSON document per key; no transactions across keys.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::{SoundboardError, SoundboardResult};

pub const TABS_KEY: &str = "soundboardTabs";
pub const TAB_STATES_KEY: &str = "soundboardTabStates";
pub const ACTIVE_TAB_KEY: &str = "soundboardActiveTab";

// Single-tab records from before tabs existed. Read once by the migration, then deleted.
pub const LEGACY_FILES_KEY: &str = "soundboardFiles";
pub const LEGACY_CUES_KEY: &str = "soundboardCuePositions";
pub const LEGACY_NAMES_KEY: &str = "soundboardCustomNames";

pub trait KeyValueStore: Send {
    /// Reads a record. `Ok(None)` when absent, `MalformedData` when it does not parse.
    fn read(&self, key: &str) -> SoundboardResult<Option<Value>>;

    fn save(&mut self, key: &str, value: &Value) -> SoundboardResult<()>;

    fn remove(&mut self, key: &str);

    /// Fail-open read: any error is logged and the record treated as absent.
    fn load(&self, key: &str) -> Option<Value> {
        match self.read(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("[Store] Ignoring record '{}': {}", key, e);
                None
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.load(key).is_some()
    }
}

/// Serializes `value` and writes it under `key`.
pub fn save_json<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, value: &T) -> SoundboardResult<()> {
    let json = serde_json::to_value(value).map_err(|e| SoundboardError::Storage {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.save(key, &json)
}

fn parse_record(key: &str, raw: &str) -> SoundboardResult<Option<Value>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| SoundboardError::MalformedData {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// File-backed store: `<dir>/<key>.json`, written atomically.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> SoundboardResult<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        parse_record(key, &raw)
    }

    fn save(&mut self, key: &str, value: &Value) -> SoundboardResult<()> {
        let storage_err = |e: std::io::Error| SoundboardError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        };
        let path = self.path_for(key);
        let tmp_path = path.with_extension("tmp");

        fs::create_dir_all(&self.dir).map_err(storage_err)?;

        let json = serde_json::to_string_pretty(value).map_err(|e| SoundboardError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        // Atomic write: tmp + rename (same pattern as settings.rs)
        fs::write(&tmp_path, json).map_err(storage_err)?;
        fs::rename(tmp_path, path).map_err(storage_err)?;

        Ok(())
    }

    fn remove(&mut self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                log::warn!("[Store] Failed to remove {:?}: {}", path, e);
            }
        }
    }
}

/// In-process store. Keeps raw text so tests can seed corrupt records.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_raw(mut self, key: &str, raw: &str) -> Self {
        self.entries.insert(key.to_string(), raw.to_string());
        self
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> SoundboardResult<Option<Value>> {
        match self.entries.get(key) {
            Some(raw) => parse_record(key, raw),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: &str, value: &Value) -> SoundboardResult<()> {
        let json = serde_json::to_string(value).map_err(|e| SoundboardError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.entries.insert(key.to_string(), json);
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("data"));

        store.save(TABS_KEY, &json!([{ "id": "tab-1", "name": "Tab 1" }])).unwrap();

        let loaded = store.load(TABS_KEY).unwrap();
        assert_eq!(loaded[0]["name"], "Tab 1");
        assert!(!dir.path().join("data").join("soundboardTabs.tmp").exists());
    }

    #[test]
    fn file_store_fails_open_on_corrupt_record() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("soundboardTabStates.json"), "{ not json").unwrap();
        let store = JsonFileStore::new(dir.path());

        assert!(matches!(
            store.read(TAB_STATES_KEY),
            Err(SoundboardError::MalformedData { .. })
        ));
        assert!(store.load(TAB_STATES_KEY).is_none());
    }

    #[test]
    fn file_store_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::new(dir.path());
        store.save(ACTIVE_TAB_KEY, &json!("tab-1")).unwrap();

        store.remove(ACTIVE_TAB_KEY);
        store.remove(ACTIVE_TAB_KEY);

        assert!(!store.contains(ACTIVE_TAB_KEY));
    }

    #[test]
    fn file_store_reports_write_failure() {
        let dir = TempDir::new().unwrap();
        // A regular file where the data directory should be.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "x").unwrap();
        let mut store = JsonFileStore::new(&blocker);

        let err = store.save(TABS_KEY, &json!([])).unwrap_err();
        assert!(matches!(err, SoundboardError::Storage { .. }));
    }

    #[test]
    fn memory_store_seeded_with_raw_text() {
        let store = MemoryStore::new()
            .with_raw(LEGACY_FILES_KEY, r#"["/a.mp3"]"#)
            .with_raw(LEGACY_CUES_KEY, "{{{");

        assert_eq!(store.load(LEGACY_FILES_KEY), Some(json!(["/a.mp3"])));
        assert!(store.load(LEGACY_CUES_KEY).is_none());
        assert!(store.raw(LEGACY_CUES_KEY).is_some());
    }

    #[test]
    fn save_json_serializes_structs() {
        let mut store = MemoryStore::new();
        save_json(&mut store, ACTIVE_TAB_KEY, &"tab-9").unwrap();
        assert_eq!(store.load(ACTIVE_TAB_KEY), Some(json!("tab-9")));
    }
}
