// Shared state structs to avoid circular dependencies.
// These are used by the Tauri shell and the pure modules alike, and can be tested independently.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::modules::soundboard::Soundboard;
use crate::settings::Settings;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Tab {
    pub id: String,
    pub name: String,
}

/// Per-tab persisted data: card order plus the cue and name overrides keyed by path.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabState {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub cue_positions: BTreeMap<String, f64>,
    #[serde(default)]
    pub custom_names: BTreeMap<String, String>,
}

impl TabState {
    /// Lenient parse of a stored state blob. Anything malformed is dropped field by field,
    /// so the result is always well-formed even when the record on disk is not.
    pub fn from_value(value: &Value) -> Self {
        let mut state = TabState {
            files: parse_file_list(value.get("files")),
            cue_positions: parse_cue_map(value.get("cuePositions")),
            custom_names: parse_name_map(value.get("customNames")),
        };
        state.prune_orphans();
        state
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.cue_positions.is_empty() && self.custom_names.is_empty()
    }

    /// Drops cue and name entries whose path is no longer in `files`.
    pub fn prune_orphans(&mut self) {
        let files = &self.files;
        self.cue_positions.retain(|path, _| files.contains(path));
        self.custom_names.retain(|path, _| files.contains(path));
    }

    /// Removes every occurrence of `path` together with its metadata.
    /// Returns true if anything was removed.
    pub fn remove_all(&mut self, path: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f != path);
        let had_cue = self.cue_positions.remove(path).is_some();
        let had_name = self.custom_names.remove(path).is_some();
        before != self.files.len() || had_cue || had_name
    }
}

pub fn is_valid_cue(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

pub fn parse_file_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_cue_map(value: Option<&Value>) -> BTreeMap<String, f64> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(path, v)| v.as_f64().filter(|s| is_valid_cue(*s)).map(|s| (path.clone(), s)))
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_name_map(value: Option<&Value>) -> BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(path, v)| {
                    let name = v.as_str()?.trim();
                    (!name.is_empty()).then(|| (path.clone(), name.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub struct AppState {
    pub board: Mutex<Soundboard>,
    pub settings: RwLock<Settings>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_drops_malformed_fields() {
        let raw = json!({
            "files": ["/a.mp3", 42, null, "/b.wav", ""],
            "cuePositions": { "/a.mp3": 12.5, "/b.wav": -1.0, "/c.mp3": 3.0, "/x": "soon" },
            "customNames": { "/a.mp3": "  Intro  ", "/b.wav": "   ", "/c.mp3": "Gone" }
        });

        let state = TabState::from_value(&raw);

        assert_eq!(state.files, vec!["/a.mp3", "/b.wav"]);
        assert_eq!(state.cue_positions.len(), 1);
        assert_eq!(state.cue_positions["/a.mp3"], 12.5);
        assert_eq!(state.custom_names.len(), 1);
        assert_eq!(state.custom_names["/a.mp3"], "Intro");
    }

    #[test]
    fn from_value_tolerates_wrong_shape() {
        assert_eq!(TabState::from_value(&json!("garbage")), TabState::default());
        assert_eq!(TabState::from_value(&json!({ "files": {} })), TabState::default());
    }

    #[test]
    fn remove_all_clears_metadata() {
        let mut state = TabState {
            files: vec!["/a.mp3".into(), "/b.mp3".into(), "/a.mp3".into()],
            ..Default::default()
        };
        state.cue_positions.insert("/a.mp3".into(), 1.0);
        state.custom_names.insert("/a.mp3".into(), "A".into());

        assert!(state.remove_all("/a.mp3"));
        assert_eq!(state.files, vec!["/b.mp3"]);
        assert!(state.cue_positions.is_empty());
        assert!(state.custom_names.is_empty());
        assert!(!state.remove_all("/a.mp3"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut state = TabState::default();
        state.files.push("/a.mp3".into());
        state.cue_positions.insert("/a.mp3".into(), 2.0);
        let value = serde_json::to_value(&state).unwrap();
        assert!(value.get("cuePositions").is_some());
        assert!(value.get("customNames").is_some());
    }
}
