// One-time migration of the pre-tab records into tab-scoped state.
// Pure logic over a KeyValueStore - no Tauri imports.

use std::collections::HashMap;

use crate::state::{parse_cue_map, parse_file_list, parse_name_map, Tab, TabState};
use crate::store::{KeyValueStore, LEGACY_CUES_KEY, LEGACY_FILES_KEY, LEGACY_NAMES_KEY};

const LEGACY_KEYS: [&str; 3] = [LEGACY_FILES_KEY, LEGACY_CUES_KEY, LEGACY_NAMES_KEY];

#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    /// No legacy record present.
    NothingToMigrate,
    /// Legacy data moved into the given tab.
    Migrated { tab_id: String, files: usize },
    /// Legacy records existed but could not be claimed unambiguously; they were dropped.
    Discarded { reason: String },
}

/// Moves legacy single-tab records into the only tab when exactly one empty tab exists.
/// Legacy keys are deleted in every case where any of them was present, so the step runs once.
pub fn migrate_legacy(
    store: &mut dyn KeyValueStore,
    tabs: &[Tab],
    states: &mut HashMap<String, TabState>,
) -> MigrationOutcome {
    // A corrupt legacy record still counts as present so it gets cleaned up.
    let present = LEGACY_KEYS.iter().any(|key| !matches!(store.read(key), Ok(None)));
    if !present {
        return MigrationOutcome::NothingToMigrate;
    }

    let outcome = match tabs {
        [only] if states.get(&only.id).map_or(true, TabState::is_empty) => {
            let mut legacy = TabState {
                files: parse_file_list(store.load(LEGACY_FILES_KEY).as_ref()),
                cue_positions: parse_cue_map(store.load(LEGACY_CUES_KEY).as_ref()),
                custom_names: parse_name_map(store.load(LEGACY_NAMES_KEY).as_ref()),
            };
            legacy.prune_orphans();
            let files = legacy.files.len();
            states.insert(only.id.clone(), legacy);
            log::info!("[Migration] Moved {} legacy file(s) into tab '{}'", files, only.name);
            MigrationOutcome::Migrated {
                tab_id: only.id.clone(),
                files,
            }
        }
        [_] => MigrationOutcome::Discarded {
            reason: "the only tab already has data".to_string(),
        },
        _ => MigrationOutcome::Discarded {
            reason: format!("{} tabs exist, target is ambiguous", tabs.len()),
        },
    };

    if let MigrationOutcome::Discarded { reason } = &outcome {
        log::warn!("[Migration] Discarding legacy records: {}", reason);
    }

    for key in LEGACY_KEYS {
        store.remove(key);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tab(id: &str) -> Tab {
        Tab {
            id: id.to_string(),
            name: format!("Tab {}", id),
        }
    }

    fn legacy_store() -> MemoryStore {
        MemoryStore::new()
            .with_raw(LEGACY_FILES_KEY, r#"["/a.mp3", "/b.wav"]"#)
            .with_raw(LEGACY_CUES_KEY, r#"{"/a.mp3": 4.5, "/gone.mp3": 1.0}"#)
            .with_raw(LEGACY_NAMES_KEY, r#"{"/b.wav": " Bell "}"#)
    }

    #[test]
    fn test_migrates_into_single_empty_tab() {
        let mut store = legacy_store();
        let tabs = vec![tab("1")];
        let mut states = HashMap::new();

        let outcome = migrate_legacy(&mut store, &tabs, &mut states);

        assert_eq!(outcome, MigrationOutcome::Migrated { tab_id: "1".into(), files: 2 });
        let state = &states["1"];
        assert_eq!(state.files, vec!["/a.mp3", "/b.wav"]);
        assert_eq!(state.cue_positions.len(), 1);
        assert_eq!(state.custom_names["/b.wav"], "Bell");
        for key in LEGACY_KEYS {
            assert!(store.raw(key).is_none());
        }
    }

    #[test]
    fn test_discards_when_tab_has_data() {
        let mut store = legacy_store();
        let tabs = vec![tab("1")];
        let mut states = HashMap::new();
        states.insert(
            "1".to_string(),
            TabState {
                files: vec!["/existing.mp3".into()],
                ..Default::default()
            },
        );

        let outcome = migrate_legacy(&mut store, &tabs, &mut states);

        assert!(matches!(outcome, MigrationOutcome::Discarded { .. }));
        assert_eq!(states["1"].files, vec!["/existing.mp3"]);
        assert!(store.raw(LEGACY_FILES_KEY).is_none());
    }

    #[test]
    fn test_discards_with_multiple_tabs() {
        let mut store = legacy_store();
        let tabs = vec![tab("1"), tab("2")];
        let mut states = HashMap::new();

        let outcome = migrate_legacy(&mut store, &tabs, &mut states);

        assert!(matches!(outcome, MigrationOutcome::Discarded { .. }));
        assert!(states.is_empty());
    }

    #[test]
    fn test_idempotent_second_run() {
        let mut store = legacy_store();
        let tabs = vec![tab("1")];
        let mut states = HashMap::new();

        migrate_legacy(&mut store, &tabs, &mut states);
        let second = migrate_legacy(&mut store, &tabs, &mut states);

        assert_eq!(second, MigrationOutcome::NothingToMigrate);
        assert_eq!(states["1"].files.len(), 2);
    }

    #[test]
    fn test_corrupt_legacy_record_is_removed() {
        let mut store = MemoryStore::new().with_raw(LEGACY_CUES_KEY, "not json");
        let tabs = vec![tab("1")];
        let mut states = HashMap::new();

        let outcome = migrate_legacy(&mut store, &tabs, &mut states);

        assert_eq!(outcome, MigrationOutcome::Migrated { tab_id: "1".into(), files: 0 });
        assert!(store.raw(LEGACY_CUES_KEY).is_none());
    }
}
