// Tab registry - pure logic over the persisted store.
// Owns the tab directory, the per-tab state map and the active-tab pointer.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::SoundboardError;
use crate::modules::migration::{self, MigrationOutcome};
use crate::state::{Tab, TabState};
use crate::store::{save_json, KeyValueStore, ACTIVE_TAB_KEY, TABS_KEY, TAB_STATES_KEY};

pub fn generate_tab_id() -> String {
    format!("tab-{}", uuid::Uuid::new_v4().simple())
}

fn default_tab_name(index: usize) -> String {
    format!("Tab {}", index + 1)
}

/// Pure logic for reordering tabs.
/// Returns true if the order changed, false otherwise.
///
/// Algorithm:
/// 1. Map existing tabs by ID for O(1) lookup
/// 2. Rebuild vector based on new_order
/// 3. Append any missing tabs in their previous relative order (prevents data loss)
fn reorder_logic(tabs: &mut Vec<Tab>, new_order: &[String]) -> bool {
    if tabs.is_empty() || new_order.is_empty() {
        return false;
    }

    let old_order: Vec<String> = tabs.iter().map(|t| t.id.clone()).collect();

    let mut tab_map: HashMap<String, Tab> = tabs.drain(..).map(|t| (t.id.clone(), t)).collect();

    let mut reordered = Vec::with_capacity(old_order.len());
    for id in new_order {
        if let Some(tab) = tab_map.remove(id) {
            reordered.push(tab);
        }
    }

    for id in &old_order {
        if let Some(tab) = tab_map.remove(id) {
            reordered.push(tab);
        }
    }

    let changed = reordered.iter().map(|t| &t.id).ne(old_order.iter());
    *tabs = reordered;
    changed
}

/// Normalizes the stored tab list. Missing or duplicate ids are regenerated,
/// blank names replaced by their positional default.
fn normalize_tabs(raw: Option<Value>) -> Vec<Tab> {
    let entries = match raw {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            let err = SoundboardError::MalformedData {
                key: TABS_KEY.to_string(),
                reason: format!("expected an array, found {}", kind_of(&other)),
            };
            log::warn!("[Tabs] {}", err);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut seen = HashSet::new();
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|id| !id.is_empty() && !seen.contains(*id))
                .map(str::to_string)
                .unwrap_or_else(generate_tab_id);
            seen.insert(id.clone());

            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| default_tab_name(index));

            Tab { id, name }
        })
        .collect()
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub struct TabRegistry {
    store: Box<dyn KeyValueStore>,
    tabs: Vec<Tab>,
    states: HashMap<String, TabState>,
    active_id: String,
}

impl TabRegistry {
    /// Reads the tab list and state map, normalizes them, runs the legacy
    /// migration and resolves the active pointer. Never fails.
    pub fn load_or_initialize(mut store: Box<dyn KeyValueStore>) -> Self {
        let mut tabs = normalize_tabs(store.load(TABS_KEY));
        if tabs.is_empty() {
            log::info!("[Tabs] No tabs stored, creating default tab");
            tabs.push(Tab {
                id: generate_tab_id(),
                name: default_tab_name(0),
            });
        }

        let raw_states = store.load(TAB_STATES_KEY);
        if let Some(other) = raw_states.as_ref().filter(|v| !v.is_object()) {
            let err = SoundboardError::MalformedData {
                key: TAB_STATES_KEY.to_string(),
                reason: format!("expected an object, found {}", kind_of(other)),
            };
            log::warn!("[Tabs] {}", err);
        }

        // Orphaned states (no matching tab) are dropped here.
        let mut states: HashMap<String, TabState> = tabs
            .iter()
            .map(|tab| {
                let state = raw_states
                    .as_ref()
                    .and_then(|map| map.get(&tab.id))
                    .map(TabState::from_value)
                    .unwrap_or_default();
                (tab.id.clone(), state)
            })
            .collect();

        if let MigrationOutcome::Migrated { tab_id, files } =
            migration::migrate_legacy(store.as_mut(), &tabs, &mut states)
        {
            log::info!("[Tabs] Legacy data ({} files) now belongs to {}", files, tab_id);
        }

        let stored_active = store
            .load(ACTIVE_TAB_KEY)
            .and_then(|v| v.as_str().map(str::to_string));
        let active_id = match stored_active {
            Some(id) if tabs.iter().any(|t| t.id == id) => id,
            Some(id) => {
                log::warn!("[Tabs] Active tab '{}' no longer exists, falling back to first tab", id);
                tabs[0].id.clone()
            }
            None => tabs[0].id.clone(),
        };

        let mut registry = TabRegistry {
            store,
            tabs,
            states,
            active_id,
        };
        registry.persist_tabs();
        registry.persist_states();
        registry.persist_active();
        registry
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tab(id).is_some()
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Moves the active pointer. Unknown ids are rejected.
    pub fn set_active_id(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            log::warn!("[Tabs] Cannot activate unknown tab '{}'", id);
            return false;
        }
        if self.active_id != id {
            self.active_id = id.to_string();
            self.persist_active();
        }
        true
    }

    /// Appends "Tab {count+1}" with an empty state. Does not switch to it.
    pub fn create_tab(&mut self) -> Tab {
        let tab = Tab {
            id: generate_tab_id(),
            name: default_tab_name(self.tabs.len()),
        };
        self.tabs.push(tab.clone());
        self.states.insert(tab.id.clone(), TabState::default());
        self.persist_tabs();
        self.persist_states();
        log::info!("[Tabs] Created '{}' ({})", tab.name, tab.id);
        tab
    }

    pub fn rename_tab(&mut self, id: &str, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) else {
            log::warn!("[Tabs] Rename of unknown tab '{}' ignored", id);
            return false;
        };
        if trimmed.is_empty() || tab.name == trimmed {
            return false;
        }
        tab.name = trimmed.to_string();
        self.persist_tabs();
        true
    }

    /// Removes a tab and its state as a pair. The last tab cannot be deleted.
    pub fn delete_tab(&mut self, id: &str) -> Option<Tab> {
        if self.tabs.len() <= 1 {
            log::warn!("[Tabs] Refusing to delete the last tab");
            return None;
        }
        let index = self.tabs.iter().position(|t| t.id == id)?;
        let removed = self.tabs.remove(index);
        self.states.remove(id);
        if self.active_id == id {
            self.active_id = self.tabs[0].id.clone();
            self.persist_active();
        }
        self.persist_tabs();
        self.persist_states();
        log::info!("[Tabs] Deleted '{}' ({})", removed.name, removed.id);
        Some(removed)
    }

    pub fn reorder_tabs(&mut self, new_order: &[String]) -> bool {
        let changed = reorder_logic(&mut self.tabs, new_order);
        if changed {
            self.persist_tabs();
        }
        changed
    }

    /// Existing state for `id`, or a fresh empty one (stored only if the tab exists).
    pub fn get_state(&mut self, id: &str) -> TabState {
        if let Some(state) = self.states.get(id) {
            return state.clone();
        }
        if !self.contains(id) {
            log::warn!("[Tabs] State requested for unknown tab '{}'", id);
            return TabState::default();
        }
        self.states.insert(id.to_string(), TabState::default());
        self.persist_states();
        TabState::default()
    }

    /// Replaces the in-memory state for an existing tab without persisting.
    pub fn put_state(&mut self, id: &str, state: TabState) -> bool {
        if !self.contains(id) {
            log::warn!("[Tabs] Dropping state for unknown tab '{}'", id);
            return false;
        }
        self.states.insert(id.to_string(), state);
        true
    }

    pub fn save_state(&mut self, id: &str, state: TabState) -> bool {
        let stored = self.put_state(id, state);
        if stored {
            self.persist_states();
        }
        stored
    }

    pub fn persist_tabs(&mut self) {
        if let Err(e) = save_json(self.store.as_mut(), TABS_KEY, &self.tabs) {
            log::warn!("[Tabs] Keeping tab list in memory only: {}", e);
        }
    }

    pub fn persist_states(&mut self) {
        if let Err(e) = save_json(self.store.as_mut(), TAB_STATES_KEY, &self.states) {
            log::warn!("[Tabs] Keeping tab states in memory only: {}", e);
        }
    }

    fn persist_active(&mut self) {
        if let Err(e) = save_json(self.store.as_mut(), ACTIVE_TAB_KEY, &self.active_id) {
            log::warn!("[Tabs] Keeping active tab in memory only: {}", e);
        }
    }
}
