// Active session - the working copy of the tab currently shown.
// Every mutation flushes back through the registry so disk and memory stay reconciled.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::media;
use crate::modules::tabs::TabRegistry;
use crate::state::{is_valid_cue, TabState};

/// In-memory identity of one card. Survives reorders and removals of other cards; never persisted.
pub type CardId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    tab_id: String,
    files: Vec<String>,
    /// Parallel to `files`.
    card_ids: Vec<CardId>,
    next_card_id: CardId,
    cue_positions: BTreeMap<String, f64>,
    custom_names: BTreeMap<String, String>,
}

impl ActiveSession {
    /// Mirrors the registry's active tab.
    pub fn open(registry: &mut TabRegistry) -> Self {
        let tab_id = registry.active_id().to_string();
        let state = registry.get_state(&tab_id);
        let mut session = ActiveSession {
            tab_id,
            files: Vec::new(),
            card_ids: Vec::new(),
            next_card_id: 0,
            cue_positions: BTreeMap::new(),
            custom_names: BTreeMap::new(),
        };
        session.refresh_from(state);
        session
    }

    pub fn tab_id(&self) -> &str {
        &self.tab_id
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn card_ids(&self) -> &[CardId] {
        &self.card_ids
    }

    /// Path of the card `id`, if it is still on the tab.
    pub fn card_path(&self, id: CardId) -> Option<&str> {
        let index = self.card_ids.iter().position(|c| *c == id)?;
        self.files.get(index).map(String::as_str)
    }

    /// Card showing the first occurrence of `path`.
    pub fn first_card_for(&self, path: &str) -> Option<CardId> {
        let index = self.files.iter().position(|f| f == path)?;
        self.card_ids.get(index).copied()
    }

    pub fn cue_positions(&self) -> &BTreeMap<String, f64> {
        &self.cue_positions
    }

    pub fn custom_names(&self) -> &BTreeMap<String, String> {
        &self.custom_names
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }

    pub fn cue_for(&self, path: &str) -> Option<f64> {
        self.cue_positions.get(path).copied()
    }

    pub fn snapshot(&self) -> TabState {
        TabState {
            files: self.files.clone(),
            cue_positions: self.cue_positions.clone(),
            custom_names: self.custom_names.clone(),
        }
    }

    /// Replaces the working copy in place, keeping the same tab.
    /// Cards whose path is still present keep their ids, matched occurrence by occurrence.
    pub fn refresh_from(&mut self, state: TabState) {
        self.replace_files(state.files);
        self.cue_positions = state.cue_positions;
        self.custom_names = state.custom_names;
    }

    fn fresh_card_id(&mut self) -> CardId {
        self.next_card_id += 1;
        self.next_card_id
    }

    /// Installs a new file list, handing each old card id to the same occurrence of its path.
    fn replace_files(&mut self, files: Vec<String>) {
        let mut pool: HashMap<String, Vec<CardId>> = HashMap::new();
        for (path, id) in self.files.iter().zip(&self.card_ids).rev() {
            pool.entry(path.clone()).or_default().push(*id);
        }
        let mut card_ids = Vec::with_capacity(files.len());
        for path in &files {
            let id = match pool.get_mut(path).and_then(Vec::pop) {
                Some(id) => id,
                None => self.fresh_card_id(),
            };
            card_ids.push(id);
        }
        self.files = files;
        self.card_ids = card_ids;
    }

    /// Flushes the current tab, then loads `tab_id` and moves the active pointer.
    /// Playback must already be stopped by the caller.
    pub fn activate(&mut self, registry: &mut TabRegistry, tab_id: &str) -> bool {
        if !registry.contains(tab_id) {
            log::warn!("[Session] Cannot activate unknown tab '{}'", tab_id);
            return false;
        }
        self.flush(registry);
        let state = registry.get_state(tab_id);
        self.tab_id = tab_id.to_string();
        self.refresh_from(state);
        registry.set_active_id(tab_id);
        log::info!("[Session] Activated {} ({} files)", tab_id, self.files.len());
        true
    }

    pub fn flush(&self, registry: &mut TabRegistry) {
        if !registry.save_state(&self.tab_id, self.snapshot()) {
            log::warn!("[Session] Flush skipped, tab '{}' is gone", self.tab_id);
        }
    }

    /// Appends without dedup. Returns how many paths were added.
    pub fn add_files(&mut self, registry: &mut TabRegistry, paths: &[String]) -> usize {
        let added: Vec<String> = paths.iter().filter(|p| !p.trim().is_empty()).cloned().collect();
        let count = added.len();
        if count == 0 {
            return 0;
        }
        for path in added {
            let id = self.fresh_card_id();
            self.files.push(path);
            self.card_ids.push(id);
        }
        self.flush(registry);
        count
    }

    /// Accepts only a permutation of the current file list (same multiset of paths).
    pub fn reorder(&mut self, registry: &mut TabRegistry, new_order: Vec<String>) -> SoundboardResult<()> {
        if !same_multiset(&self.files, &new_order) {
            return Err(SoundboardError::InvalidReorder(format!(
                "expected a permutation of {} files, got {}",
                self.files.len(),
                new_order.len()
            )));
        }
        self.replace_files(new_order);
        self.flush(registry);
        Ok(())
    }

    /// Swaps the first occurrence of `path` with its neighbour.
    pub fn move_item(&mut self, registry: &mut TabRegistry, path: &str, direction: MoveDirection) -> bool {
        match self.first_card_for(path) {
            Some(id) => self.move_card(registry, id, direction),
            None => false,
        }
    }

    /// Swaps card `id` with its neighbour; no-op at the edges.
    pub fn move_card(&mut self, registry: &mut TabRegistry, id: CardId, direction: MoveDirection) -> bool {
        let Some(index) = self.card_ids.iter().position(|c| *c == id) else {
            return false;
        };
        let other = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.files.len() => index + 1,
            _ => return false,
        };
        self.files.swap(index, other);
        self.card_ids.swap(index, other);
        self.flush(registry);
        true
    }

    /// Removes the first occurrence of `path` and its cue and name entries.
    pub fn remove_item(&mut self, registry: &mut TabRegistry, path: &str) -> bool {
        match self.first_card_for(path) {
            Some(id) => self.remove_card(registry, id).is_some(),
            None => false,
        }
    }

    /// Removes card `id` with the cue and name of its path. Returns the removed path.
    pub fn remove_card(&mut self, registry: &mut TabRegistry, id: CardId) -> Option<String> {
        let index = self.card_ids.iter().position(|c| *c == id)?;
        self.card_ids.remove(index);
        let path = self.files.remove(index);
        self.cue_positions.remove(&path);
        self.custom_names.remove(&path);
        self.flush(registry);
        Some(path)
    }

    pub fn set_cue(&mut self, registry: &mut TabRegistry, path: &str, seconds: f64) -> bool {
        if !self.contains(path) || !is_valid_cue(seconds) {
            log::debug!("[Session] Rejected cue {} for {}", seconds, path);
            return false;
        }
        self.cue_positions.insert(path.to_string(), seconds);
        self.flush(registry);
        true
    }

    pub fn clear_cue(&mut self, registry: &mut TabRegistry, path: &str) -> bool {
        if self.cue_positions.remove(path).is_none() {
            return false;
        }
        self.flush(registry);
        true
    }

    /// Blank or whitespace-only names clear the override.
    pub fn set_custom_name(&mut self, registry: &mut TabRegistry, path: &str, name: &str) -> bool {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return self.clear_custom_name(registry, path);
        }
        if !self.contains(path) || self.custom_names.get(path).map(String::as_str) == Some(trimmed) {
            return false;
        }
        self.custom_names.insert(path.to_string(), trimmed.to_string());
        self.flush(registry);
        true
    }

    pub fn clear_custom_name(&mut self, registry: &mut TabRegistry, path: &str) -> bool {
        if self.custom_names.remove(path).is_none() {
            return false;
        }
        self.flush(registry);
        true
    }

    pub fn display_name_for(&self, path: &str) -> String {
        match self.custom_names.get(path) {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => media::file_stem(path).to_string(),
        }
    }
}

fn same_multiset(current: &[String], proposed: &[String]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for path in current {
        *counts.entry(path.as_str()).or_default() += 1;
    }
    for path in proposed {
        *counts.entry(path.as_str()).or_default() -= 1;
    }
    counts.values().all(|c| *c == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rstest::rstest;

    fn setup() -> (TabRegistry, ActiveSession) {
        let mut registry = TabRegistry::load_or_initialize(Box::new(MemoryStore::new()));
        let session = ActiveSession::open(&mut registry);
        (registry, session)
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_files_appends_and_flushes() {
        let (mut registry, mut session) = setup();

        let added = session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3", "/a.mp3"]));

        assert_eq!(added, 3);
        assert_eq!(session.files(), paths(&["/a.mp3", "/b.mp3", "/a.mp3"]).as_slice());
        let id = session.tab_id().to_string();
        assert_eq!(registry.get_state(&id).files.len(), 3);
    }

    #[test]
    fn test_remove_item_drops_metadata() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3"]));
        session.set_cue(&mut registry, "/a.mp3", 4.0);
        session.set_custom_name(&mut registry, "/a.mp3", "Alpha");

        assert!(session.remove_item(&mut registry, "/a.mp3"));

        assert_eq!(session.files(), paths(&["/b.mp3"]).as_slice());
        assert!(session.cue_for("/a.mp3").is_none());
        assert!(session.custom_names().is_empty());
        let id = session.tab_id().to_string();
        assert!(registry.get_state(&id).cue_positions.is_empty());
        assert!(!session.remove_item(&mut registry, "/a.mp3"));
    }

    #[test]
    fn test_add_remove_sequences_leave_no_orphans() {
        let (mut registry, mut session) = setup();
        let ops: [(&str, bool); 8] = [
            ("/a.mp3", true),
            ("/b.mp3", true),
            ("/a.mp3", true),
            ("/a.mp3", false),
            ("/c.mp3", true),
            ("/b.mp3", false),
            ("/a.mp3", false),
            ("/c.mp3", false),
        ];
        for (path, add) in ops {
            if add {
                session.add_files(&mut registry, &[path.to_string()]);
                session.set_cue(&mut registry, path, 1.0);
                session.set_custom_name(&mut registry, path, "named");
            } else {
                session.remove_item(&mut registry, path);
            }
            for key in session.cue_positions().keys().chain(session.custom_names().keys()) {
                assert!(session.contains(key), "orphaned metadata for {}", key);
            }
        }
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3", "/a.mp3"]));

        let err = session.reorder(&mut registry, paths(&["/a.mp3", "/b.mp3", "/b.mp3"]));
        assert!(matches!(err, Err(SoundboardError::InvalidReorder(_))));
        assert_eq!(session.files(), paths(&["/a.mp3", "/b.mp3", "/a.mp3"]).as_slice());

        session.reorder(&mut registry, paths(&["/b.mp3", "/a.mp3", "/a.mp3"])).unwrap();
        assert_eq!(session.files()[0], "/b.mp3");
    }

    #[rstest]
    #[case("/b.mp3", MoveDirection::Up, true, &["/b.mp3", "/a.mp3", "/c.mp3"])]
    #[case("/b.mp3", MoveDirection::Down, true, &["/a.mp3", "/c.mp3", "/b.mp3"])]
    #[case("/a.mp3", MoveDirection::Up, false, &["/a.mp3", "/b.mp3", "/c.mp3"])]
    #[case("/c.mp3", MoveDirection::Down, false, &["/a.mp3", "/b.mp3", "/c.mp3"])]
    #[case("/zzz.mp3", MoveDirection::Up, false, &["/a.mp3", "/b.mp3", "/c.mp3"])]
    fn test_move_item(
        #[case] path: &str,
        #[case] direction: MoveDirection,
        #[case] moved: bool,
        #[case] expected: &[&str],
    ) {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3", "/c.mp3"]));

        assert_eq!(session.move_item(&mut registry, path, direction), moved);
        assert_eq!(session.files(), paths(expected).as_slice());
    }

    #[rstest]
    #[case(12.5, true)]
    #[case(0.0, true)]
    #[case(-1.0, false)]
    #[case(f64::NAN, false)]
    #[case(f64::INFINITY, false)]
    fn test_set_cue_validation(#[case] seconds: f64, #[case] accepted: bool) {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3"]));
        assert_eq!(session.set_cue(&mut registry, "/a.mp3", seconds), accepted);
    }

    #[test]
    fn test_cue_requires_known_path() {
        let (mut registry, mut session) = setup();
        assert!(!session.set_cue(&mut registry, "/missing.mp3", 1.0));
    }

    #[test]
    fn test_empty_name_clears_override() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/music/air horn.mp3"]));
        session.set_custom_name(&mut registry, "/music/air horn.mp3", "  HONK ");
        assert_eq!(session.display_name_for("/music/air horn.mp3"), "HONK");

        assert!(session.set_custom_name(&mut registry, "/music/air horn.mp3", ""));

        assert!(session.custom_names().is_empty());
        assert_eq!(session.display_name_for("/music/air horn.mp3"), "air horn");
        let id = session.tab_id().to_string();
        assert!(registry.get_state(&id).custom_names.is_empty());
    }

    #[test]
    fn test_activate_round_trip() {
        let (mut registry, mut session) = setup();
        let first = session.tab_id().to_string();
        session.add_files(&mut registry, &paths(&["/c.mp3", "/a.mp3", "/b.mp3"]));
        session.set_cue(&mut registry, "/a.mp3", 7.25);
        session.set_custom_name(&mut registry, "/b.mp3", "Bee");
        let before = session.snapshot();
        session.flush(&mut registry);

        let second = registry.create_tab();
        assert!(session.activate(&mut registry, &second.id));
        assert!(session.files().is_empty());
        assert_eq!(registry.active_id(), second.id);

        assert!(session.activate(&mut registry, &first));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_activate_unknown_tab_is_rejected() {
        let (mut registry, mut session) = setup();
        let before = session.clone();
        assert!(!session.activate(&mut registry, "tab-missing"));
        assert_eq!(session, before);
    }

    #[test]
    fn test_card_ids_follow_their_card() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3", "/a.mp3"]));
        let ids = session.card_ids().to_vec();

        session.reorder(&mut registry, paths(&["/b.mp3", "/a.mp3", "/a.mp3"])).unwrap();
        assert_eq!(session.card_ids(), &[ids[1], ids[0], ids[2]]);

        session.move_card(&mut registry, ids[2], MoveDirection::Up);
        assert_eq!(session.card_ids(), &[ids[1], ids[2], ids[0]]);

        session.remove_item(&mut registry, "/b.mp3");
        assert_eq!(session.card_ids(), &[ids[2], ids[0]]);
        assert_eq!(session.card_path(ids[0]), Some("/a.mp3"));
        assert_eq!(session.card_path(ids[1]), None);
    }

    #[test]
    fn test_remove_card_targets_the_given_duplicate() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3", "/a.mp3"]));
        let ids = session.card_ids().to_vec();

        assert_eq!(session.remove_card(&mut registry, ids[2]).as_deref(), Some("/a.mp3"));

        assert_eq!(session.card_ids(), &[ids[0], ids[1]]);
        assert_eq!(session.first_card_for("/a.mp3"), Some(ids[0]));
        assert!(session.remove_card(&mut registry, ids[2]).is_none());
    }

    #[test]
    fn test_refresh_keeps_ids_of_surviving_cards() {
        let (mut registry, mut session) = setup();
        session.add_files(&mut registry, &paths(&["/a.mp3", "/b.mp3"]));
        let ids = session.card_ids().to_vec();

        let mut state = session.snapshot();
        state.files.insert(0, "/c.mp3".into());
        session.refresh_from(state);

        assert_eq!(&session.card_ids()[1..], ids.as_slice());
        assert!(!ids.contains(&session.card_ids()[0]));
    }
}
