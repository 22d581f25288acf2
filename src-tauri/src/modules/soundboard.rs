// Soundboard facade - owns the registry, the active session and the playback engine.
// Cross-component rules live here: stop before switching, stop when the playing
// card disappears, keep the engine's cue marker in step with the session.

use serde::Serialize;

use crate::modules::media::MediaKind;
use crate::modules::playback::{
    EventSink, FadeStep, FadeTicket, MediaBackend, MediaEvent, NowPlaying, PlayItem, PlaybackEngine,
    PlaybackState,
};
use crate::modules::session::{ActiveSession, CardId, MoveDirection};
use crate::modules::tabs::TabRegistry;
use crate::modules::transfer::{self, TransferRequest};
use crate::settings::Settings;
use crate::state::Tab;
use crate::store::KeyValueStore;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: CardId,
    /// Element id of the card in the page; echoed back by playback events.
    pub target: String,
    pub index: usize,
    pub path: String,
    pub display_name: String,
    pub kind: MediaKind,
    pub cue: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub tabs: Vec<Tab>,
    pub active_tab_id: String,
    pub cards: Vec<CardView>,
    pub playback_state: PlaybackState,
    pub now_playing: Option<NowPlaying>,
}

pub struct Soundboard {
    registry: TabRegistry,
    session: ActiveSession,
    engine: PlaybackEngine,
    fade_out_ms: u64,
    fade_tick_ms: u64,
}

impl Soundboard {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        backend: Box<dyn MediaBackend>,
        sink: Box<dyn EventSink>,
        settings: &Settings,
    ) -> Self {
        let mut registry = TabRegistry::load_or_initialize(store);
        let session = ActiveSession::open(&mut registry);
        log::info!(
            "[Soundboard] Ready with {} tab(s), active {}",
            registry.tabs().len(),
            session.tab_id()
        );
        Self {
            registry,
            session,
            engine: PlaybackEngine::new(backend, sink),
            fade_out_ms: settings.fade_out_ms,
            fade_tick_ms: settings.fade_tick_ms,
        }
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.fade_out_ms = settings.fade_out_ms;
        self.fade_tick_ms = settings.fade_tick_ms;
    }

    pub fn registry(&self) -> &TabRegistry {
        &self.registry
    }

    pub fn session(&self) -> &ActiveSession {
        &self.session
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let cards = self
            .session
            .files()
            .iter()
            .zip(self.session.card_ids())
            .enumerate()
            .map(|(index, (path, id))| CardView {
                id: *id,
                target: card_target(*id),
                index,
                path: path.clone(),
                display_name: self.session.display_name_for(path),
                kind: MediaKind::from_path(path),
                cue: self.session.cue_for(path),
            })
            .collect();
        BoardSnapshot {
            tabs: self.registry.tabs().to_vec(),
            active_tab_id: self.session.tab_id().to_string(),
            cards,
            playback_state: self.engine.state(),
            now_playing: self.engine.now_playing().cloned(),
        }
    }

    // --- tabs ---

    /// Creates a tab and switches to it.
    pub fn add_tab(&mut self) -> Tab {
        let tab = self.registry.create_tab();
        self.switch_tab(&tab.id);
        tab
    }

    pub fn switch_tab(&mut self, tab_id: &str) -> bool {
        if !self.registry.contains(tab_id) {
            log::warn!("[Soundboard] Switch to unknown tab '{}' ignored", tab_id);
            return false;
        }
        if self.session.tab_id() == tab_id {
            return true;
        }
        self.engine.stop();
        self.session.activate(&mut self.registry, tab_id)
    }

    pub fn rename_tab(&mut self, tab_id: &str, name: &str) -> bool {
        self.registry.rename_tab(tab_id, name)
    }

    /// Deleting the active tab first moves to its right neighbour, or the left one at the end.
    pub fn delete_tab(&mut self, tab_id: &str) -> bool {
        let tabs = self.registry.tabs();
        let Some(index) = tabs.iter().position(|t| t.id == tab_id) else {
            return false;
        };
        if tabs.len() <= 1 {
            log::warn!("[Soundboard] The last tab cannot be deleted");
            return false;
        }

        if self.session.tab_id() == tab_id {
            let neighbour = tabs
                .get(index + 1)
                .or_else(|| index.checked_sub(1).and_then(|i| tabs.get(i)))
                .map(|t| t.id.clone());
            if let Some(neighbour) = neighbour {
                self.switch_tab(&neighbour);
            }
        }
        self.registry.delete_tab(tab_id).is_some()
    }

    pub fn reorder_tabs(&mut self, new_order: &[String]) -> bool {
        self.registry.reorder_tabs(new_order)
    }

    // --- cards in the active tab ---

    pub fn add_files(&mut self, paths: &[String]) -> usize {
        let added = self.session.add_files(&mut self.registry, paths);
        if added > 0 {
            log::info!("[Soundboard] Added {} file(s) to {}", added, self.session.tab_id());
        }
        added
    }

    pub fn reorder_files(&mut self, new_order: Vec<String>) -> bool {
        match self.session.reorder(&mut self.registry, new_order) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Soundboard] {}", e);
                false
            }
        }
    }

    pub fn move_card(&mut self, card: CardId, direction: MoveDirection) -> bool {
        self.session.move_card(&mut self.registry, card, direction)
    }

    /// Removes the first card showing `path`.
    pub fn remove_item(&mut self, path: &str) -> bool {
        match self.session.first_card_for(path) {
            Some(card) => self.remove_card(card),
            None => false,
        }
    }

    /// Stops playback only when this very card is the one playing.
    pub fn remove_card(&mut self, card: CardId) -> bool {
        if self.session.card_path(card).is_none() {
            return false;
        }
        if self.engine.is_current_target(&card_target(card)) {
            self.engine.stop();
        }
        self.session.remove_card(&mut self.registry, card).is_some()
    }

    pub fn set_custom_name(&mut self, path: &str, name: &str) -> bool {
        self.session.set_custom_name(&mut self.registry, path, name)
    }

    pub fn display_name(&self, path: &str) -> String {
        self.session.display_name_for(path)
    }

    pub fn card_path(&self, card: CardId) -> Option<String> {
        self.session.card_path(card).map(str::to_string)
    }

    pub fn set_cue(&mut self, path: &str, seconds: f64) -> bool {
        let set = self.session.set_cue(&mut self.registry, path, seconds);
        if set {
            self.sync_cue(path);
        }
        set
    }

    pub fn clear_cue(&mut self, path: &str) -> bool {
        let cleared = self.session.clear_cue(&mut self.registry, path);
        if cleared {
            self.sync_cue(path);
        }
        cleared
    }

    /// Cue button: clears an existing cue, otherwise captures the playing position.
    pub fn set_cue_here(&mut self, path: &str) -> bool {
        if self.session.cue_for(path).is_some() {
            return self.clear_cue(path);
        }
        match self.engine.cue_candidate(self.session.tab_id(), path) {
            Some(position) => self.set_cue(path, position),
            None => false,
        }
    }

    fn sync_cue(&mut self, path: &str) {
        let cue = self.session.cue_for(path);
        self.engine.sync_cue(self.session.tab_id(), path, cue);
    }

    // --- playback ---

    fn item(&self, card: CardId) -> Option<PlayItem> {
        let Some(path) = self.session.card_path(card) else {
            log::warn!("[Soundboard] Card {} is not on the active tab", card);
            return None;
        };
        Some(PlayItem {
            path: path.to_string(),
            tab_id: self.session.tab_id().to_string(),
            target: card_target(card),
            cue: self.session.cue_for(path),
        })
    }

    pub fn play(&mut self, card: CardId) -> bool {
        let Some(item) = self.item(card) else {
            return false;
        };
        self.engine.play(item).is_ok()
    }

    pub fn toggle(&mut self, card: CardId) -> bool {
        let Some(item) = self.item(card) else {
            return false;
        };
        self.engine.toggle(item).unwrap_or(false)
    }

    pub fn play_from_cue(&mut self, card: CardId) -> bool {
        let Some(item) = self.item(card) else {
            return false;
        };
        self.engine.play_from_cue(item).unwrap_or(false)
    }

    pub fn pause(&mut self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.engine.resume()
    }

    pub fn stop(&mut self) -> bool {
        self.engine.stop()
    }

    pub fn seek(&mut self, seconds: f64) -> bool {
        self.engine.seek(seconds)
    }

    pub fn seek_fraction(&mut self, fraction: f64) -> bool {
        self.engine.seek_fraction(fraction)
    }

    pub fn rewind(&mut self) -> bool {
        self.engine.rewind_to_start()
    }

    pub fn fade_out(&mut self) -> Option<FadeTicket> {
        self.engine.fade_out(self.fade_out_ms, self.fade_tick_ms)
    }

    pub fn fade_tick(&mut self, ticket: &FadeTicket) -> FadeStep {
        self.engine.fade_tick(ticket)
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) -> bool {
        self.engine.handle_event(event)
    }

    pub fn progress_tick(&mut self, epoch: u64) -> bool {
        self.engine.report_progress(epoch)
    }

    pub fn take_progress_request(&mut self) -> Option<u64> {
        self.engine.take_progress_request()
    }

    // --- cross-tab ---

    pub fn transfer(&mut self, path: &str, source: &str, target: &str, is_copy: bool) -> bool {
        let request = TransferRequest {
            path: path.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            is_copy,
        };
        match transfer::transfer(&mut self.registry, &mut self.session, &request) {
            Ok(outcome) => {
                if outcome.removed_from_source
                    && source == self.session.tab_id()
                    && self.engine.is_current(source, path)
                {
                    self.engine.stop();
                }
                true
            }
            Err(e) => {
                log::warn!("[Transfer] {}", e);
                false
            }
        }
    }

    /// Stops playback and writes the working copy back. Called on exit.
    pub fn shutdown(&mut self) {
        self.engine.stop();
        self.session.flush(&mut self.registry);
        log::info!("[Soundboard] State flushed on shutdown");
    }
}

pub fn card_target(card: CardId) -> String {
    format!("card-{}", card)
}
