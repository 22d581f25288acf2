//! Playback engine: the single "now playing" slot and its state machine.
//!
//! Idle → Loading → Playing ⇄ Paused, Playing → Fading, anything → Idle on
//! stop, end of media, error or fade completion. The engine never decodes
//! anything itself; it drives a [`MediaBackend`] and reports to an
//! [`EventSink`]. Every asynchronous input (media events, fade ticks,
//! progress frames) carries the handle id or epoch it was scheduled for and
//! is dropped when that no longer matches.

use serde::{Deserialize, Serialize};

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::media::{format_time, known_duration, MediaKind};
use crate::state::is_valid_cue;

pub type HandleId = u64;

/// Below this position the rewind control stays disabled.
pub const REWIND_EPSILON: f64 = 0.1;
pub const DEFAULT_FADE_MS: u64 = 1000;
pub const DEFAULT_FADE_TICK_MS: u64 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Fading,
}

/// Platform media capability. Calls are fire-and-forget; results come back as [`MediaEvent`]s.
pub trait MediaBackend: Send {
    fn open(&mut self, handle: HandleId, path: &str, kind: MediaKind) -> SoundboardResult<()>;
    fn play(&mut self, handle: HandleId) -> SoundboardResult<()>;
    fn pause(&mut self, handle: HandleId);
    fn seek(&mut self, handle: HandleId, seconds: f64);
    fn set_volume(&mut self, handle: HandleId, volume: f64);
    /// Stops and discards the handle. Video-backed handles drop their off-screen element.
    fn release(&mut self, handle: HandleId);
    /// Re-reads the duration of `path` for the label of `target`, outside any playback.
    fn probe_duration(&mut self, path: &str, target: &str);
}

pub trait EventSink: Send {
    fn emit(&self, event: PlaybackEvent);
}

/// Callbacks from the media backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaEvent {
    MetadataLoaded { handle: HandleId, duration: Option<f64> },
    TimeUpdate { handle: HandleId, position: f64 },
    Ended { handle: HandleId },
    Error { handle: HandleId, message: String },
}

impl MediaEvent {
    pub fn handle(&self) -> HandleId {
        match self {
            MediaEvent::MetadataLoaded { handle, .. }
            | MediaEvent::TimeUpdate { handle, .. }
            | MediaEvent::Ended { handle }
            | MediaEvent::Error { handle, .. } => *handle,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub target: String,
    pub path: String,
    pub position: f64,
    pub duration: Option<f64>,
    /// "M:SS / M:SS", absent while the duration is unknown.
    pub time_text: Option<String>,
    pub fraction: f64,
    pub cue_fraction: Option<f64>,
    pub can_rewind: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    #[serde(rename_all = "camelCase")]
    StateChanged {
        state: PlaybackState,
        path: Option<String>,
        target: Option<String>,
    },
    Progress(ProgressReport),
    #[serde(rename_all = "camelCase")]
    TargetReset { target: String, path: String },
}

/// What the caller wants played: the item, the tab that owns it and the card showing it.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayItem {
    pub path: String,
    pub tab_id: String,
    pub target: String,
    pub cue: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub handle: HandleId,
    pub path: String,
    pub tab_id: String,
    pub target: String,
    pub kind: MediaKind,
    pub duration: Option<f64>,
    pub position: f64,
    pub volume: f64,
    pub cue: Option<f64>,
    #[serde(skip)]
    pending_cue: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeTicket {
    pub handle: HandleId,
    pub tick_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeStep {
    Continue,
    Finished,
    /// Another item started; the faded handle was restored to full volume and left alone.
    Superseded,
    Cancelled,
}

#[derive(Debug)]
struct Fade {
    handle: HandleId,
    start_volume: f64,
    duration_ms: u64,
    elapsed_ms: u64,
    tick_ms: u64,
}

pub struct PlaybackEngine {
    backend: Box<dyn MediaBackend>,
    sink: Box<dyn EventSink>,
    state: PlaybackState,
    current: Option<NowPlaying>,
    fade: Option<Fade>,
    next_handle: HandleId,
    progress_active: bool,
    progress_epoch: u64,
    progress_request: Option<u64>,
}

impl PlaybackEngine {
    pub fn new(backend: Box<dyn MediaBackend>, sink: Box<dyn EventSink>) -> Self {
        Self {
            backend,
            sink,
            state: PlaybackState::Idle,
            current: None,
            fade: None,
            next_handle: 0,
            progress_active: false,
            progress_epoch: 0,
            progress_request: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }

    /// True when `path` from `tab_id` holds the now-playing slot.
    pub fn is_current(&self, tab_id: &str, path: &str) -> bool {
        self.current
            .as_ref()
            .map_or(false, |c| c.tab_id == tab_id && c.path == path)
    }

    /// True when the card `target` holds the now-playing slot.
    pub fn is_current_target(&self, target: &str) -> bool {
        self.current.as_ref().map_or(false, |c| c.target == target)
    }

    fn is_current_card(&self, item: &PlayItem) -> bool {
        self.current.as_ref().map_or(false, |c| {
            c.tab_id == item.tab_id && c.target == item.target && c.path == item.path
        })
    }

    pub fn is_reporting_progress(&self) -> bool {
        self.progress_active
    }

    pub fn progress_epoch(&self) -> u64 {
        self.progress_epoch
    }

    /// Epoch of a progress loop the shell still has to start, if any.
    pub fn take_progress_request(&mut self) -> Option<u64> {
        self.progress_request.take()
    }

    pub fn play(&mut self, item: PlayItem) -> SoundboardResult<HandleId> {
        self.start(item, None)
    }

    /// Toggle for a card click: pause or resume the same card, otherwise start it.
    pub fn toggle(&mut self, item: PlayItem) -> SoundboardResult<bool> {
        if !self.is_current_card(&item) {
            self.play(item)?;
            return Ok(true);
        }
        Ok(match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => false,
        })
    }

    /// Starts at the item's cue. Without a cue nothing changes.
    pub fn play_from_cue(&mut self, item: PlayItem) -> SoundboardResult<bool> {
        let Some(cue) = item.cue.filter(|c| is_valid_cue(*c)) else {
            return Ok(false);
        };
        if self.is_current_card(&item) {
            let known = self.current.as_ref().and_then(|c| c.duration).is_some();
            if known {
                return Ok(self.seek(cue));
            }
            if let Some(current) = self.current.as_mut() {
                current.pending_cue = Some(cue);
            }
            return Ok(true);
        }
        self.start(item, Some(cue))?;
        Ok(true)
    }

    fn start(&mut self, item: PlayItem, pending_cue: Option<f64>) -> SoundboardResult<HandleId> {
        if self.current.is_some() || self.state != PlaybackState::Idle {
            self.stop();
        }

        let kind = MediaKind::from_path(&item.path);
        self.next_handle += 1;
        let handle = self.next_handle;

        if let Err(e) = self.backend.open(handle, &item.path, kind) {
            log::error!("[Playback] Could not open {}: {}", item.path, e);
            self.backend.release(handle);
            self.sink.emit(PlaybackEvent::TargetReset {
                target: item.target,
                path: item.path,
            });
            return Err(e);
        }

        log::info!("[Playback] Loading {} as {:?} (handle {})", item.path, kind, handle);
        self.current = Some(NowPlaying {
            handle,
            path: item.path,
            tab_id: item.tab_id,
            target: item.target,
            kind,
            duration: None,
            position: 0.0,
            volume: 1.0,
            cue: item.cue.filter(|c| is_valid_cue(*c)),
            pending_cue,
        });
        self.set_state(PlaybackState::Loading);
        Ok(handle)
    }

    /// Applies a backend callback. Returns false for callbacks aimed at a superseded handle.
    pub fn handle_event(&mut self, event: MediaEvent) -> bool {
        let current_handle = self.current.as_ref().map(|c| c.handle);
        if current_handle != Some(event.handle()) {
            log::debug!("[Playback] Ignoring stale event {:?}", event);
            return false;
        }

        match event {
            MediaEvent::MetadataLoaded { duration, .. } => self.on_metadata(duration),
            MediaEvent::TimeUpdate { position, .. } => {
                if let Some(current) = self.current.as_mut() {
                    if position.is_finite() {
                        let upper = current.duration.unwrap_or(f64::MAX);
                        current.position = position.clamp(0.0, upper);
                    }
                }
                true
            }
            MediaEvent::Ended { .. } => {
                self.stop();
                true
            }
            MediaEvent::Error { message, .. } => {
                let err = SoundboardError::Media(message);
                let path = self.current.as_ref().map(|c| c.path.clone()).unwrap_or_default();
                log::error!("[Playback] {} while playing {}", err, path);
                self.stop();
                true
            }
        }
    }

    fn on_metadata(&mut self, duration: Option<f64>) -> bool {
        if self.state != PlaybackState::Loading {
            return false;
        }
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        current.duration = known_duration(duration);
        let handle = current.handle;
        if let (Some(cue), Some(total)) = (current.pending_cue.take(), current.duration) {
            let target = cue.clamp(0.0, total);
            self.backend.seek(handle, target);
            current.position = target;
        }

        if let Err(e) = self.backend.play(handle) {
            log::error!("[Playback] Backend refused to play handle {}: {}", handle, e);
            self.stop();
            return true;
        }
        self.set_state(PlaybackState::Playing);
        self.start_progress();
        self.emit_progress();
        true
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let Some(handle) = self.current.as_ref().map(|c| c.handle) else {
            return false;
        };
        self.backend.pause(handle);
        self.cancel_progress();
        self.set_state(PlaybackState::Paused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        let Some(handle) = self.current.as_ref().map(|c| c.handle) else {
            return false;
        };
        if let Err(e) = self.backend.play(handle) {
            log::error!("[Playback] Resume failed: {}", e);
            self.stop();
            return false;
        }
        self.set_state(PlaybackState::Playing);
        self.start_progress();
        true
    }

    /// Valid from any state. Returns true if a handle was released.
    pub fn stop(&mut self) -> bool {
        self.fade = None;
        self.cancel_progress();

        let Some(current) = self.current.take() else {
            if self.state != PlaybackState::Idle {
                self.set_state(PlaybackState::Idle);
            }
            return false;
        };

        self.backend.set_volume(current.handle, 1.0);
        self.backend.release(current.handle);
        self.sink.emit(PlaybackEvent::TargetReset {
            target: current.target.clone(),
            path: current.path.clone(),
        });
        // The reset wipes the card label; ask for a fresh duration.
        self.backend.probe_duration(&current.path, &current.target);

        log::info!("[Playback] Stopped {} (handle {})", current.path, current.handle);
        self.set_state(PlaybackState::Idle);
        true
    }

    /// Seeks within a known duration, clamped to [0, duration].
    pub fn seek(&mut self, seconds: f64) -> bool {
        if !seconds.is_finite() {
            return false;
        }
        let Some(current) = self.current.as_mut() else {
            return false;
        };
        let Some(duration) = current.duration else {
            return false;
        };
        let target = seconds.clamp(0.0, duration);
        self.backend.seek(current.handle, target);
        current.position = target;
        self.emit_progress();
        true
    }

    /// Progress-bar click at `fraction` of the bar.
    pub fn seek_fraction(&mut self, fraction: f64) -> bool {
        let Some(duration) = self.current.as_ref().and_then(|c| c.duration) else {
            return false;
        };
        if !fraction.is_finite() {
            return false;
        }
        self.seek(fraction.clamp(0.0, 1.0) * duration)
    }

    pub fn rewind_to_start(&mut self) -> bool {
        self.seek(0.0)
    }

    pub fn can_rewind(&self) -> bool {
        self.current.as_ref().map_or(false, |c| c.position > REWIND_EPSILON)
    }

    /// Position usable as a new cue for `path`: it must be playing with a known duration.
    pub fn cue_candidate(&self, tab_id: &str, path: &str) -> Option<f64> {
        self.current
            .as_ref()
            .filter(|c| c.tab_id == tab_id && c.path == path && c.duration.is_some())
            .map(|c| c.position)
    }

    /// Keeps the cue marker of the playing item in step with the session.
    pub fn sync_cue(&mut self, tab_id: &str, path: &str, cue: Option<f64>) {
        if !self.is_current(tab_id, path) {
            return;
        }
        if let Some(current) = self.current.as_mut() {
            current.cue = cue.filter(|c| is_valid_cue(*c));
        }
        self.emit_progress();
    }

    /// Starts a linear fade to silence. Anything but Playing just stops.
    pub fn fade_out(&mut self, duration_ms: u64, tick_ms: u64) -> Option<FadeTicket> {
        if self.state != PlaybackState::Playing || duration_ms == 0 {
            self.stop();
            return None;
        }
        let current = self.current.as_ref()?;
        let ticket = FadeTicket {
            handle: current.handle,
            tick_ms: tick_ms.max(1),
        };
        self.fade = Some(Fade {
            handle: current.handle,
            start_volume: current.volume,
            duration_ms,
            elapsed_ms: 0,
            tick_ms: ticket.tick_ms,
        });
        log::info!("[Playback] Fading out {} over {}ms", current.path, duration_ms);
        self.set_state(PlaybackState::Fading);
        Some(ticket)
    }

    /// One fade timer tick.
    pub fn fade_tick(&mut self, ticket: &FadeTicket) -> FadeStep {
        match self.current.as_ref().map(|c| c.handle) {
            None => return FadeStep::Cancelled,
            Some(handle) if handle != ticket.handle => {
                self.backend.set_volume(ticket.handle, 1.0);
                return FadeStep::Superseded;
            }
            Some(_) => {}
        }

        let Some(fade) = self.fade.as_mut().filter(|f| f.handle == ticket.handle) else {
            return FadeStep::Cancelled;
        };
        fade.elapsed_ms = (fade.elapsed_ms + fade.tick_ms).min(fade.duration_ms);
        let ratio = fade.elapsed_ms as f64 / fade.duration_ms as f64;
        let volume = (fade.start_volume * (1.0 - ratio)).max(0.0);
        let finished = fade.elapsed_ms >= fade.duration_ms;

        self.backend.set_volume(ticket.handle, volume);
        if let Some(current) = self.current.as_mut() {
            current.volume = volume;
        }

        if finished {
            self.stop();
            FadeStep::Finished
        } else {
            FadeStep::Continue
        }
    }

    /// One progress frame. Returns false once the loop for `epoch` should end.
    pub fn report_progress(&mut self, epoch: u64) -> bool {
        if !self.progress_active || epoch != self.progress_epoch || self.current.is_none() {
            return false;
        }
        self.emit_progress();
        true
    }

    pub fn progress(&self) -> Option<ProgressReport> {
        let current = self.current.as_ref()?;
        let (time_text, fraction, cue_fraction) = match current.duration {
            Some(total) => (
                Some(format!("{} / {}", format_time(current.position), format_time(total))),
                (current.position / total).clamp(0.0, 1.0),
                current.cue.map(|cue| (cue / total).clamp(0.0, 1.0)),
            ),
            None => (None, 0.0, None),
        };
        Some(ProgressReport {
            target: current.target.clone(),
            path: current.path.clone(),
            position: current.position,
            duration: current.duration,
            time_text,
            fraction,
            cue_fraction,
            can_rewind: current.position > REWIND_EPSILON,
        })
    }

    fn emit_progress(&self) {
        if let Some(report) = self.progress() {
            self.sink.emit(PlaybackEvent::Progress(report));
        }
    }

    fn start_progress(&mut self) {
        self.progress_epoch += 1;
        self.progress_active = true;
        self.progress_request = Some(self.progress_epoch);
    }

    fn cancel_progress(&mut self) {
        if self.progress_active {
            self.progress_epoch += 1;
        }
        self.progress_active = false;
        self.progress_request = None;
    }

    fn set_state(&mut self, state: PlaybackState) {
        self.state = state;
        let (path, target) = match &self.current {
            Some(c) => (Some(c.path.clone()), Some(c.target.clone())),
            None => (None, None),
        };
        self.sink.emit(PlaybackEvent::StateChanged { state, path, target });
    }
}
