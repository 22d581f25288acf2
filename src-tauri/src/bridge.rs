// Webview side of playback: media commands out, playback events out, timers in.
// The media elements live in the page; this module only speaks to them through events.

use std::time::Duration;

use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::media::MediaKind;
use crate::modules::playback::{EventSink, FadeStep, FadeTicket, HandleId, MediaBackend, PlaybackEvent};
use crate::state::AppState;

pub const MEDIA_COMMAND_EVENT: &str = "media-command";
pub const PLAYBACK_EVENT: &str = "playback";
pub const BOARD_UPDATED_EVENT: &str = "board-updated";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MediaCommand {
    Open { handle: HandleId, path: String, kind: MediaKind },
    Play { handle: HandleId },
    Pause { handle: HandleId },
    Seek { handle: HandleId, seconds: f64 },
    Volume { handle: HandleId, volume: f64 },
    Release { handle: HandleId },
    Probe { path: String, target: String },
}

/// Drives the page's `<audio>`/`<video>` elements. Video is opened with the surface hidden.
pub struct WebviewMedia {
    app: AppHandle,
}

impl WebviewMedia {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn send(&self, command: MediaCommand) -> SoundboardResult<()> {
        self.app
            .emit(MEDIA_COMMAND_EVENT, &command)
            .map_err(|e| SoundboardError::Media(e.to_string()))
    }

    fn send_logged(&self, command: MediaCommand) {
        if let Err(e) = self.send(command) {
            log::warn!("[Playback] Media command not delivered: {}", e);
        }
    }
}

impl MediaBackend for WebviewMedia {
    fn open(&mut self, handle: HandleId, path: &str, kind: MediaKind) -> SoundboardResult<()> {
        self.send(MediaCommand::Open {
            handle,
            path: path.to_string(),
            kind,
        })
    }

    fn play(&mut self, handle: HandleId) -> SoundboardResult<()> {
        self.send(MediaCommand::Play { handle })
    }

    fn pause(&mut self, handle: HandleId) {
        self.send_logged(MediaCommand::Pause { handle });
    }

    fn seek(&mut self, handle: HandleId, seconds: f64) {
        self.send_logged(MediaCommand::Seek { handle, seconds });
    }

    fn set_volume(&mut self, handle: HandleId, volume: f64) {
        self.send_logged(MediaCommand::Volume { handle, volume });
    }

    fn release(&mut self, handle: HandleId) {
        self.send_logged(MediaCommand::Release { handle });
    }

    fn probe_duration(&mut self, path: &str, target: &str) {
        self.send_logged(MediaCommand::Probe {
            path: path.to_string(),
            target: target.to_string(),
        });
    }
}

pub struct TauriSink {
    app: AppHandle,
}

impl TauriSink {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl EventSink for TauriSink {
    fn emit(&self, event: PlaybackEvent) {
        if let Err(e) = self.app.emit(PLAYBACK_EVENT, &event) {
            log::warn!("[Playback] Event not delivered: {}", e);
        }
    }
}

pub fn emit_board(app: &AppHandle) {
    let state = app.state::<AppState>();
    let snapshot = match state.board.lock() {
        Ok(board) => board.snapshot(),
        Err(e) => {
            log::error!("[Soundboard] Board lock poisoned: {}", e);
            return;
        }
    };
    if let Err(e) = app.emit(BOARD_UPDATED_EVENT, &snapshot) {
        log::warn!("[Soundboard] Snapshot not delivered: {}", e);
    }
}

/// Ticks the fade until the engine reports anything but `Continue`.
pub fn spawn_fade_ticker(app: AppHandle, ticket: FadeTicket) {
    tauri::async_runtime::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(ticket.tick_ms));
        // First tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let step = {
                let state = app.state::<AppState>();
                let Ok(mut board) = state.board.lock() else {
                    break;
                };
                board.fade_tick(&ticket)
            };
            if step != FadeStep::Continue {
                log::debug!("[Playback] Fade for handle {} ended: {:?}", ticket.handle, step);
                emit_board(&app);
                break;
            }
        }
    });
}

/// Reports progress every frame until the epoch goes stale.
pub fn spawn_progress_loop(app: AppHandle, epoch: u64, frame_ms: u64) {
    tauri::async_runtime::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(frame_ms.max(1)));
        loop {
            interval.tick().await;
            let alive = {
                let state = app.state::<AppState>();
                let Ok(mut board) = state.board.lock() else {
                    break;
                };
                board.progress_tick(epoch)
            };
            if !alive {
                break;
            }
        }
    });
}
