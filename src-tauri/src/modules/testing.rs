// Recording fakes for the media backend and the event sink.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::media::MediaKind;
use crate::modules::playback::{EventSink, HandleId, MediaBackend, PlaybackEvent};

#[derive(Clone, Debug, PartialEq)]
pub enum MediaCall {
    Open {
        handle: HandleId,
        path: String,
        kind: MediaKind,
    },
    Play(HandleId),
    Pause(HandleId),
    Seek(HandleId, f64),
    Volume(HandleId, f64),
    Release(HandleId),
    Probe {
        path: String,
        target: String,
    },
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    calls: Arc<Mutex<Vec<MediaCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<MediaCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_open_for(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MediaCall::Open { .. }))
            .count()
    }

    pub fn release_count(&self, handle: HandleId) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == MediaCall::Release(handle))
            .count()
    }

    pub fn last_volume(&self, handle: HandleId) -> Option<f64> {
        self.calls().iter().rev().find_map(|c| match c {
            MediaCall::Volume(h, v) if *h == handle => Some(*v),
            _ => None,
        })
    }

    /// Opened and not yet released, in open order.
    pub fn live_handles(&self) -> Vec<HandleId> {
        let calls = self.calls();
        calls
            .iter()
            .filter_map(|c| match c {
                MediaCall::Open { handle, .. } => Some(*handle),
                _ => None,
            })
            .filter(|h| !calls.contains(&MediaCall::Release(*h)))
            .collect()
    }

    fn record(&self, call: MediaCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaBackend for FakeBackend {
    fn open(&mut self, handle: HandleId, path: &str, kind: MediaKind) -> SoundboardResult<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(SoundboardError::Media(format!("cannot open {}", path)));
        }
        self.record(MediaCall::Open {
            handle,
            path: path.to_string(),
            kind,
        });
        Ok(())
    }

    fn play(&mut self, handle: HandleId) -> SoundboardResult<()> {
        self.record(MediaCall::Play(handle));
        Ok(())
    }

    fn pause(&mut self, handle: HandleId) {
        self.record(MediaCall::Pause(handle));
    }

    fn seek(&mut self, handle: HandleId, seconds: f64) {
        self.record(MediaCall::Seek(handle, seconds));
    }

    fn set_volume(&mut self, handle: HandleId, volume: f64) {
        self.record(MediaCall::Volume(handle, volume));
    }

    fn release(&mut self, handle: HandleId) {
        self.record(MediaCall::Release(handle));
    }

    fn probe_duration(&mut self, path: &str, target: &str) {
        self.record(MediaCall::Probe {
            path: path.to_string(),
            target: target.to_string(),
        });
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: PlaybackEvent) {
        self.events.lock().unwrap().push(event);
    }
}
