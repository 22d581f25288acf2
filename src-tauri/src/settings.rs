use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tauri::AppHandle;
use tauri::Manager;

use crate::error::{SoundboardError, SoundboardResult};
use crate::modules::playback::{DEFAULT_FADE_MS, DEFAULT_FADE_TICK_MS};

const SETTINGS_FILE: &str = "settings.json";

pub const THEMES: &[&str] = &["dark", "light", "system"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Length of the fade-out ramp.
    pub fade_out_ms: u64,
    pub fade_tick_ms: u64,
    /// Interval of the progress loop, roughly one display frame.
    pub progress_frame_ms: u64,
    pub confirm_before_remove: bool,
    /// Applied by the page as `data-theme` on `<body>`.
    pub theme: String, // "dark", "light", "system"
    pub fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fade_out_ms: DEFAULT_FADE_MS,
            fade_tick_ms: DEFAULT_FADE_TICK_MS,
            progress_frame_ms: 16,
            confirm_before_remove: true,
            theme: "dark".to_string(),
            fullscreen: true,
        }
    }
}

impl Settings {
    pub fn get_path(app: &AppHandle) -> SoundboardResult<PathBuf> {
        settings_file(app.path().app_data_dir())
    }

    /// Unknown themes fall back to dark.
    pub fn normalized(mut self) -> Self {
        if !THEMES.contains(&self.theme.as_str()) {
            log::warn!("[Settings] Unknown theme '{}', using dark", self.theme);
            self.theme = "dark".to_string();
        }
        self
    }

    pub fn load(app: &AppHandle) -> Self {
        match Self::get_path(app) {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                log::warn!("[Settings] No settings location: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, app: &AppHandle) -> SoundboardResult<()> {
        self.save_to(&Self::get_path(app)?)
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content)
                .map(Self::normalized)
                .unwrap_or_else(|e| {
                    log::warn!("[Settings] Failed to parse settings: {}, returning defaults", e);
                    Self::default()
                }),
            Err(e) => {
                log::warn!("[Settings] Failed to read file: {}, returning defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> SoundboardResult<()> {
        let tmp_path = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write to tmp, then rename.
        fs::write(&tmp_path, json)?;
        fs::rename(tmp_path, path)?;

        Ok(())
    }
}

fn settings_file(data_dir: Result<PathBuf, impl Display>) -> SoundboardResult<PathBuf> {
    data_dir
        .map(|dir| dir.join(SETTINGS_FILE))
        .map_err(|e| SoundboardError::Storage {
            key: "settings".to_string(),
            reason: e.to_string(),
        })
}
