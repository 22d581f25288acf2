// Soundboard library entry point.
// Exposes every module so main.rs stays thin and the pure logic can be tested on its own.

use std::sync::{Mutex, RwLock};

use tauri::Manager;

pub mod bridge;
pub mod commands;
pub mod error;
pub mod settings;
pub mod store;

// Shared state
pub mod state;

// Pure logic modules (no Tauri imports)
pub mod modules;

use crate::bridge::{TauriSink, WebviewMedia};
use crate::modules::soundboard::Soundboard;
use crate::settings::Settings;
use crate::state::AppState;
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};

/// Window calls are best effort: a failure is logged and startup carries on.
fn window_call<E: std::fmt::Display>(action: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("[Window] Could not {}: {}", action, e);
            false
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            if let Some(window) = app.get_webview_window("main") {
                window_call("focus the running instance", window.set_focus());
            }
        }))
        .plugin(
            tauri_plugin_log::Builder::default()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let handle = app.handle().clone();
            let settings = Settings::load(&handle);

            let store: Box<dyn KeyValueStore> = match app.path().app_data_dir() {
                Ok(dir) => {
                    log::info!("[Store] Using {:?}", dir);
                    Box::new(JsonFileStore::new(dir))
                }
                Err(e) => {
                    log::warn!("[Store] No app data dir ({}), state will not survive restart", e);
                    Box::new(MemoryStore::new())
                }
            };

            let board = Soundboard::new(
                store,
                Box::new(WebviewMedia::new(handle.clone())),
                Box::new(TauriSink::new(handle.clone())),
                &settings,
            );

            if settings.fullscreen {
                if let Some(window) = app.get_webview_window("main") {
                    window_call("enter fullscreen", window.set_fullscreen(true));
                }
            }

            app.manage(AppState {
                board: Mutex::new(board),
                settings: RwLock::new(settings),
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_board,
            commands::select_files,
            commands::add_tab,
            commands::switch_tab,
            commands::rename_tab,
            commands::delete_tab,
            commands::reorder_tabs,
            commands::rename_card,
            commands::remove_card,
            commands::move_card,
            commands::reorder_cards,
            commands::play_card,
            commands::toggle_card,
            commands::pause_playback,
            commands::resume_playback,
            commands::stop_playback,
            commands::seek_playback,
            commands::seek_fraction,
            commands::rewind_playback,
            commands::toggle_cue,
            commands::play_from_cue,
            commands::fade_out,
            commands::transfer_card,
            commands::media_event,
            commands::get_settings,
            commands::save_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                let state = app.state::<AppState>();
                if let Ok(mut board) = state.board.lock() {
                    board.shutdown();
                };
            }
        });
}
