// Tauri command surface. Each command locks the board once, applies one
// operation and pushes a fresh snapshot to the page.

use tauri::{AppHandle, Emitter, Manager};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

use crate::bridge::{self, BOARD_UPDATED_EVENT};
use crate::modules::media::{AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::modules::playback::MediaEvent;
use crate::modules::session::{CardId, MoveDirection};
use crate::modules::soundboard::{BoardSnapshot, Soundboard};
use crate::settings::Settings;
use crate::state::{AppState, Tab};

fn with_board<T>(app: &AppHandle, f: impl FnOnce(&mut Soundboard) -> T) -> Result<T, String> {
    let state = app.state::<AppState>();
    let (result, snapshot, progress) = {
        let mut board = state.board.lock().map_err(|e| e.to_string())?;
        let result = f(&mut *board);
        (result, board.snapshot(), board.take_progress_request())
    };

    if let Some(epoch) = progress {
        let frame_ms = state
            .settings
            .read()
            .map(|s| s.progress_frame_ms)
            .map_err(|e| e.to_string())?;
        bridge::spawn_progress_loop(app.clone(), epoch, frame_ms);
    }

    app.emit(BOARD_UPDATED_EVENT, &snapshot).map_err(|e| e.to_string())?;
    Ok(result)
}

#[tauri::command]
pub fn get_board(app: AppHandle) -> Result<BoardSnapshot, String> {
    let state = app.state::<AppState>();
    let board = state.board.lock().map_err(|e| e.to_string())?;
    Ok(board.snapshot())
}

/// Opens the native picker and appends the chosen files to the active tab.
#[tauri::command]
pub async fn select_files(app: AppHandle) -> Result<usize, String> {
    let picked = app
        .dialog()
        .file()
        .set_title("Add sounds")
        .add_filter("Audio Files", AUDIO_EXTENSIONS)
        .add_filter("Video Files", VIDEO_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .blocking_pick_files();

    let Some(picked) = picked else {
        return Ok(0);
    };
    let paths: Vec<String> = picked
        .into_iter()
        .filter_map(|p| p.into_path().ok())
        .map(|p| p.to_string_lossy().into_owned())
        .collect();

    with_board(&app, |board| board.add_files(&paths))
}

#[tauri::command]
pub fn add_tab(app: AppHandle) -> Result<Tab, String> {
    with_board(&app, |board| board.add_tab())
}

#[tauri::command]
pub fn switch_tab(app: AppHandle, tab_id: String) -> Result<bool, String> {
    with_board(&app, |board| board.switch_tab(&tab_id))
}

#[tauri::command]
pub fn rename_tab(app: AppHandle, tab_id: String, name: String) -> Result<bool, String> {
    with_board(&app, |board| board.rename_tab(&tab_id, &name))
}

#[tauri::command]
pub fn delete_tab(app: AppHandle, tab_id: String) -> Result<bool, String> {
    with_board(&app, |board| board.delete_tab(&tab_id))
}

#[tauri::command]
pub fn reorder_tabs(app: AppHandle, order: Vec<String>) -> Result<bool, String> {
    with_board(&app, |board| board.reorder_tabs(&order))
}

#[tauri::command]
pub fn rename_card(app: AppHandle, path: String, name: String) -> Result<bool, String> {
    with_board(&app, |board| board.set_custom_name(&path, &name))
}

/// Asks before removing unless the confirmation is switched off.
#[tauri::command]
pub async fn remove_card(app: AppHandle, card_id: CardId) -> Result<bool, String> {
    let state = app.state::<AppState>();
    let confirm = state
        .settings
        .read()
        .map(|s| s.confirm_before_remove)
        .map_err(|e| e.to_string())?;

    if confirm {
        let name = {
            let board = state.board.lock().map_err(|e| e.to_string())?;
            match board.card_path(card_id) {
                Some(path) => board.display_name(&path),
                None => return Ok(false),
            }
        };
        let accepted = app
            .dialog()
            .message(format!("Remove \"{}\" from this tab?", name))
            .title("Remove sound")
            .kind(MessageDialogKind::Warning)
            .buttons(MessageDialogButtons::OkCancel)
            .blocking_show();
        if !accepted {
            return Ok(false);
        }
    }

    with_board(&app, |board| board.remove_card(card_id))
}

#[tauri::command]
pub fn move_card(app: AppHandle, card_id: CardId, direction: MoveDirection) -> Result<bool, String> {
    with_board(&app, |board| board.move_card(card_id, direction))
}

#[tauri::command]
pub fn reorder_cards(app: AppHandle, order: Vec<String>) -> Result<bool, String> {
    with_board(&app, |board| board.reorder_files(order))
}

#[tauri::command]
pub fn play_card(app: AppHandle, card_id: CardId) -> Result<bool, String> {
    with_board(&app, |board| board.play(card_id))
}

#[tauri::command]
pub fn toggle_card(app: AppHandle, card_id: CardId) -> Result<bool, String> {
    with_board(&app, |board| board.toggle(card_id))
}

#[tauri::command]
pub fn pause_playback(app: AppHandle) -> Result<bool, String> {
    with_board(&app, |board| board.pause())
}

#[tauri::command]
pub fn resume_playback(app: AppHandle) -> Result<bool, String> {
    with_board(&app, |board| board.resume())
}

#[tauri::command]
pub fn stop_playback(app: AppHandle) -> Result<bool, String> {
    with_board(&app, |board| board.stop())
}

#[tauri::command]
pub fn seek_playback(app: AppHandle, seconds: f64) -> Result<bool, String> {
    with_board(&app, |board| board.seek(seconds))
}

#[tauri::command]
pub fn seek_fraction(app: AppHandle, fraction: f64) -> Result<bool, String> {
    with_board(&app, |board| board.seek_fraction(fraction))
}

#[tauri::command]
pub fn rewind_playback(app: AppHandle) -> Result<bool, String> {
    with_board(&app, |board| board.rewind())
}

#[tauri::command]
pub fn toggle_cue(app: AppHandle, path: String) -> Result<bool, String> {
    with_board(&app, |board| board.set_cue_here(&path))
}

#[tauri::command]
pub fn play_from_cue(app: AppHandle, card_id: CardId) -> Result<bool, String> {
    with_board(&app, |board| board.play_from_cue(card_id))
}

#[tauri::command]
pub fn fade_out(app: AppHandle) -> Result<bool, String> {
    let ticket = with_board(&app, |board| board.fade_out())?;
    match ticket {
        Some(ticket) => {
            bridge::spawn_fade_ticker(app.clone(), ticket);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[tauri::command]
pub fn transfer_card(
    app: AppHandle,
    path: String,
    source: String,
    target: String,
    is_copy: bool,
) -> Result<bool, String> {
    with_board(&app, |board| board.transfer(&path, &source, &target, is_copy))
}

/// Callback from the page's media elements.
#[tauri::command]
pub fn media_event(app: AppHandle, event: MediaEvent) -> Result<bool, String> {
    if matches!(event, MediaEvent::TimeUpdate { .. }) {
        // Position updates arrive every frame; no snapshot for those.
        let state = app.state::<AppState>();
        let mut board = state.board.lock().map_err(|e| e.to_string())?;
        return Ok(board.handle_media_event(event));
    }
    with_board(&app, |board| board.handle_media_event(event))
}

#[tauri::command]
pub fn get_settings(app: AppHandle) -> Result<Settings, String> {
    let state = app.state::<AppState>();
    let settings = state.settings.read().map_err(|e| e.to_string())?;
    Ok(settings.clone())
}

#[tauri::command]
pub fn save_settings(app: AppHandle, settings: Settings) -> Result<Settings, String> {
    let settings = settings.normalized();
    settings.save(&app).map_err(|e| e.to_string())?;
    let state = app.state::<AppState>();
    {
        let mut current = state.settings.write().map_err(|e| e.to_string())?;
        *current = settings.clone();
    }
    with_board(&app, |board| board.apply_settings(&settings))?;
    log::info!("[Settings] Saved");
    Ok(settings)
}
