use tauri::{AppHandle, Emitter, State};
use tauri_plugin_dialog::DialogExt;
use tracing::info;

use skin_capture::{file::IMAGE_EXTENSIONS, CameraStatus, CaptureSummary};
use skin_flow::{Action, Screen};

use super::AppState;
use crate::events::{spawn_camera_status, CAMERA_NOTICE};

/// Open the camera on the capture screen. A denial shows the notice and
/// the session steps back on its own.
#[tauri::command]
pub async fn start_camera(
    app_handle: AppHandle,
    state: State<'_, AppState>,
) -> Result<CameraStatus, String> {
    match state.0.start_camera().await {
        Ok(status) => {
            if let Some(status_rx) = state.0.camera_status_receiver() {
                spawn_camera_status(&app_handle, status_rx);
            }
            Ok(status)
        }
        Err(e) => {
            if let Some(notice) = e.camera_notice() {
                let _ = app_handle.emit(CAMERA_NOTICE, &notice);
            }
            Err(e.to_string())
        }
    }
}

#[tauri::command]
pub fn camera_status(state: State<'_, AppState>) -> Option<CameraStatus> {
    state.0.camera_status()
}

#[tauri::command]
pub fn capture_photo(state: State<'_, AppState>) -> Result<CaptureSummary, String> {
    state.0.capture_photo().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn retake_photo(state: State<'_, AppState>) -> Result<(), String> {
    state.0.retake_photo().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn stop_camera(state: State<'_, AppState>) {
    state.0.stop_camera();
}

/// Load a photo from `path`, or ask with the native picker when no path is
/// given. Returns None when the picker is cancelled.
#[tauri::command]
pub async fn pick_photo(
    path: Option<String>,
    app_handle: AppHandle,
    state: State<'_, AppState>,
) -> Result<Option<CaptureSummary>, String> {
    let path = match path.filter(|p| !p.is_empty()) {
        Some(p) => p,
        None => {
            let dialog_app = app_handle.clone();
            let picked = tauri::async_runtime::spawn_blocking(move || {
                dialog_app
                    .dialog()
                    .file()
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .blocking_pick_file()
            })
            .await
            .map_err(|e| e.to_string())?;

            match picked {
                Some(file) => file
                    .into_path()
                    .map_err(|e| e.to_string())?
                    .to_string_lossy()
                    .to_string(),
                None => {
                    info!("Photo picker cancelled");
                    return Ok(None);
                }
            }
        }
    };

    state.0.pick_photo(&path).map(Some).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn use_photo(state: State<'_, AppState>) -> Result<Screen, String> {
    state.0.navigate(Action::UsePhoto).map_err(|e| e.to_string())
}
