use tauri::{AppHandle, Emitter, State};

use skin_flow::{Action, SceneFrame, Screen, WizardView};

use super::AppState;
use crate::events::INTAKE_FOCUS;

#[tauri::command]
pub fn navigate(action: Action, state: State<'_, AppState>) -> Result<Screen, String> {
    let screen = state.0.navigate(action).map_err(|e| e.to_string())?;

    if screen == Screen::CameraSetup {
        let session = state.0.clone();
        tauri::async_runtime::spawn(async move {
            session.finish_camera_setup().await;
        });
    }
    Ok(screen)
}

#[tauri::command]
pub fn go_back(state: State<'_, AppState>) -> Screen {
    state.0.go_back()
}

#[tauri::command]
pub fn current_screen(state: State<'_, AppState>) -> Screen {
    state.0.current_screen()
}

/// Rotation and pulse values for the current screen's decorations
#[tauri::command]
pub fn ornament_frame(state: State<'_, AppState>) -> SceneFrame {
    state.0.ornament_frame()
}

#[tauri::command]
pub fn intake_state(state: State<'_, AppState>) -> WizardView {
    state.0.intake_state()
}

#[tauri::command]
pub fn intake_input(value: String, state: State<'_, AppState>) -> WizardView {
    state.0.intake_input(&value)
}

#[tauri::command]
pub async fn intake_confirm(
    app_handle: AppHandle,
    state: State<'_, AppState>,
) -> Result<WizardView, String> {
    let result = state.0.intake_confirm().await;

    // A failed submission reopens the city field
    if state.0.take_focus_request() {
        let _ = app_handle.emit(INTAKE_FOCUS, ());
    }
    result.map_err(|e| e.to_string())
}
