use std::sync::Arc;
use tauri::{AppHandle, Emitter};
use tokio::sync::watch;
use tracing::debug;

use skin_capture::{CameraState, CameraStatus};

use crate::session::Session;

pub const SCREEN_CHANGED: &str = "screen-changed";
pub const INTAKE_PHASE: &str = "intake-phase";
pub const INTAKE_FOCUS: &str = "intake-focus";
pub const CAMERA_STATUS: &str = "camera-status";
pub const CAMERA_NOTICE: &str = "camera-notice";

/// Forward screen and intake changes to the frontend for the lifetime of
/// the app.
pub fn spawn_forwarders(app_handle: &AppHandle, session: &Arc<Session>) {
    // Emit screen changes, including the automatic camera setup hop
    let mut screen_rx = session.subscribe_screen();
    let app_clone = app_handle.clone();
    tauri::async_runtime::spawn(async move {
        loop {
            if screen_rx.changed().await.is_err() {
                break;
            }
            let screen = *screen_rx.borrow();
            let _ = app_clone.emit(SCREEN_CHANGED, screen);
        }
    });

    // Emit intake phase and field state
    let mut intake_rx = session.subscribe_intake();
    let app_clone2 = app_handle.clone();
    let session_clone = session.clone();
    tauri::async_runtime::spawn(async move {
        loop {
            if intake_rx.changed().await.is_err() {
                break;
            }
            let view = intake_rx.borrow().clone();
            let _ = app_clone2.emit(INTAKE_PHASE, view);
            if session_clone.take_focus_request() {
                let _ = app_clone2.emit(INTAKE_FOCUS, ());
            }
        }
    });
}

/// Forward one camera session's status until it is released
pub fn spawn_camera_status(app_handle: &AppHandle, mut status_rx: watch::Receiver<CameraStatus>) {
    let app_clone = app_handle.clone();
    tauri::async_runtime::spawn(async move {
        loop {
            let status = status_rx.borrow_and_update().clone();
            let released = status.state == CameraState::Released;
            let _ = app_clone.emit(CAMERA_STATUS, status);
            if released || status_rx.changed().await.is_err() {
                break;
            }
        }
        debug!("Camera status forwarding stopped");
    });
}
