pub mod session;

#[cfg(feature = "desktop")]
mod commands;
#[cfg(feature = "desktop")]
mod events;

pub use session::{Session, SessionError, SummaryState};

pub const DEFAULT_LOG_FILTER: &str =
    "skinstric_lib=debug,skin_capture=debug,skin_analysis=debug,skin_flow=debug";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();
}

/// The camera the desktop shell opens, if a backend is compiled in
#[cfg(feature = "v4l")]
pub fn default_camera() -> Option<std::sync::Arc<dyn skin_capture::CameraDevice>> {
    Some(std::sync::Arc::new(skin_capture::V4lCamera::new(0)))
}

#[cfg(not(feature = "v4l"))]
pub fn default_camera() -> Option<std::sync::Arc<dyn skin_capture::CameraDevice>> {
    None
}

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use std::sync::Arc;
    use tauri::Manager;

    init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_shell::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&data_dir)?;

                let store = skin_flow::JsonFileStore::new(data_dir.join("storage.json"))?;
                let api = skin_analysis::AnalysisClient::from_env();
                tracing::info!(
                    "Storage at {}, analysis at {}",
                    store.path().display(),
                    api.config().phase_two_url
                );

                let session = Arc::new(Session::new(
                    Arc::new(api),
                    Arc::new(store),
                    default_camera(),
                ));
                events::spawn_forwarders(app.handle(), &session);
                app.manage(commands::AppState(session));
                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            commands::navigate,
            commands::go_back,
            commands::current_screen,
            commands::ornament_frame,
            commands::intake_state,
            commands::intake_input,
            commands::intake_confirm,
            commands::start_camera,
            commands::camera_status,
            commands::capture_photo,
            commands::retake_photo,
            commands::stop_camera,
            commands::pick_photo,
            commands::use_photo,
            commands::load_summary,
            commands::select_category,
            commands::select_row,
            commands::summary_state,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
