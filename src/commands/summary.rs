use tauri::State;

use skin_analysis::Category;

use super::AppState;
use crate::session::SummaryState;

#[tauri::command]
pub async fn load_summary(state: State<'_, AppState>) -> Result<SummaryState, String> {
    state.0.load_summary().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn summary_state(state: State<'_, AppState>) -> SummaryState {
    state.0.summary_state()
}

#[tauri::command]
pub fn select_category(
    category: Category,
    state: State<'_, AppState>,
) -> Result<SummaryState, String> {
    state.0.select_category(category).map_err(|e| e.to_string())
}

#[tauri::command]
pub fn select_row(
    category: Category,
    key: String,
    state: State<'_, AppState>,
) -> Result<SummaryState, String> {
    state.0.select_row(category, &key).map_err(|e| e.to_string())
}
