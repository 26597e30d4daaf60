use axum::{Json, extract::State};

use super::super::AppState;

pub async fn health_endpoint() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn info_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "container": state.config.container,
        "host_access": state.config.host_access,
        "scripts_dir": state.config.scripts_dir.display().to_string(),
        "hostname": host,
        "user": whoami::username(),
    }))
}
