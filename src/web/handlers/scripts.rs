use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::{json_error, load_meta, not_found, parse_strict, script_json};
use crate::store::DEFAULT_BODY;

pub async fn list_scripts_endpoint(State(state): State<AppState>) -> Response {
    match state.store.list() {
        Ok(scripts) => {
            let mut list = Vec::with_capacity(scripts.len());
            for (id, meta) in &scripts {
                let mut value = script_json(id, meta);
                if let Some(sched) = &state.sched
                    && meta.schedule.as_deref().is_some_and(|s| !s.is_empty())
                    && let Some(next) = sched.next_run(id).await
                {
                    value["next_run"] = serde_json::json!(next.to_rfc3339());
                }
                list.push(value);
            }
            Json(serde_json::json!(list)).into_response()
        }
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Storage error: {}", e),
        ),
    }
}

pub async fn create_script_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_strict(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let name = payload
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    if name.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Name is required");
    }
    let description = payload
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    // An absent `script` gets the shebang template; an explicit empty
    // string is stored as given.
    let script_body = payload
        .get("script")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_BODY);

    match state.store.create(name, description, script_body) {
        Ok((id, meta)) => (StatusCode::CREATED, Json(script_json(&id, &meta))).into_response(),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Storage error: {}", e),
        ),
    }
}

pub async fn get_script_endpoint(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(meta) = load_meta(&state.store, &id) else {
        return not_found();
    };
    let mut value = script_json(&id, &meta);
    value["script"] = serde_json::json!(state.store.read_body(&id).unwrap_or_default());
    Json(value).into_response()
}

/// Partial update. Only the fields present in the payload change; an
/// absent `script` leaves the stored file untouched.
pub async fn update_script_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let Some(mut meta) = load_meta(&state.store, &id) else {
        return not_found();
    };
    let payload = match parse_strict(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    if let Some(name) = payload.get("name").and_then(|v| v.as_str()) {
        meta.name = name.to_string();
    }
    if let Some(description) = payload.get("description").and_then(|v| v.as_str()) {
        meta.description = description.to_string();
    }
    if let Err(e) = state.store.write_meta(&id, &meta) {
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Storage error: {}", e),
        );
    }
    if let Some(script_body) = payload.get("script").and_then(|v| v.as_str()) {
        if let Err(e) = state.store.write_body(&id, script_body) {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Storage error: {}", e),
            );
        }
    }
    Json(script_json(&id, &meta)).into_response()
}

pub async fn delete_script_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if load_meta(&state.store, &id).is_none() {
        return not_found();
    }
    if let Some(sched) = &state.sched {
        sched.remove_schedule(&id).await;
    }
    match state.store.delete(&id) {
        Ok(_) => Json(serde_json::json!({ "ok": true })).into_response(),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Storage error: {}", e),
        ),
    }
}
