use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::{json_error, load_meta, not_found, parse_strict};
use crate::sched::{ScheduleError, valid_shape};

/// Replaces a script's cron schedule. An empty expression disarms it.
///
/// The cron job is registered with the engine first and the metadata
/// written after, so a failed write never leaves a schedule running
/// that a restart would forget.
pub async fn set_schedule_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if load_meta(&state.store, &id).is_none() {
        return not_found();
    }
    let payload = match parse_strict(&body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };
    let expr = payload
        .get("schedule")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    if !expr.is_empty() && !valid_shape(&expr) {
        return json_error(StatusCode::BAD_REQUEST, "Invalid cron expression");
    }
    let Some(sched) = &state.sched else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Cron service unavailable on this host",
        );
    };

    match sched.set_schedule(&id, &expr).await {
        Ok(()) => {}
        Err(ScheduleError::InvalidExpression) => {
            return json_error(StatusCode::BAD_REQUEST, "Invalid cron expression");
        }
        Err(ScheduleError::Runtime(msg)) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to register schedule: {}", msg),
            );
        }
    }

    let stored = if expr.is_empty() {
        None
    } else {
        Some(expr.clone())
    };
    if let Err(e) = state.store.set_schedule(&id, stored) {
        // Roll the job back so the engine and the metadata agree.
        sched.remove_schedule(&id).await;
        tracing::warn!("Failed to persist schedule for {}: {}", id, e);
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Failed to write schedule: {}", e),
        );
    }

    let mut reply = serde_json::json!({ "schedule": expr });
    if !expr.is_empty()
        && let Some(next) = sched.next_run(&id).await
    {
        reply["next_run"] = serde_json::json!(next.to_rfc3339());
    }
    Json(reply).into_response()
}
