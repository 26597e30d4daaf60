use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde_json::Value;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::super::AppState;
use super::{json_error, load_meta, not_found, parse_lenient, truthy};
use crate::runs::RunEvent;

pub async fn run_script_endpoint(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    if load_meta(&state.store, &id).is_none() {
        return not_found();
    }
    let payload = parse_lenient(&body);
    let input = match payload.get("input") {
        None => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return json_error(StatusCode::BAD_REQUEST, "Input must be a string"),
    };
    let sudo = truthy(payload.get("run_as_sudo"));

    let run_id = state
        .runs
        .start(state.store.script_path(&id), input, sudo)
        .await;
    Json(serde_json::json!({ "run_id": run_id })).into_response()
}

/// Attaches to a run's output as server-sent events. Each output line
/// arrives JSON-encoded in a `data:` frame; a final `done` event marks
/// the end, after which the run is forgotten.
pub async fn stream_run_endpoint(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Response {
    let Some(receiver) = state.runs.take_stream(&run_id).await else {
        return json_error(StatusCode::NOT_FOUND, "Run not found");
    };

    let runs = state.runs.clone();
    let id = run_id.clone();
    let stream = UnboundedReceiverStream::new(receiver).then(move |event| {
        let runs = runs.clone();
        let id = id.clone();
        async move {
            match event {
                RunEvent::Line(line) => {
                    Ok::<Event, Infallible>(Event::default().data(Value::String(line).to_string()))
                }
                RunEvent::Done => {
                    runs.remove(&id).await;
                    Ok(Event::default().event("done").data("finished"))
                }
            }
        }
    });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive"),
        )
        .into_response()
}

pub async fn stop_run_endpoint(State(state): State<AppState>, Path(run_id): Path<String>) -> Response {
    if state.runs.stop(&run_id).await {
        Json(serde_json::json!({ "ok": true })).into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, "Run not found")
    }
}
