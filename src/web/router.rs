use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{info, runs, schedule, scripts};

fn build_localhost_cors(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(info::health_endpoint))
        .route("/api/info", get(info::info_endpoint))
        .route(
            "/api/scripts",
            get(scripts::list_scripts_endpoint).post(scripts::create_script_endpoint),
        )
        .route(
            "/api/scripts/{id}",
            get(scripts::get_script_endpoint)
                .put(scripts::update_script_endpoint)
                .delete(scripts::delete_script_endpoint),
        )
        .route("/api/scripts/{id}/schedule", put(schedule::set_schedule_endpoint))
        .route("/api/scripts/{id}/run", post(runs::run_script_endpoint))
        .route("/api/runs/{run_id}/stream", get(runs::stream_run_endpoint))
        .route("/api/runs/{run_id}/stop", post(runs::stop_run_endpoint))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .fallback(super::static_handler)
        .layer(middleware::from_fn(security_headers))
        .layer(build_localhost_cors(state.config.port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'",
        ),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::runs::RunManager;
    use crate::sched::ScheduleService;
    use crate::store::{DEFAULT_BODY, ScriptStore};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::sync::Mutex;
    use tokio_cron_scheduler::JobScheduler;
    use tower::util::ServiceExt;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 9855,
            data_dir: dir.path().to_path_buf(),
            scripts_dir: dir.path().join("scripts"),
            container: false,
            host_access: false,
        }
    }

    async fn test_state() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = ScriptStore::new(config.scripts_dir.clone());
        store.ensure_layout().unwrap();
        let runs = RunManager::new();
        let scheduler = Arc::new(Mutex::new(JobScheduler::new().await.unwrap()));
        let sched = Arc::new(ScheduleService::new(
            scheduler,
            store.clone(),
            runs.clone(),
        ));
        let (log_tx, _) = tokio::sync::broadcast::channel(16);
        let state = AppState {
            config,
            store,
            runs,
            sched: Some(sched),
            log_tx,
        };
        (state, dir)
    }

    fn state_without_scheduler() -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        let store = ScriptStore::new(config.scripts_dir.clone());
        store.ensure_layout().unwrap();
        let (log_tx, _) = tokio::sync::broadcast::channel(16);
        let state = AppState {
            config,
            store,
            runs: RunManager::new(),
            sched: None,
            log_tx,
        };
        (state, dir)
    }

    async fn json_request(
        app: Router,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let body = match body {
            Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
            None => Body::empty(),
        };

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&body_bytes).unwrap_or(serde_json::json!({}));
        (status, json)
    }

    async fn create_script(app: Router, name: &str, script: &str) -> String {
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/scripts",
            Some(serde_json::json!({ "name": name, "script": script })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);

        let req = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert_eq!(
            resp.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get("x-frame-options").unwrap(), "DENY");
        assert!(
            resp.headers()
                .get("content-security-policy")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("default-src 'self'")
        );
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) = json_request(app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn info_reports_version_and_dirs() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) = json_request(app, Method::GET, "/api/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert!(json["container"].is_boolean());
        assert!(json["host_access"].is_boolean());
        assert!(json["scripts_dir"].as_str().unwrap().contains("scripts"));
    }

    #[tokio::test]
    async fn create_requires_a_name() {
        let (state, _dir) = test_state().await;
        for body in [
            Some(serde_json::json!({})),
            Some(serde_json::json!({ "name": "" })),
            Some(serde_json::json!({ "name": "   " })),
        ] {
            let app = build_router(state.clone());
            let (status, json) = json_request(app, Method::POST, "/api/scripts", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "Name is required");
        }
    }

    #[tokio::test]
    async fn create_rejects_an_unparseable_body() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) = json_request(app, Method::POST, "/api/scripts", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn create_returns_metadata_with_id() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) = json_request(
            app,
            Method::POST,
            "/api/scripts",
            Some(serde_json::json!({ "name": "Backup", "description": "nightly" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["id"].as_str().unwrap().len(), 8);
        assert_eq!(json["name"], "Backup");
        assert_eq!(json["description"], "nightly");
        assert_eq!(json["schedule"], "");
        assert!(json["created"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn create_defaults_the_script_body() {
        let (state, _dir) = test_state().await;
        let app = build_router(state.clone());
        let (_, json) = json_request(
            app,
            Method::POST,
            "/api/scripts",
            Some(serde_json::json!({ "name": "New Script" })),
        )
        .await;
        let id = json["id"].as_str().unwrap();

        let app = build_router(state);
        let (status, json) =
            json_request(app, Method::GET, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["script"], DEFAULT_BODY);
    }

    #[tokio::test]
    async fn list_returns_created_scripts() {
        let (state, _dir) = test_state().await;
        for name in ["one", "two", "three"] {
            create_script(build_router(state.clone()), name, "echo hi").await;
        }

        let app = build_router(state);
        let (status, json) = json_request(app, Method::GET, "/api/scripts", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = json.as_array().unwrap();
        assert_eq!(list.len(), 3);
        for item in list {
            assert!(item["id"].is_string());
            assert!(item["name"].is_string());
            assert!(item["schedule"].is_string());
        }
    }

    #[tokio::test]
    async fn unknown_script_is_404() {
        let (state, _dir) = test_state().await;
        for (method, path) in [
            (Method::GET, "/api/scripts/deadbeef"),
            (Method::PUT, "/api/scripts/deadbeef"),
            (Method::DELETE, "/api/scripts/deadbeef"),
            (Method::PUT, "/api/scripts/deadbeef/schedule"),
            (Method::POST, "/api/scripts/deadbeef/run"),
            (Method::GET, "/api/scripts/not-hex-id"),
        ] {
            let app = build_router(state.clone());
            let (status, json) = json_request(app, method, path, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", path);
            assert_eq!(json["error"], "Not found");
        }
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "original", "echo one").await;

        let app = build_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::PUT,
            &format!("/api/scripts/{}", id),
            Some(serde_json::json!({ "description": "updated" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "original");
        assert_eq!(json["description"], "updated");

        let app = build_router(state.clone());
        json_request(
            app,
            Method::PUT,
            &format!("/api/scripts/{}", id),
            Some(serde_json::json!({ "script": "echo two" })),
        )
        .await;

        let app = build_router(state);
        let (_, json) =
            json_request(app, Method::GET, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(json["name"], "original");
        assert_eq!(json["script"], "echo two");
    }

    #[tokio::test]
    async fn delete_removes_the_script() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "doomed", "echo bye").await;

        let app = build_router(state.clone());
        let (status, json) =
            json_request(app, Method::DELETE, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);

        let app = build_router(state.clone());
        let (status, _) =
            json_request(app, Method::GET, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let app = build_router(state);
        let (status, _) =
            json_request(app, Method::DELETE, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn schedule_rejects_malformed_expressions() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "cron", "echo tick").await;

        for expr in ["@reboot", "* * *", "nonsense", "99 99 99 99 99"] {
            let app = build_router(state.clone());
            let (status, json) = json_request(
                app,
                Method::PUT,
                &format!("/api/scripts/{}/schedule", id),
                Some(serde_json::json!({ "schedule": expr })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", expr);
            assert_eq!(json["error"], "Invalid cron expression");
        }
    }

    #[tokio::test]
    async fn schedule_without_engine_is_503() {
        let (state, _dir) = state_without_scheduler();
        let id = create_script(build_router(state.clone()), "cron", "echo tick").await;

        let app = build_router(state);
        let (status, json) = json_request(
            app,
            Method::PUT,
            &format!("/api/scripts/{}/schedule", id),
            Some(serde_json::json!({ "schedule": "*/5 * * * *" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Cron service unavailable on this host");
    }

    #[tokio::test]
    async fn schedule_roundtrip_sets_and_clears() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "cron", "echo tick").await;

        let app = build_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::PUT,
            &format!("/api/scripts/{}/schedule", id),
            Some(serde_json::json!({ "schedule": "*/5 * * * *" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schedule"], "*/5 * * * *");

        let app = build_router(state.clone());
        let (_, json) =
            json_request(app, Method::GET, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(json["schedule"], "*/5 * * * *");

        let app = build_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::PUT,
            &format!("/api/scripts/{}/schedule", id),
            Some(serde_json::json!({ "schedule": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["schedule"], "");

        let app = build_router(state);
        let (_, json) =
            json_request(app, Method::GET, &format!("/api/scripts/{}", id), None).await;
        assert_eq!(json["schedule"], "");
    }

    #[tokio::test]
    async fn rejected_schedule_update_leaves_the_old_one_active() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "cron", "echo tick").await;

        let (status, _) = json_request(
            build_router(state.clone()),
            Method::PUT,
            &format!("/api/scripts/{}/schedule", id),
            Some(serde_json::json!({ "schedule": "*/5 * * * *" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Shape-valid but engine-rejected; the stored schedule must keep firing.
        let (status, json) = json_request(
            build_router(state.clone()),
            Method::PUT,
            &format!("/api/scripts/{}/schedule", id),
            Some(serde_json::json!({ "schedule": "99 99 99 99 99" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid cron expression");

        let (_, json) = json_request(build_router(state), Method::GET, "/api/scripts", None).await;
        let item = json
            .as_array()
            .unwrap()
            .iter()
            .find(|item| item["id"] == id)
            .unwrap();
        assert_eq!(item["schedule"], "*/5 * * * *");
        assert!(item["next_run"].is_string(), "old job should still be armed");
    }

    #[tokio::test]
    async fn run_rejects_non_string_input() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "reader", "cat").await;

        for input in [serde_json::json!(5), serde_json::json!(null)] {
            let app = build_router(state.clone());
            let (status, json) = json_request(
                app,
                Method::POST,
                &format!("/api/scripts/{}/run", id),
                Some(serde_json::json!({ "input": input })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "Input must be a string");
        }
    }

    #[tokio::test]
    #[cfg_attr(windows, ignore = "runs depend on bash")]
    async fn run_and_stream_deliver_output() {
        let (state, _dir) = test_state().await;
        let id = create_script(build_router(state.clone()), "hello", "echo streamed-hello").await;

        let app = build_router(state.clone());
        let (status, json) = json_request(
            app,
            Method::POST,
            &format!("/api/scripts/{}/run", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let run_id = json["run_id"].as_str().unwrap().to_string();
        assert_eq!(run_id.len(), 12);

        let app = build_router(state);
        let req = Request::builder()
            .method(Method::GET)
            .uri(format!("/api/runs/{}/stream", run_id))
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("streamed-hello"), "{}", text);
        assert!(text.contains("[Process exited with code 0]"), "{}", text);
        assert!(text.contains("event: done"), "{}", text);
    }

    #[tokio::test]
    async fn stream_of_unknown_run_is_404() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) =
            json_request(app, Method::GET, "/api/runs/000000000000/stream", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Run not found");
    }

    #[tokio::test]
    async fn stop_of_unknown_run_is_404() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) =
            json_request(app, Method::POST, "/api/runs/000000000000/stop", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Run not found");
    }

    #[tokio::test]
    async fn unknown_api_path_is_a_json_404() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let (status, json) = json_request(app, Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Not found");
    }

    #[tokio::test]
    async fn method_not_allowed_returns_405() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let req = Request::builder()
            .method(Method::PATCH)
            .uri("/api/scripts")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn log_feed_responds_with_an_event_stream() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/api/logs")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        // The body never terminates, so only the headers are checked.
        assert!(
            resp.headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
    }

    #[tokio::test]
    async fn dashboard_is_served_from_the_root() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("scriptshed"));
    }

    #[tokio::test]
    async fn static_assets_are_served_with_their_mime_type() {
        let (state, _dir) = test_state().await;
        let app = build_router(state);
        let req = Request::builder()
            .method(Method::GET)
            .uri("/style.css")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/css")
        );
    }
}
