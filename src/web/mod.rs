mod handlers;
mod router;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Json,
    extract::State,
    http::{StatusCode, Uri},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
};
use include_dir::{Dir, include_dir};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::config::Config;
use crate::lifecycle::LifecycleComponent;
use crate::runs::RunManager;
use crate::sched::ScheduleService;
use crate::store::ScriptStore;

static FRONTEND_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/frontend");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Config,
    pub(crate) store: ScriptStore,
    pub(crate) runs: RunManager,
    pub(crate) sched: Option<Arc<ScheduleService>>,
    pub(crate) log_tx: broadcast::Sender<String>,
}

/// Serves the REST API, the log feed and the embedded dashboard from
/// one listener. The port is claimed during init so a taken address
/// fails startup instead of a background task.
pub struct ApiServer {
    config: Config,
    store: ScriptStore,
    runs: RunManager,
    sched: Option<Arc<ScheduleService>>,
    log_tx: broadcast::Sender<String>,
    listener: Option<TcpListener>,
    server: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(
        config: Config,
        store: ScriptStore,
        runs: RunManager,
        sched: Option<Arc<ScheduleService>>,
        log_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            config,
            store,
            runs,
            sched,
            log_tx,
            listener: None,
            server: None,
        }
    }

    fn app_state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            store: self.store.clone(),
            runs: self.runs.clone(),
            sched: self.sched.clone(),
            log_tx: self.log_tx.clone(),
        }
    }
}

#[async_trait]
impl LifecycleComponent for ApiServer {
    async fn on_init(&mut self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Could not bind {}", addr))?;
        self.listener = Some(listener);
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("API server was never initialized");
        };
        let addr = listener.local_addr()?;
        let app = router::build_router(self.app_state());
        self.server = Some(tokio::spawn(async move {
            info!("API Server running at http://{}", addr);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API Server crashed: {}", e);
            }
        }));
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        if let Some(server) = self.server.take() {
            server.abort();
        }
        Ok(())
    }
}

// --- Log feed and embedded dashboard ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.log_tx.subscribe()).map(|line| {
        let event = match line {
            Ok(line) => Event::default().data(line),
            // A slow reader dropped messages; say so instead of going silent.
            Err(_) => Event::default().data("[log feed lagged, some lines were skipped]"),
        };
        Ok(event)
    });

    Sse::new(stream)
}

async fn static_handler(uri: Uri) -> Response {
    let mut path = uri.path().trim_start_matches('/');
    if path.is_empty() {
        path = "index.html";
    }

    // Unknown API paths get a JSON 404 rather than the index page.
    if path.starts_with("api/") {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "Not found" })),
        )
            .into_response();
    }

    match serve_asset(path) {
        Some(response) => response,
        // Any other unknown path serves the app shell.
        None => serve_asset("index.html")
            .unwrap_or_else(|| (StatusCode::NOT_FOUND, "404 Not Found").into_response()),
    }
}

fn serve_asset(path: &str) -> Option<Response> {
    let file = FRONTEND_DIR.get_file(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(
        (
            [(axum::http::header::CONTENT_TYPE, mime.as_ref())],
            file.contents(),
        )
            .into_response(),
    )
}
