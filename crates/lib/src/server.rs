//! Inbound HTTP server: webhook dispatcher and health probe.

use crate::collector::Collector;
use crate::config::Config;
use crate::event::InboundEvent;
use crate::notify::ChatNotifier;
use crate::tracker::TrackerClient;
use crate::workflow;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Shared state for the dispatcher (config, collector, outbound clients).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub collector: Collector,
    pub tracker: TrackerClient,
    pub notifier: ChatNotifier,
    /// Detached workflow tasks; drained during graceful shutdown so the
    /// process stays alive until in-flight runs finish.
    pub workflow_tasks: Arc<RwLock<Vec<JoinHandle<()>>>>,
}

/// Build the router for the relay (health probe + webhook endpoint).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/hook", any(hook))
        .with_state(state)
}

/// Run the relay server; binds to config.server.bind:config.server.port.
/// Blocks until shutdown (e.g. Ctrl+C), then waits for in-flight workflows.
pub async fn run_server(config: Config) -> Result<()> {
    let collector = Collector::new(&config.collector.url);
    let tracker = TrackerClient::new(&config);
    let notifier = ChatNotifier::new(&config.notifier.webhook_url, &config.tracker.base_url);
    let workflow_tasks = Arc::new(RwLock::new(Vec::new()));

    let state = AppState {
        config: Arc::new(config.clone()),
        collector,
        tracker,
        notifier,
        workflow_tasks: workflow_tasks.clone(),
    };
    let app = router(state);

    let bind_addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(workflow_tasks))
        .await
        .context("relay server exited")?;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// Waits for every registered workflow task before letting the server exit.
async fn shutdown_signal(workflow_tasks: Arc<RwLock<Vec<JoinHandle<()>>>>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, waiting for in-flight workflows");

    let handles = {
        let mut g = workflow_tasks.write().await;
        std::mem::take(&mut *g)
    };
    for h in handles {
        let _ = h.await;
    }
    log::info!("workflow tasks finished");
}

/// Webhook endpoint. Announces the request to the collector before any
/// validation, accepts only POST with a JSON content type, then schedules the
/// workflow and acknowledges immediately — the run happens after the response.
async fn hook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let _ = state.collector.post("request coming").await;

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if method != Method::POST || !content_type.contains("application/json") {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(ev) => ev,
        Err(e) => {
            log::debug!("webhook body did not parse: {}", e);
            let _ = state.collector.post(&e.to_string()).await;
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let st = state.clone();
    let handle = tokio::spawn(async move {
        let report =
            workflow::run_workflow(&st.collector, &st.tracker, &st.notifier, event).await;
        log::debug!("workflow {} finished", report.run_id);
    });
    {
        let mut tasks = state.workflow_tasks.write().await;
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    (StatusCode::OK, "ok").into_response()
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
    }))
}
