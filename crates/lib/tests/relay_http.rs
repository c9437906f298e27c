//! Integration tests: start the relay on a free port and drive it with real
//! HTTP against stub upstream servers (tracker, collector, chat webhook) that
//! record every request they receive.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use lib::collector::Collector;
use lib::config::Config;
use lib::event::InboundEvent;
use lib::notify::ChatNotifier;
use lib::server;
use lib::tracker::TrackerClient;
use lib::workflow::{self, CardOutcome, NotifyOutcome, SessionOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const SESSION_COOKIE: &str = "JSESSIONID=abc123";

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: String,
    cookie: Option<String>,
    body: String,
}

/// Stub for every upstream the relay talks to: /login, /cards, /collect, /chat.
#[derive(Clone)]
struct Upstream {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    login_cookie: Option<&'static str>,
    card_status: StatusCode,
}

impl Upstream {
    fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            login_cookie: Some(SESSION_COOKIE),
            card_status: StatusCode::OK,
        }
    }

    async fn recorded(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }
}

async fn upstream_handler(
    State(up): State<Upstream>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    up.requests.lock().await.push(RecordedRequest {
        path: path.clone(),
        cookie: headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: String::from_utf8_lossy(&body).to_string(),
    });
    match path.as_str() {
        "/login" => {
            let mut res = Json(json!({ "result": "ok" })).into_response();
            if let Some(cookie) = up.login_cookie {
                res.headers_mut()
                    .insert(header::SET_COOKIE, HeaderValue::from_static(cookie));
            }
            res
        }
        "/cards" => {
            if up.card_status != StatusCode::OK {
                up.card_status.into_response()
            } else {
                Json(json!({ "resultValue": { "id": "X42", "code": "C7" } })).into_response()
            }
        }
        _ => StatusCode::OK.into_response(),
    }
}

async fn start_upstream(up: Upstream) -> String {
    let app = Router::new().fallback(upstream_handler).with_state(up);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

fn relay_config(upstream_base: &str, port: u16) -> Config {
    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();
    config.tracker.base_url = upstream_base.to_string();
    config.tracker.card_path = "/cards".to_string();
    config.tracker.username = Some("bot".to_string());
    config.tracker.password = Some("secret".to_string());
    config.collector.url = format!("{}/collect", upstream_base);
    config.notifier.webhook_url = format!("{}/chat", upstream_base);
    config
}

/// Spawn the relay for the given upstream and wait until its health endpoint answers.
async fn start_relay(upstream_base: &str) -> String {
    let port = free_port();
    let config = relay_config(upstream_base, port);
    tokio::spawn(async move {
        let _ = server::run_server(config).await;
    });

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base)).send().await {
            if resp.status().is_success() {
                return base;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("relay at {} did not come up within 5s", base);
}

#[tokio::test]
async fn health_reports_running() {
    let up = Upstream::new();
    let upstream_base = start_upstream(up).await;
    let base = start_relay(&upstream_base).await;

    let resp = reqwest::get(format!("{}/", base)).await.expect("health request");
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.expect("health json");
    assert_eq!(body.get("runtime").and_then(|v| v.as_str()), Some("running"));
}

#[tokio::test]
async fn rejects_non_post_and_non_json() {
    let up = Upstream::new();
    let upstream_base = start_upstream(up.clone()).await;
    let base = start_relay(&upstream_base).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/hook", base))
        .send()
        .await
        .expect("GET /hook");
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(resp.text().await.expect("body").is_empty());

    let resp = client
        .post(format!("{}/hook", base))
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .expect("POST text/plain");
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(resp.text().await.expect("body").is_empty());

    // rejected requests never reach the tracker or the chat webhook
    assert!(up.recorded("/login").await.is_empty());
    assert!(up.recorded("/cards").await.is_empty());
    assert!(up.recorded("/chat").await.is_empty());
}

#[tokio::test]
async fn bad_json_answers_400_and_logs_parse_error() {
    let up = Upstream::new();
    let upstream_base = start_upstream(up.clone()).await;
    let base = start_relay(&upstream_base).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/hook", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("POST bad json");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // collector posts are awaited before the response, so the parse error is recorded
    let collected = up.recorded("/collect").await;
    assert!(collected.iter().any(|r| r.body.contains("request coming")));
    assert!(collected.iter().any(|r| r.body.contains("line 1")));
    assert!(up.recorded("/login").await.is_empty());
}

#[tokio::test]
async fn end_to_end_creates_card_and_notifies() {
    let up = Upstream::new();
    let upstream_base = start_upstream(up.clone()).await;
    let base = start_relay(&upstream_base).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/hook", base))
        .header("content-type", "application/json")
        .body(r#"{"message":"err","url":"http://x","event":{"title":"Oops"}}"#)
        .send()
        .await
        .expect("POST event");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.expect("body"), "ok");

    // the workflow runs detached; wait for the notification to land
    for _ in 0..100 {
        if !up.recorded("/chat").await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let logins = up.recorded("/login").await;
    assert_eq!(logins.len(), 1);
    let login_body: Value = serde_json::from_str(&logins[0].body).expect("login body");
    assert_eq!(login_body["username"], "bot");

    let cards = up.recorded("/cards").await;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].cookie.as_deref(), Some(SESSION_COOKIE));
    let card_body: Value = serde_json::from_str(&cards[0].body).expect("card body");
    assert_eq!(card_body["name"], "Oops");
    assert_eq!(card_body["desc"], "http://x");

    let chats = up.recorded("/chat").await;
    assert_eq!(chats.len(), 1);
    let chat_body: Value = serde_json::from_str(&chats[0].body).expect("chat body");
    assert_eq!(chat_body["event"]["title"], "#C7 Oops");
    assert_eq!(
        chat_body["url"],
        format!("{}/#/?viewId=whole&vuId=X42", upstream_base)
    );

    let collected = up.recorded("/collect").await;
    assert!(collected.iter().any(|r| r.body.contains("worker work flow start")));
    assert!(collected.iter().any(|r| r.body.contains("card detail")));
}

#[tokio::test]
async fn workflow_proceeds_with_empty_cookie() {
    let mut up = Upstream::new();
    up.login_cookie = None;
    let upstream_base = start_upstream(up.clone()).await;
    let config = relay_config(&upstream_base, free_port());

    let collector = Collector::new(&config.collector.url);
    let tracker = TrackerClient::new(&config);
    let notifier = ChatNotifier::new(&config.notifier.webhook_url, &config.tracker.base_url);
    let event: InboundEvent =
        serde_json::from_str(r#"{"url":"http://x","event":{"title":"Oops"}}"#).expect("event");

    let report = workflow::run_workflow(&collector, &tracker, &notifier, event).await;

    assert_eq!(report.session, SessionOutcome::Empty);
    assert!(matches!(report.card, CardOutcome::Created(_)));
    let cards = up.recorded("/cards").await;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].cookie.as_deref(), Some(""));
}

#[tokio::test]
async fn creation_failure_skips_notification() {
    let mut up = Upstream::new();
    up.card_status = StatusCode::INTERNAL_SERVER_ERROR;
    let upstream_base = start_upstream(up.clone()).await;
    let config = relay_config(&upstream_base, free_port());

    let collector = Collector::new(&config.collector.url);
    let tracker = TrackerClient::new(&config);
    let notifier = ChatNotifier::new(&config.notifier.webhook_url, &config.tracker.base_url);
    let event: InboundEvent =
        serde_json::from_str(r#"{"url":"http://x","event":{"title":"Oops"}}"#).expect("event");

    let report = workflow::run_workflow(&collector, &tracker, &notifier, event).await;

    assert!(matches!(report.card, CardOutcome::Failed(_)));
    assert_eq!(report.notify, NotifyOutcome::Skipped);
    assert!(up.recorded("/chat").await.is_empty());
    let collected = up.recorded("/collect").await;
    assert!(collected.iter().any(|r| r.body.contains("create card error")));
}

#[tokio::test]
async fn session_degrades_to_empty_on_connect_failure() {
    let up = Upstream::new();
    let upstream_base = start_upstream(up).await;

    // tracker base points at a closed port; only the collector is reachable
    let mut config = relay_config(&upstream_base, free_port());
    config.tracker.base_url = "http://127.0.0.1:9".to_string();

    let collector = Collector::new(&config.collector.url);
    let tracker = TrackerClient::new(&config);
    assert_eq!(tracker.session(&collector).await, "");
}
