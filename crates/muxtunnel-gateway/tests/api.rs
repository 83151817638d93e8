//! Router-level tests for the RPC surface, driven through tower without a
//! live tmux server.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use muxtunnel_gateway::{router, Gateway, SessionChangedRouter, SharedGateway};
use muxtunnel_mux::{MuxAdapter, MuxError, TmuxCommandRunner};
use muxtunnel_resolver::{ProjectResolver, Strategy};
use muxtunnel_store::{OrderStore, SettingsStore};
use muxtunnel_watcher::AssistantWatcher;
use tokio_util::sync::CancellationToken;

const BODY_LIMIT: usize = 1024 * 1024;

/// Scripted tmux: two sessions, one pane running the assistant.
struct FakeTmux;

impl TmuxCommandRunner for FakeTmux {
    fn run(&self, args: &[&str]) -> Result<String, MuxError> {
        match args.first().copied() {
            Some("list-sessions") => Ok("alfa\nbeta\n".into()),
            Some("list-panes") => Ok([
                "beta:0:shell:0:%2:1:80:24:0:0:0:zsh:0:/tmp",
                "alfa:0:dev:0:%1:1:120:40:0:0:0:claude:99:/home/u/acme",
            ]
            .join("\n")),
            Some("display-message") if args.contains(&"#{window_width}:#{window_height}") => {
                Ok("120:40\n".into())
            }
            Some("display-message") if args.contains(&"#{pane_current_path}") => {
                Ok("/home/u/acme\n".into())
            }
            Some("display-message") => {
                Ok("alfa:0:dev:0:%1:1:120:40:0:0:0:claude\n".into())
            }
            Some("capture-pane") => Ok("plain output, no spinner".into()),
            Some("has-session") => Err(MuxError::CommandFailed {
                command: "has-session".into(),
                status: 1,
                stderr: "no session".into(),
            }),
            Some("new-session") | Some("kill-session") | Some("kill-pane")
            | Some("send-keys") => Ok(String::new()),
            _ => Err(MuxError::CommandFailed {
                command: "unknown".into(),
                status: 1,
                stderr: "unexpected".into(),
            }),
        }
    }
}

struct TestEnv {
    _tmp: tempfile::TempDir,
    gateway: SharedGateway,
}

fn env_with_static(static_dir: Option<PathBuf>) -> TestEnv {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("config");

    let settings = Arc::new(SettingsStore::open(config.clone()));
    let order = Arc::new(OrderStore::open(config.join("session-order.json")));
    let resolver = Arc::new(ProjectResolver::with_strategy(
        Strategy::Builtin,
        Arc::clone(&settings),
        &config,
        tmp.path().join("home"),
    ));
    let watcher = AssistantWatcher::with_root(tmp.path().join("transcripts"));

    let gateway = Arc::new(Gateway {
        mux: MuxAdapter::with_runner(Arc::new(FakeTmux)),
        watcher,
        resolver,
        settings,
        order,
        hooks: SessionChangedRouter::new(),
        static_dir,
        cancel: CancellationToken::new(),
    });

    TestEnv { _tmp: tmp, gateway }
}

fn env() -> TestEnv {
    env_with_static(None)
}

/// Seed a transcript so the assistant pane in `/home/u/acme` has a session.
fn seed_transcript(env: &TestEnv, session_id: &str, line: &str) {
    let root = env._tmp.path().join("transcripts");
    let project = root.join(muxtunnel_watcher::project_slug("/home/u/acme"));
    std::fs::create_dir_all(&project).expect("mkdir");
    std::fs::write(project.join(format!("{session_id}.jsonl")), format!("{line}\n"))
        .expect("write");
}

async fn get(env: &TestEnv, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router(env.gateway.clone())
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

async fn send_json(
    env: &TestEnv,
    method: &str,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    let response = router(env.gateway.clone())
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_tmux_state() {
    let env = env();
    let (status, body) = get(&env, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tmuxRunning"], true);
}

#[tokio::test]
async fn sessions_list_returns_enriched_snapshot() {
    let env = env();
    seed_transcript(&env, "abc", r#"{"type":"summary","summary":"shipped"}"#);

    let (status, body) = get(&env, "/api/sessions").await;
    assert_eq!(status, StatusCode::OK);

    let sessions = body.as_array().expect("array");
    assert_eq!(sessions.len(), 2);
    // Server order is name order when nothing is saved.
    assert_eq!(sessions[0]["name"], "alfa");
    assert_eq!(sessions[0]["dimensions"]["width"], 120);

    let pane = &sessions[0]["windows"][0]["panes"][0];
    assert_eq!(pane["process"], "claude");
    assert_eq!(pane["claudeSession"]["sessionId"], "abc");
    assert_eq!(pane["claudeSession"]["status"], "done");
    assert_eq!(pane["claudeSession"]["notified"], true);

    // The shell pane carries no assistant link.
    let shell_pane = &sessions[1]["windows"][0]["panes"][0];
    assert!(shell_pane.get("claudeSession").is_none());
}

#[tokio::test]
async fn mark_viewed_clears_notification_in_next_snapshot() {
    let env = env();
    seed_transcript(&env, "abc", r#"{"type":"summary","summary":"shipped"}"#);

    let (_, body) = get(&env, "/api/sessions").await;
    assert_eq!(body[0]["windows"][0]["panes"][0]["claudeSession"]["notified"], true);

    let (status, _) = send_json(&env, "POST", "/api/claude-sessions/abc/viewed", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&env, "/api/sessions").await;
    assert_eq!(
        body[0]["windows"][0]["panes"][0]["claudeSession"]["notified"],
        false
    );
}

#[tokio::test]
async fn session_order_roundtrip_and_apply() {
    let env = env();

    let (status, _) = send_json(
        &env,
        "PUT",
        "/api/session-order",
        serde_json::json!({ "order": ["beta", "alfa"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, saved) = get(&env, "/api/session-order").await;
    assert_eq!(saved, serde_json::json!(["beta", "alfa"]));

    let (_, sessions) = get(&env, "/api/sessions").await;
    assert_eq!(sessions[0]["name"], "beta");
    assert_eq!(sessions[1]["name"], "alfa");
}

#[tokio::test]
async fn settings_endpoint_returns_versioned_record() {
    let env = env();
    let (status, body) = get(&env, "/api/settings").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], 1);
    assert_eq!(body["settings"]["resolver"], "projects");
    assert_eq!(body["settings"]["terminal"]["fontSize"], 14);
}

#[tokio::test]
async fn resolve_unknown_project_is_404() {
    let env = env();
    let (status, body) = get(&env, "/api/projects/resolve/no-such-project").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().expect("error").contains("no-such-project"));
}

#[tokio::test]
async fn resolve_known_project_creates_session_flow() {
    let env = env();
    // A git project under the scan root.
    let project = env._tmp.path().join("home/code/acme");
    std::fs::create_dir_all(project.join(".git")).expect("mkdir");

    let (status, body) = get(&env, "/api/projects/resolve/acme").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "acme");
    let path = body["path"].as_str().expect("path").to_string();

    let (status, _) = send_json(
        &env,
        "POST",
        "/api/sessions",
        serde_json::json!({ "name": "acme", "cwd": path }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The selection is recorded for future ranking.
    let (_, projects) = get(&env, "/api/projects?q=acme").await;
    assert_eq!(projects[0]["score"], 4.0);
}

#[tokio::test]
async fn create_session_rejects_bad_names() {
    let env = env();
    for name in ["a/b", "api", "", "x?y"] {
        let (status, body) = send_json(
            &env,
            "POST",
            "/api/sessions",
            serde_json::json!({ "name": name, "cwd": "/tmp" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "name {name:?}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn malformed_body_is_4xx() {
    let env = env();
    let request = Request::builder()
        .method("POST")
        .uri("/api/sessions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .expect("request");
    let response = router(env.gateway.clone())
        .oneshot(request)
        .await
        .expect("response");
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn static_files_and_spa_fallback() {
    let tmp_static = tempfile::tempdir().expect("tempdir");
    std::fs::write(tmp_static.path().join("index.html"), b"<html>app</html>").expect("write");
    std::fs::write(tmp_static.path().join("app.js"), b"console.log(1)").expect("write");

    let env = env_with_static(Some(tmp_static.path().to_path_buf()));

    // Real file served with its content type.
    let response = router(env.gateway.clone())
        .oneshot(Request::get("/app.js").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/javascript"
    );

    // Unknown non-dotted path falls back to the SPA entry point.
    let response = router(env.gateway.clone())
        .oneshot(Request::get("/acme").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"<html>app</html>");

    // Dotted unknown paths are plain 404s.
    let response = router(env.gateway.clone())
        .oneshot(Request::get("/missing.png").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn traversal_cannot_escape_static_root() {
    let tmp_static = tempfile::tempdir().expect("tempdir");
    std::fs::write(tmp_static.path().join("index.html"), b"safe").expect("write");

    let env = env_with_static(Some(tmp_static.path().to_path_buf()));

    let response = router(env.gateway.clone())
        .oneshot(
            Request::get("/..%2f..%2fetc%2fpasswd")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    // Whatever the exact response, it must not be the host file.
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    assert!(!String::from_utf8_lossy(&bytes).contains("root:"));
}

#[tokio::test]
async fn hook_endpoint_reports_delivery() {
    let env = env();
    let (status, body) = get(&env, "/api/internal/session-changed?pid=999&session=work").await;
    assert_eq!(status, StatusCode::OK);
    // No stream client owns pid 999.
    assert_eq!(body["delivered"], false);
}

#[tokio::test]
async fn background_without_config_is_404() {
    let env = env();
    let (status, body) = get(&env, "/api/settings/background").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn background_streams_configured_file() {
    let env = env();
    let img = env._tmp.path().join("bg.png");
    std::fs::write(&img, b"\x89PNGDATA").expect("write");
    std::fs::write(
        env._tmp.path().join("config/settings.json"),
        format!(r#"{{"background.image": "{}"}}"#, img.display()),
    )
    .expect("write settings");
    env.gateway.settings.reload();

    let response = router(env.gateway.clone())
        .oneshot(
            Request::get("/api/settings/background")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = axum::body::to_bytes(response.into_body(), BODY_LIMIT)
        .await
        .expect("body");
    assert_eq!(&bytes[..], b"\x89PNGDATA");
}
