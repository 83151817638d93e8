//! The JSON RPC surface under `/api`.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use muxtunnel_mux::Session;
use muxtunnel_resolver::ProjectEntry;
use muxtunnel_store::SettingsResponse;
use muxtunnel_watcher::{AssistantLink, SessionStatus};

use crate::error::ApiError;
use crate::state::SharedGateway;

/// Resolved command that marks a pane as running the assistant.
const ASSISTANT_BINARY: &str = "claude";

/// Path segments the SPA router owns; session names must not shadow them.
const RESERVED_NAMES: &[&str] = &["api", "ws"];

/// `GET /api/health`
pub async fn health(State(gateway): State<SharedGateway>) -> Json<Value> {
    let tmux_running = gateway.mux.is_running().await;
    Json(json!({ "status": "ok", "tmuxRunning": tmux_running }))
}

/// `GET /api/sessions` — snapshot enriched with dimensions, assistant links,
/// and the saved sidebar order.
pub async fn sessions_list(
    State(gateway): State<SharedGateway>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let mut sessions = gateway.mux.snapshot().await;
    enrich_assistant_panes(&gateway, &mut sessions).await;
    let ordered = gateway.order.apply(sessions, |s| s.name.as_str());
    Ok(Json(ordered))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    name: String,
    cwd: String,
}

/// `POST /api/sessions`
pub async fn sessions_create(
    State(gateway): State<SharedGateway>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<Value>, ApiError> {
    if !valid_session_name(&body.name) {
        return Err(ApiError::bad_request(format!(
            "invalid session name: {:?}",
            body.name
        )));
    }

    gateway.mux.create_session(&body.name, &body.cwd).await?;
    gateway.resolver.record_selection(&body.cwd);
    Ok(Json(json!({})))
}

/// `DELETE /api/sessions/{name}`
pub async fn sessions_delete(
    State(gateway): State<SharedGateway>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    gateway.mux.kill_session(&name).await?;
    Ok(Json(json!({})))
}

/// `DELETE /api/panes/{target}`
pub async fn panes_delete(
    State(gateway): State<SharedGateway>,
    Path(target): Path<String>,
) -> Result<Json<Value>, ApiError> {
    gateway.mux.kill_pane(&target).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct PaneInputBody {
    text: String,
}

/// `POST /api/panes/{target}/input` — literal text followed by Enter.
pub async fn panes_input(
    State(gateway): State<SharedGateway>,
    Path(target): Path<String>,
    Json(body): Json<PaneInputBody>,
) -> Result<Json<Value>, ApiError> {
    gateway.mux.send_keys(&target, &body.text).await?;
    Ok(Json(json!({})))
}

/// `POST /api/panes/{target}/interrupt` — `^C`.
pub async fn panes_interrupt(
    State(gateway): State<SharedGateway>,
    Path(target): Path<String>,
) -> Result<Json<Value>, ApiError> {
    gateway.mux.send_interrupt(&target).await?;
    Ok(Json(json!({})))
}

#[derive(Debug, Deserialize)]
pub struct ProjectsQuery {
    #[serde(default)]
    q: String,
}

/// `GET /api/projects?q=`
pub async fn projects_list(
    State(gateway): State<SharedGateway>,
    Query(query): Query<ProjectsQuery>,
) -> Json<Vec<ProjectEntry>> {
    Json(gateway.resolver.list(&query.q).await)
}

/// `GET /api/projects/resolve/{name}`
pub async fn projects_resolve(
    State(gateway): State<SharedGateway>,
    Path(name): Path<String>,
) -> Result<Json<ProjectEntry>, ApiError> {
    gateway
        .resolver
        .resolve_one(&name)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no project matches {name:?}")))
}

/// `POST /api/claude-sessions/{id}/viewed`
pub async fn claude_mark_viewed(
    State(gateway): State<SharedGateway>,
    Path(id): Path<String>,
) -> Json<Value> {
    gateway.watcher.mark_viewed(&id);
    Json(json!({}))
}

/// `GET /api/session-order`
pub async fn session_order_get(State(gateway): State<SharedGateway>) -> Json<Vec<String>> {
    Json(gateway.order.get())
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    order: Vec<String>,
}

/// `PUT /api/session-order`
pub async fn session_order_save(
    State(gateway): State<SharedGateway>,
    Json(body): Json<OrderBody>,
) -> Json<Value> {
    gateway.order.save(body.order);
    Json(json!({}))
}

/// `GET /api/settings`
pub async fn settings_get(State(gateway): State<SharedGateway>) -> Json<SettingsResponse> {
    Json(gateway.settings.get())
}

// ---------------------------------------------------------------------------
// Assistant enrichment
// ---------------------------------------------------------------------------

/// Attach assistant links to every pane running the assistant binary.
/// Lookups across panes run in parallel; the watcher stays authoritative
/// for the notification latch, while a live thinking-glyph sniff may
/// override only the displayed status.
async fn enrich_assistant_panes(gateway: &SharedGateway, sessions: &mut [Session]) {
    let mut indices = Vec::new();
    let mut lookups = Vec::new();

    for (si, session) in sessions.iter().enumerate() {
        for (wi, window) in session.windows.iter().enumerate() {
            for (pi, pane) in window.panes.iter().enumerate() {
                if pane.process == ASSISTANT_BINARY {
                    indices.push((si, wi, pi));
                    lookups.push(lookup_link(gateway.clone(), pane.target.clone()));
                }
            }
        }
    }

    let links = futures_util::future::join_all(lookups).await;
    for ((si, wi, pi), link) in indices.into_iter().zip(links) {
        sessions[si].windows[wi].panes[pi].claude_session = link;
    }
}

async fn lookup_link(gateway: SharedGateway, target: String) -> Option<AssistantLink> {
    let cwd = gateway.mux.pane_cwd(&target).await?;

    // Transcript reads touch the filesystem; keep them off the event loop.
    let watcher = gateway.watcher.clone();
    let mut link = tokio::task::spawn_blocking(move || watcher.active_session(&cwd))
        .await
        .ok()
        .flatten()?;

    if gateway.mux.is_pane_thinking(&target).await {
        link.status = SessionStatus::Thinking;
    }
    Some(link)
}

/// Session names become URL path segments and tmux targets; keep them to
/// one clean segment.
fn valid_session_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '?', '#'])
        && !RESERVED_NAMES.contains(&name)
}
