//! The `/ws` stream surface: one PTY per WebSocket client.
//!
//! Framing: binary frames carry PTY bytes verbatim in both directions; text
//! frames carry JSON control messages. The `pane-info` frame is always sent
//! before the first data byte, and control frames are interleaved between
//! data chunks, never inside one.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use muxtunnel_pty::{PtyClient, PtyEvent};

use crate::state::SharedGateway;

/// Ping cadence; a peer that misses one full interval is terminated.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

const CLOSE_NORMAL: u16 = 1000;
/// Permanent close codes (>= 4000): the client must not auto-reconnect.
const CLOSE_PANE_NOT_FOUND: u16 = 4001;
const CLOSE_SPAWN_FAILED: u16 = 4002;

/// Monotonic stream-client id, for log correlation only.
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn default_cols() -> u16 {
    80
}

fn default_rows() -> u16 {
    24
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pane: String,
    #[serde(default = "default_cols")]
    cols: u16,
    #[serde(default = "default_rows")]
    rows: u16,
}

/// `GET /ws?pane=<target>&cols=<n>&rows=<n>`
pub async fn ws_handler(
    State(gateway): State<SharedGateway>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_stream(socket, gateway, query))
}

async fn handle_stream(socket: WebSocket, gateway: SharedGateway, query: StreamQuery) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    let (mut ws_tx, mut ws_rx) = socket.split();

    tracing::debug!(
        client_id,
        pane = %query.pane,
        cols = query.cols,
        rows = query.rows,
        "stream client connected"
    );

    // 1. The pane must exist before anything is spawned.
    let Some(pane) = gateway.mux.pane_info(&query.pane).await else {
        tracing::debug!(client_id, pane = %query.pane, "pane not found, rejecting stream");
        close_with(&mut ws_tx, CLOSE_PANE_NOT_FOUND, "Pane not found").await;
        return;
    };

    // 2. pane-info is guaranteed to precede the first data byte.
    let info_frame = serde_json::json!({ "type": "pane-info", "pane": pane }).to_string();
    if ws_tx.send(Message::Text(info_frame)).await.is_err() {
        return;
    }

    // 3. Attach a PTY at the client's size.
    let (pty, pty_rx) = match PtyClient::open(&query.pane, query.cols, query.rows).await {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(client_id, pane = %query.pane, error = %e, "pty open failed");
            close_with(&mut ws_tx, CLOSE_SPAWN_FAILED, "Failed to attach to pane").await;
            return;
        }
    };

    // 4. Register for session-changed hook routing by child PID.
    let (ctrl_tx, ctrl_rx) = mpsc::unbounded_channel();
    if let Some(pid) = pty.child_pid() {
        gateway.hooks.register(pid, ctrl_tx);
    }

    pump(client_id, &gateway, &pty, pty_rx, ctrl_rx, &mut ws_tx, &mut ws_rx).await;

    if let Some(pid) = pty.child_pid() {
        gateway.hooks.unregister(pid);
    }
    pty.close().await;
    tracing::debug!(client_id, pane = %query.pane, "stream client closed");
}

/// The per-client event loop: PTY bytes out, frames in, heartbeat, control
/// frames, cancellation. Inbound frames are processed strictly in arrival
/// order; outbound bytes keep PTY read order.
async fn pump(
    client_id: u64,
    gateway: &SharedGateway,
    pty: &PtyClient,
    mut pty_rx: mpsc::Receiver<PtyEvent>,
    mut ctrl_rx: mpsc::UnboundedReceiver<String>,
    ws_tx: &mut SplitSink<WebSocket, Message>,
    ws_rx: &mut SplitStream<WebSocket>,
) {
    let mut heartbeat = tokio::time::interval_at(
        tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
        HEARTBEAT_INTERVAL,
    );
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            event = pty_rx.recv() => {
                match event {
                    Some(PtyEvent::Data(bytes)) => {
                        if ws_tx.send(Message::Binary(bytes)).await.is_err() {
                            return;
                        }
                    }
                    Some(PtyEvent::Exit { code }) => {
                        tracing::debug!(client_id, code = ?code, "pty child exited");
                        close_with(ws_tx, CLOSE_NORMAL, "pane session ended").await;
                        return;
                    }
                    Some(PtyEvent::Error(message)) => {
                        tracing::warn!(client_id, error = %message, "pty read error");
                        close_with(ws_tx, CLOSE_NORMAL, "pty error").await;
                        return;
                    }
                    None => return,
                }
            }

            frame = ctrl_rx.recv() => {
                match frame {
                    Some(text) => {
                        if ws_tx.send(Message::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    // The sender lives for the whole stream; a closed
                    // channel means teardown is underway.
                    None => return,
                }
            }

            message = ws_rx.next() => {
                let message = match message {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        tracing::debug!(client_id, error = %e, "ws read error");
                        return;
                    }
                    None => return,
                };

                match message {
                    Message::Text(text) => {
                        if let Err(e) = handle_client_text(pty, &text).await {
                            tracing::debug!(client_id, error = %e, "client input failed");
                        }
                    }
                    Message::Binary(bytes) => {
                        if let Err(e) = pty.write(&bytes).await {
                            tracing::debug!(client_id, error = %e, "client input failed");
                        }
                    }
                    Message::Pong(_) => {
                        awaiting_pong = false;
                    }
                    Message::Close(_) => {
                        tracing::debug!(client_id, "client sent close frame");
                        return;
                    }
                    // Pings are answered by the websocket layer.
                    Message::Ping(_) => {}
                }
            }

            _ = heartbeat.tick() => {
                if awaiting_pong {
                    tracing::debug!(client_id, "heartbeat missed, terminating client");
                    return;
                }
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    return;
                }
                awaiting_pong = true;
            }

            _ = gateway.cancel.cancelled() => {
                close_with(ws_tx, CLOSE_NORMAL, "server shutting down").await;
                return;
            }
        }
    }
}

/// Demultiplex one inbound text frame: recognized control messages act on
/// the PTY; anything else is forwarded as raw input.
async fn handle_client_text(pty: &PtyClient, text: &str) -> Result<(), muxtunnel_pty::PtyError> {
    let parsed: Result<serde_json::Value, _> = serde_json::from_str(text);

    if let Ok(value) = parsed {
        match value.get("type").and_then(|t| t.as_str()) {
            Some("resize") => {
                let cols = value.get("cols").and_then(|v| v.as_u64()).unwrap_or(80) as u16;
                let rows = value.get("rows").and_then(|v| v.as_u64()).unwrap_or(24) as u16;
                return pty.resize(cols, rows).await;
            }
            Some("keys") => {
                if let Some(keys) = value.get("keys").and_then(|v| v.as_str()) {
                    return pty.write(keys.as_bytes()).await;
                }
                return Ok(());
            }
            _ => {}
        }
    }

    // Unrecognized text is raw input.
    pty.write(text.as_bytes()).await
}

async fn close_with(ws_tx: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    let _ = ws_tx.send(Message::Close(Some(frame))).await;
    let _ = ws_tx.flush().await;
}
