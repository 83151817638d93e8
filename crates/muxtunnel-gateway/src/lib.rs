//! The gateway terminates three boundaries: a JSON RPC surface over HTTP,
//! a bidirectional binary stream over WebSocket, and a small static-asset +
//! hook surface. All of them share one listener.

mod assets;
mod error;
mod hook;
mod rpc;
mod state;
mod stream;

pub use error::ApiError;
pub use hook::SessionChangedRouter;
pub use state::{Gateway, SharedGateway};

use std::net::SocketAddr;

use axum::routing::{delete, get, post};
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tower::ServiceExt as _;
use tower_http::cors::CorsLayer;

/// Build the full application router.
pub fn router(gateway: SharedGateway) -> Router {
    Router::new()
        .route("/api/health", get(rpc::health))
        .route("/api/sessions", get(rpc::sessions_list).post(rpc::sessions_create))
        .route("/api/sessions/:name", delete(rpc::sessions_delete))
        .route("/api/panes/:target", delete(rpc::panes_delete))
        .route("/api/panes/:target/input", post(rpc::panes_input))
        .route("/api/panes/:target/interrupt", post(rpc::panes_interrupt))
        .route("/api/projects", get(rpc::projects_list))
        .route("/api/projects/resolve/:name", get(rpc::projects_resolve))
        .route("/api/claude-sessions/:id/viewed", post(rpc::claude_mark_viewed))
        .route(
            "/api/session-order",
            get(rpc::session_order_get).put(rpc::session_order_save),
        )
        .route("/api/settings", get(rpc::settings_get))
        .route("/api/settings/background", get(assets::background))
        .route("/api/internal/session-changed", get(hook::session_changed))
        .route("/ws", get(stream::ws_handler))
        .fallback(assets::static_fallback)
        .layer(CorsLayer::permissive())
        .with_state(gateway)
}

/// Serve the router until the gateway's cancellation token fires.
///
/// Connections are accepted by hand so Nagle can be disabled per socket;
/// each one is handed to hyper with upgrade support for the WebSocket path.
pub async fn serve(gateway: SharedGateway, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(gateway.clone());
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "gateway listening");

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!(error = %e, "tcp accept failed");
                        continue;
                    }
                };

                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(peer = %peer, error = %e, "failed to disable nagle");
                }

                let tower_service = app.clone();
                tokio::spawn(async move {
                    let socket = TokioIo::new(stream);
                    let hyper_service =
                        hyper::service::service_fn(move |request: Request<Incoming>| {
                            tower_service.clone().oneshot(request)
                        });

                    if let Err(e) = hyper::server::conn::http1::Builder::new()
                        .serve_connection(socket, hyper_service)
                        .with_upgrades()
                        .await
                    {
                        tracing::debug!(peer = %peer, error = %e, "connection ended with error");
                    }
                });
            }
            _ = gateway.cancel.cancelled() => {
                tracing::info!("gateway: cancellation requested, shutting down");
                return Ok(());
            }
        }
    }
}
