use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use muxtunnel_gateway::{Gateway, SessionChangedRouter};
use muxtunnel_mux::{MuxAdapter, SESSION_CHANGED_HOOK};
use muxtunnel_resolver::ProjectResolver;
use muxtunnel_store::{config_dir, OrderStore, SettingsStore};
use muxtunnel_watcher::AssistantWatcher;

/// How long to wait for background tasks to drain on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "muxtunneld", about = "Attention-aware web client for tmux")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3002)]
    port: u16,

    /// Directory of browser UI assets to serve; omit to disable
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Respects RUST_LOG, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let addr = resolve_addr(&cli.host, cli.port).await?;

    let config = config_dir();
    tracing::info!(
        addr = %addr,
        config = %config.display(),
        static_dir = ?cli.static_dir,
        "starting muxtunneld"
    );

    // ---------------------------------------------------------------
    // Construct the component stack
    // ---------------------------------------------------------------
    let settings = Arc::new(SettingsStore::open(config.clone()));
    let order = Arc::new(OrderStore::open(config.join("session-order.json")));
    let resolver = Arc::new(ProjectResolver::init(Arc::clone(&settings), &config).await);
    let watcher = AssistantWatcher::new();
    let mux = MuxAdapter::new();

    let cancel = CancellationToken::new();
    let gateway = Arc::new(Gateway {
        mux: mux.clone(),
        watcher: watcher.clone(),
        resolver,
        settings: Arc::clone(&settings),
        order,
        hooks: SessionChangedRouter::new(),
        static_dir: cli.static_dir,
        cancel: cancel.clone(),
    });

    // ---------------------------------------------------------------
    // Background tasks
    // ---------------------------------------------------------------
    let watcher_handle = {
        let watcher = watcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { watcher.run(cancel).await })
    };
    let settings_handle = {
        let settings = Arc::clone(&settings);
        let cancel = cancel.clone();
        tokio::spawn(async move { settings.watch(cancel).await })
    };

    // Route tmux client-session switches back into our hook endpoint.
    install_session_hook(&mux, &addr).await;

    let server_handle = {
        let gateway = Arc::clone(&gateway);
        tokio::spawn(async move { muxtunnel_gateway::serve(gateway, addr).await })
    };

    // ---------------------------------------------------------------
    // Wait for a shutdown signal, then tear down
    // ---------------------------------------------------------------
    wait_for_shutdown().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();

    // The hook points at this process; leaving it installed would make
    // tmux shell out to a dead endpoint on every session switch.
    if let Err(e) = mux.unset_hook(SESSION_CHANGED_HOOK).await {
        tracing::debug!(error = %e, "failed to uninstall session hook");
    }

    let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = tokio::join!(watcher_handle, settings_handle, server_handle);
    })
    .await;

    tracing::info!("muxtunneld shutdown complete");
    Ok(())
}

/// Resolve host:port, accepting both hostnames and literal addresses.
async fn resolve_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    addrs
        .next()
        .ok_or_else(|| anyhow::anyhow!("host {host:?} did not resolve"))
}

/// Install the tmux hook that reports client-session switches to the
/// gateway's internal endpoint.
async fn install_session_hook(mux: &MuxAdapter, addr: &SocketAddr) {
    let command = format!(
        "run-shell -b \"curl -s 'http://{addr}/api/internal/session-changed?pid=#{{client_pid}}&session=#{{session_name}}' >/dev/null 2>&1 || true\"",
    );
    match mux.set_hook(SESSION_CHANGED_HOOK, &command).await {
        Ok(()) => tracing::info!("installed tmux session-changed hook"),
        Err(e) => tracing::debug!(error = %e, "could not install tmux hook (is tmux running?)"),
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_addresses_resolve_without_dns() {
        let addr = resolve_addr("127.0.0.1", 3002).await.expect("resolve");
        assert_eq!(addr.to_string(), "127.0.0.1:3002");
    }

    #[tokio::test]
    async fn localhost_resolves() {
        let addr = resolve_addr("localhost", 8080).await.expect("resolve");
        assert_eq!(addr.port(), 8080);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn cli_defaults() {
        // Shield the parse from ambient environment overrides.
        for var in ["HOST", "PORT", "STATIC_DIR"] {
            std::env::remove_var(var);
        }
        let cli = Cli::parse_from(["muxtunneld"]);
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 3002);
        assert!(cli.static_dir.is_none());
    }

    #[test]
    fn cli_flags_override() {
        let cli = Cli::parse_from([
            "muxtunneld",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--static-dir",
            "/srv/ui",
        ]);
        assert_eq!(cli.host, "0.0.0.0");
        assert_eq!(cli.port, 9000);
        assert_eq!(cli.static_dir, Some(PathBuf::from("/srv/ui")));
    }
}
