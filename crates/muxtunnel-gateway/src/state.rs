//! Shared gateway state: one struct holding every component handle,
//! constructed at startup and torn down with the process.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use muxtunnel_mux::MuxAdapter;
use muxtunnel_resolver::ProjectResolver;
use muxtunnel_store::{OrderStore, SettingsStore};
use muxtunnel_watcher::AssistantWatcher;

use crate::hook::SessionChangedRouter;

pub struct Gateway {
    pub mux: MuxAdapter,
    pub watcher: AssistantWatcher,
    pub resolver: Arc<ProjectResolver>,
    pub settings: Arc<SettingsStore>,
    pub order: Arc<OrderStore>,
    pub hooks: SessionChangedRouter,
    /// Root for static file serving; `None` disables the static surface.
    pub static_dir: Option<PathBuf>,
    pub cancel: CancellationToken,
}

pub type SharedGateway = Arc<Gateway>;
