//! Persistent user state: versioned hot-reloadable settings and the
//! sidebar session order.
//!
//! Everything lives in `~/.muxtunnel/` as small JSON files; writes are
//! whole-file rewrites and read errors always degrade to defaults.

mod order;
mod paths;
mod schema;
mod settings;

pub use order::OrderStore;
pub use paths::config_dir;
pub use schema::{default_settings_value, render_defaults_jsonc, SettingDef, SETTINGS_SCHEMA};
pub use settings::{
    BackgroundSettings, ProjectsSettings, Settings, SettingsResponse, SettingsStore,
    TerminalSettings, WindowSettings,
};
