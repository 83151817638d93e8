//! The versioned, hot-reloadable settings store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::schema::{self, default_settings_value, render_defaults_jsonc};

const SETTINGS_FILE: &str = "settings.json";
const DEFAULTS_FILE: &str = "defaults.jsonc";

/// Quiet period after a settings.json change before reloading. Editors
/// write in bursts (truncate, write, rename).
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub resolver: String,
    pub projects: ProjectsSettings,
    pub background: BackgroundSettings,
    pub terminal: TerminalSettings,
    pub window: WindowSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsSettings {
    pub ignore: Vec<String>,
    pub max_depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundSettings {
    pub image: Option<String>,
    pub size: String,
    pub opacity: f64,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalSettings {
    pub font_size: u32,
    pub font_family: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSettings {
    pub padding: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    pub version: u64,
}

struct Versioned {
    settings: Settings,
    version: u64,
}

/// Settings store rooted at one config directory.
///
/// `get` hands out clones; consumers compare `version` to detect reloads.
pub struct SettingsStore {
    dir: PathBuf,
    inner: Mutex<Versioned>,
}

impl SettingsStore {
    /// Open the store: create the config dir, write `defaults.jsonc`, and
    /// load the current settings (version starts at 1).
    pub fn open(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create config dir");
        }
        if let Err(e) = std::fs::write(dir.join(DEFAULTS_FILE), render_defaults_jsonc()) {
            tracing::warn!(error = %e, "failed to write defaults.jsonc");
        }

        let settings = load_from(&dir.join(SETTINGS_FILE));
        Self {
            dir,
            inner: Mutex::new(Versioned {
                settings,
                version: 1,
            }),
        }
    }

    pub fn get(&self) -> SettingsResponse {
        let inner = self.inner.lock().unwrap();
        SettingsResponse {
            settings: inner.settings.clone(),
            version: inner.version,
        }
    }

    /// Reload from disk, bumping the version.
    pub fn reload(&self) {
        let settings = load_from(&self.dir.join(SETTINGS_FILE));
        let mut inner = self.inner.lock().unwrap();
        inner.settings = settings;
        inner.version += 1;
        tracing::info!(version = inner.version, "settings reloaded");
    }

    /// Resolve the configured background image to an existing local file.
    /// URLs are not local assets; `~` expands to `$HOME`.
    pub fn background_image_path(&self) -> Option<PathBuf> {
        let image = {
            let inner = self.inner.lock().unwrap();
            inner.settings.background.image.clone()?
        };

        if image.starts_with("http://") || image.starts_with("https://") {
            return None;
        }

        let resolved = if let Some(rest) = image.strip_prefix('~') {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(rest.trim_start_matches('/'))
        } else {
            PathBuf::from(image)
        };

        resolved.is_file().then_some(resolved)
    }

    /// Watch the config dir and reload on settings.json changes, debounced,
    /// until cancelled.
    pub async fn watch(&self, cancel: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(64);

        let mut watcher: RecommendedWatcher = match notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(error = %e, "failed to create settings watcher");
                return;
            }
        };

        if let Err(e) = watcher.watch(&self.dir, RecursiveMode::NonRecursive) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to watch config dir");
            return;
        }

        tracing::info!(dir = %self.dir.display(), "watching settings");

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(Ok(ev)) if touches_settings(&ev) => {
                            // Debounce: wait for a quiet period, restarting
                            // the timer on every further relevant event.
                            loop {
                                tokio::select! {
                                    _ = tokio::time::sleep(RELOAD_DEBOUNCE) => break,
                                    more = rx.recv() => match more {
                                        Some(_) => continue,
                                        None => break,
                                    },
                                    _ = cancel.cancelled() => return,
                                }
                            }
                            self.reload();
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "settings watcher error");
                        }
                        None => {
                            tracing::debug!("settings watch channel closed");
                            return;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("settings watcher: cancellation requested");
                    return;
                }
            }
        }
    }
}

fn touches_settings(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|p| p.file_name().map(|n| n == SETTINGS_FILE).unwrap_or(false))
}

/// Load settings from a user file, merging over schema defaults and
/// clamping. Missing or invalid files yield pure defaults.
fn load_from(path: &Path) -> Settings {
    let defaults = default_settings_value();

    let user = match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(obj)) => expand_dot_keys(&obj),
            Ok(_) => {
                tracing::warn!(path = %path.display(), "settings.json is not an object, using defaults");
                Value::Object(serde_json::Map::new())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings.json parse failed, using defaults");
                Value::Object(serde_json::Map::new())
            }
        },
        Err(_) => Value::Object(serde_json::Map::new()),
    };

    let merged = deep_merge(&defaults, &user);
    let mut settings: Settings = match serde_json::from_value(merged) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "merged settings did not typecheck, using defaults");
            serde_json::from_value(defaults).expect("schema defaults must typecheck")
        }
    };

    clamp(&mut settings);
    settings
}

/// Expand flat dot-notation keys (`"background.opacity": 0.4`) into nested
/// objects. Nested keys pass through unchanged.
fn expand_dot_keys(obj: &serde_json::Map<String, Value>) -> Value {
    let mut result = serde_json::Map::new();
    for (key, value) in obj {
        if key.contains('.') {
            schema::insert_dotted(&mut result, key, value.clone());
        } else {
            result.insert(key.clone(), value.clone());
        }
    }
    Value::Object(result)
}

/// User values override defaults; objects merge recursively.
fn deep_merge(defaults: &Value, user: &Value) -> Value {
    match (defaults, user) {
        (Value::Object(d), Value::Object(u)) => {
            let mut result = d.clone();
            for (key, val) in u {
                match result.get(key) {
                    Some(existing) => {
                        let merged = deep_merge(existing, val);
                        result.insert(key.clone(), merged);
                    }
                    None => {
                        result.insert(key.clone(), val.clone());
                    }
                }
            }
            Value::Object(result)
        }
        (_, user) => user.clone(),
    }
}

fn clamp(settings: &mut Settings) {
    settings.background.opacity = settings.background.opacity.clamp(0.0, 1.0);
    settings.projects.max_depth = settings.projects.max_depth.max(1);
}
