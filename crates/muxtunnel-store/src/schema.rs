//! Single source of truth for every setting.
//!
//! The table below drives three things: the default settings record, the
//! commented `defaults.jsonc` emitted into the config dir on startup, and
//! the set of keys accepted in flat-dot form.

use serde_json::Value;

/// One setting: flat dot-notation key, default as a JSON literal, and a
/// one-line description for `defaults.jsonc`.
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

pub const SETTINGS_SCHEMA: &[SettingDef] = &[
    SettingDef {
        key: "resolver",
        default: r#""projects""#,
        description: "Project resolver strategy: \"projects\" (builtin scan + frecency) or \"zoxide\"",
    },
    SettingDef {
        key: "projects.ignore",
        default: r#"["node_modules", ".git", ".hg", ".svn", "vendor", "target", "dist", "build", ".cache", ".local", ".npm", ".cargo", ".rustup", ".volta", "Library", "Applications", ".Trash", "Music", "Movies", "Pictures", "Downloads", "Documents", "Desktop", "Public", ".docker", ".nvm", ".pyenv", ".rbenv", ".gradle", ".m2", ".sbt"]"#,
        description: "Directory basenames skipped by the builtin project scan",
    },
    SettingDef {
        key: "projects.maxDepth",
        default: "3",
        description: "How many levels below $HOME the project scan descends (minimum 1)",
    },
    SettingDef {
        key: "background.image",
        default: "null",
        description: "Background image path (\"~\" expands to $HOME); null for none",
    },
    SettingDef {
        key: "background.size",
        default: r#""cover""#,
        description: "CSS background-size for the image",
    },
    SettingDef {
        key: "background.opacity",
        default: "0.15",
        description: "Background image opacity, clamped to [0, 1]",
    },
    SettingDef {
        key: "background.filter",
        default: "null",
        description: "CSS filter applied to the background image; null for none",
    },
    SettingDef {
        key: "terminal.fontSize",
        default: "14",
        description: "Terminal font size in pixels",
    },
    SettingDef {
        key: "terminal.fontFamily",
        default: r#""monospace""#,
        description: "Terminal font family",
    },
    SettingDef {
        key: "window.padding",
        default: "0",
        description: "Padding around the terminal view in pixels (minimum 0)",
    },
];

/// Build the nested default settings value from the schema.
pub fn default_settings_value() -> Value {
    let mut root = serde_json::Map::new();
    for def in SETTINGS_SCHEMA {
        let value: Value = serde_json::from_str(def.default)
            .unwrap_or_else(|_| panic!("invalid default JSON for {}", def.key));
        insert_dotted(&mut root, def.key, value);
    }
    Value::Object(root)
}

/// Render the commented defaults file. Documentation only; the store never
/// reads it back.
pub fn render_defaults_jsonc() -> String {
    let mut out = String::from(
        "// MuxTunnel default settings.\n\
         // This file is regenerated on every startup. To override a value,\n\
         // put it in settings.json next to this file (nested or flat-dot keys).\n\
         {\n",
    );
    for (i, def) in SETTINGS_SCHEMA.iter().enumerate() {
        out.push_str(&format!("  // {}\n", def.description));
        out.push_str(&format!("  \"{}\": {}", def.key, def.default));
        if i + 1 < SETTINGS_SCHEMA.len() {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str("}\n");
    out
}

/// Insert `value` at a dot-separated key path, creating intermediate objects.
pub(crate) fn insert_dotted(root: &mut serde_json::Map<String, Value>, key: &str, value: Value) {
    let mut target = root;
    let parts: Vec<&str> = key.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            target.insert((*part).to_string(), value);
            return;
        }
        let entry = target
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        target = match entry.as_object_mut() {
            Some(obj) => obj,
            // A scalar already sits where a section should be; the scalar
            // wins and the rest of the path is dropped.
            None => return,
        };
    }
}
