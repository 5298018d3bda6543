use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory under the user's config dir holding all application files.
pub const APP_DIR: &str = "weekly_workout_tracker";

const READ_URL_ENV: &str = "WORKOUT_SHEET_READ_URL";

const DEFAULT_READ_ENDPOINT: &str =
    "https://gsx2json.com/api?id=19HocMTEu0Sf1QTj-bRzA84o9sTUaSyKg8hIry8AT1L8&sheet=Sheet1";
const DEFAULT_EDIT_ENDPOINT: &str = "https://script.google.com/macros/s/AKfycbzt0WU6KPVlF6LIXCKO57dUse5-Er_m-yBch-C5nChqwb2hlERhSzULjG3_O0--RUSF/exec";

/// Endpoints and behaviour options loaded from `config.json`.
///
/// Every field has a default, so a partial file from an older version still
/// loads. An empty write endpoint disables that kind of remote write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub read_endpoint: String,
    pub create_endpoint: String,
    pub edit_endpoint: String,
    /// Request timeout in seconds. Zero waits indefinitely.
    pub timeout_secs: u64,
    pub confirm_reset_all: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_endpoint: DEFAULT_READ_ENDPOINT.to_string(),
            create_endpoint: String::new(),
            edit_endpoint: DEFAULT_EDIT_ENDPOINT.to_string(),
            timeout_secs: 30,
            confirm_reset_all: true,
        }
    }
}

impl Config {
    const FILE: &'static str = "config.json";

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(Self::FILE))
    }

    /// Load the configuration file, writing the defaults on first run.
    ///
    /// The `WORKOUT_SHEET_READ_URL` environment variable takes precedence over
    /// the configured read endpoint.
    pub fn load() -> Self {
        let mut cfg = match Self::path() {
            Some(path) if path.exists() => std::fs::read_to_string(&path)
                .ok()
                .and_then(|data| match serde_json::from_str(&data) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        log::warn!("Invalid config file {}: {e}", path.display());
                        None
                    }
                })
                .unwrap_or_default(),
            _ => {
                let cfg = Self::default();
                cfg.save();
                cfg
            }
        };
        cfg.read_endpoint = resolve_read_endpoint(&cfg.read_endpoint);
        cfg
    }

    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(data) = serde_json::to_string_pretty(self) {
                if let Err(e) = std::fs::write(&path, data) {
                    log::error!("Failed to write config {}: {e}", path.display());
                }
            }
        }
    }
}

pub fn resolve_read_endpoint(configured: &str) -> String {
    std::env::var(READ_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| configured.to_string())
}
