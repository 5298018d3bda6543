//! Persistent key/value storage for the user's overlay state.
//!
//! Values are kept as strings under fixed keys, the same way a browser's
//! `localStorage` would hold them, and the whole map is written to a single
//! JSON file in the user's configuration directory.

use crate::config::APP_DIR;
use crate::{Day, WorkoutRow};
use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub const DARK_MODE_KEY: &str = "darkMode";
pub const COMPLETED_KEY: &str = "completed";
pub const EDITS_KEY: &str = "edits";

/// Completion ids of the form `"{Day}-{index}"`.
pub type CompletedSet = BTreeSet<String>;

/// Locally added workouts, in insertion order, per day.
pub type EditsByDay = BTreeMap<Day, Vec<WorkoutRow>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub dark: bool,
}

pub struct PreferenceStore {
    path: Option<PathBuf>,
    items: BTreeMap<String, String>,
}

impl PreferenceStore {
    const FILE: &'static str = "storage.json";

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(Self::FILE))
    }

    /// Open the store in the user's configuration directory.
    pub fn open_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::open(path),
            None => {
                log::warn!("No configuration directory available; progress will not be saved");
                Self {
                    path: None,
                    items: BTreeMap::new(),
                }
            }
        }
    }

    /// Open the store backed by `path`. A missing or unreadable file is
    /// treated as an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring corrupt storage file {}: {e}", path.display());
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("Failed to read storage file {}: {e}", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path),
            items,
        }
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set_item(&mut self, key: &str, value: String) {
        self.items.insert(key.to_string(), value);
    }

    fn flush(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.items)?;
        std::fs::write(path, data)
    }

    /// Parse the persisted state. Every key falls back to its default on its
    /// own, so one corrupt value does not discard the others.
    pub fn load(&self) -> (Preferences, CompletedSet, EditsByDay) {
        let prefs = Preferences {
            dark: self.get_item(DARK_MODE_KEY) == Some("true"),
        };
        let completed = self.parse_item(COMPLETED_KEY).unwrap_or_default();
        let edits = self.parse_item(EDITS_KEY).unwrap_or_default();
        (prefs, completed, edits)
    }

    fn parse_item<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_item(key)?;
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Discarding malformed `{key}` value: {e}");
                None
            }
        }
    }

    /// Write all three values and flush the store to disk.
    pub fn save(&mut self, prefs: &Preferences, completed: &CompletedSet, edits: &EditsByDay) {
        self.set_item(DARK_MODE_KEY, prefs.dark.to_string());
        match serde_json::to_string(completed) {
            Ok(v) => self.set_item(COMPLETED_KEY, v),
            Err(e) => log::error!("Failed to serialize completed workouts: {e}"),
        }
        match serde_json::to_string(edits) {
            Ok(v) => self.set_item(EDITS_KEY, v),
            Err(e) => log::error!("Failed to serialize custom workouts: {e}"),
        }
        if let Err(e) = self.flush() {
            log::error!("Failed to save progress: {e}");
        }
    }
}
