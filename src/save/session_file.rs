//! Session save/load
//!
//! A crafting session (item, full history and currency counters) is written
//! as pretty JSON into the platform data directory, one file per named slot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crafting::{ActionHistory, CraftingSession};
use crate::items::Item;

/// Save file version for compatibility checking
const SAVE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Invalid save name: {0:?}")]
    InvalidName(String),
    #[error("Cannot save while a crafting request is in flight")]
    Busy,
}

/// Everything needed to resume a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSave {
    pub version: u32,
    pub item: Option<Item>,
    pub history: ActionHistory,
    #[serde(default)]
    pub currency_usage: BTreeMap<String, u32>,
}

impl SessionSave {
    pub fn capture(session: &CraftingSession) -> Result<Self, SaveError> {
        if session.is_busy() {
            return Err(SaveError::Busy);
        }
        Ok(Self {
            version: SAVE_VERSION,
            item: session.item().cloned(),
            history: session.history().clone(),
            currency_usage: session.currency_usage().clone(),
        })
    }

    /// Replace the session's state with this save
    pub fn restore_into(self, session: &mut CraftingSession) {
        session.restore(self.item, self.history, self.currency_usage);
    }
}

/// Brief summary of a save for listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub name: String,
    pub base_name: Option<String>,
    pub steps: usize,
}

/// Get the save directory path
pub fn save_directory(override_dir: Option<&Path>) -> PathBuf {
    use directories::ProjectDirs;

    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    if let Some(proj_dirs) = ProjectDirs::from("com", "craftsim", "Craftsim") {
        let mut path = proj_dirs.data_local_dir().to_path_buf();
        path.push("sessions");
        path
    } else {
        // Fallback to current directory
        PathBuf::from("./sessions")
    }
}

/// Path of a named slot. Names are limited to ASCII letters, digits, `-` and `_`.
pub fn save_path(dir: &Path, name: &str) -> Result<PathBuf, SaveError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(SaveError::InvalidName(name.to_string()));
    }
    Ok(dir.join(format!("{}.json", name)))
}

pub fn save_session(dir: &Path, name: &str, save: &SessionSave) -> Result<PathBuf, SaveError> {
    let path = save_path(dir, name)?;
    fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(save)?;
    fs::write(&path, json)?;
    log::info!("Session saved to {}", path.display());
    Ok(path)
}

pub fn load_session(dir: &Path, name: &str) -> Result<SessionSave, SaveError> {
    let path = save_path(dir, name)?;
    let data = fs::read_to_string(&path)?;
    let save: SessionSave = serde_json::from_str(&data)?;

    if save.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save.version,
        });
    }

    log::info!("Session loaded from {}", path.display());
    Ok(save)
}

pub fn delete_save(dir: &Path, name: &str) -> Result<bool, SaveError> {
    let path = save_path(dir, name)?;
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path)?;
    log::info!("Deleted save {}", name);
    Ok(true)
}

/// Every readable save in `dir`, sorted by name. Unreadable files are skipped.
pub fn list_saves(dir: &Path) -> Vec<SaveSummary> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut saves: Vec<SaveSummary> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                return None;
            }
            let name = path.file_stem()?.to_str()?.to_string();
            match load_session(dir, &name) {
                Ok(save) => Some(SaveSummary {
                    name,
                    base_name: save.item.map(|i| i.base_name),
                    steps: save.history.len(),
                }),
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();
    saves.sort_by(|a, b| a.name.cmp(&b.name));
    saves
}
