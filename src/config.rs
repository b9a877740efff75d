//! Runtime configuration
//!
//! Read from `craftsim.ron` in the working directory. Every field has a
//! default, so a partial file is fine and a missing file is not an error.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "craftsim.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding bases.ron, modifiers.ron and exclusion_groups.ron
    pub data_dir: PathBuf,
    /// How long a crafting request may stay in flight
    pub request_timeout_ms: u64,
    /// Omen that allows one reroll of reveal choices
    pub reroll_omen: String,
    /// Seed for the offline service; random when unset
    pub rng_seed: Option<u64>,
    /// Overrides the platform data directory for session saves
    pub save_dir: Option<PathBuf>,
    /// Item level given to freshly selected bases
    pub default_item_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("assets/data"),
            request_timeout_ms: 10_000,
            reroll_omen: "Omen of Abyssal Echoes".to_string(),
            rng_seed: None,
            save_dir: None,
            default_item_level: 82,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = ron::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, then apply environment overrides.
    /// Problems are logged and the defaults used instead.
    pub fn load_or_default(path: &Path) -> Self {
        let mut config = if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                log::warn!("Failed to load {}: {}. Using defaults.", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// Environment variables:
    /// - `CRAFTSIM_DATA_DIR`
    /// - `CRAFTSIM_SEED`
    /// - `CRAFTSIM_TIMEOUT_MS`
    pub fn apply_env(&mut self) {
        if let Ok(dir) = env::var("CRAFTSIM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(seed) = read_env::<u64>("CRAFTSIM_SEED") {
            self.rng_seed = Some(seed);
        }
        if let Some(ms) = read_env::<u64>("CRAFTSIM_TIMEOUT_MS") {
            self.request_timeout_ms = ms.max(1);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".to_string()));
        }
        if !(1..=100).contains(&self.default_item_level) {
            return Err(ConfigError::Invalid(format!(
                "default_item_level {} outside 1-100",
                self.default_item_level
            )));
        }
        if self.reroll_omen.trim().is_empty() {
            return Err(ConfigError::Invalid("reroll_omen is empty".to_string()));
        }
        Ok(())
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok()?.parse().ok()
}
