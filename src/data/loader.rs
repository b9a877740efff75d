//! RON data loader
//!
//! Loads catalog data from RON files in the data directory, falling back to
//! the built-in defaults per file.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::bases::{default_bases, BaseCatalog};
use super::exclusions::{default_exclusion_groups, ExclusionDefs};
use super::modifiers::{default_modifiers, ModifierCatalog};
use crate::items::ExclusionCatalog;

pub const BASES_FILE: &str = "bases.ron";
pub const MODIFIERS_FILE: &str = "modifiers.ron";
pub const EXCLUSIONS_FILE: &str = "exclusion_groups.ron";

/// All catalog data the simulator runs on
#[derive(Debug, Clone)]
pub struct DataManager {
    pub bases: BaseCatalog,
    pub modifiers: ModifierCatalog,
    pub exclusions: ExclusionDefs,
}

impl DataManager {
    /// Load everything from `dir`; missing or broken files use defaults
    pub fn load_from_dir(dir: &Path) -> Self {
        let mut modifiers: ModifierCatalog = load_file(dir, MODIFIERS_FILE).unwrap_or_else(default_modifiers);
        modifiers.classify_all();

        let data = Self {
            bases: load_file(dir, BASES_FILE).unwrap_or_else(default_bases),
            modifiers,
            exclusions: load_file(dir, EXCLUSIONS_FILE).unwrap_or_else(default_exclusion_groups),
        };
        log::info!(
            "catalog loaded: {} bases, {} modifiers, {} exclusion groups",
            data.bases.bases.len(),
            data.modifiers.modifiers.len(),
            data.exclusions.groups.len()
        );
        data
    }

    /// Compiled exclusion matchers for the loaded groups
    pub fn exclusion_catalog(&self) -> ExclusionCatalog {
        ExclusionCatalog::new(self.exclusions.groups.clone())
    }
}

impl Default for DataManager {
    fn default() -> Self {
        Self {
            bases: default_bases(),
            modifiers: default_modifiers(),
            exclusions: default_exclusion_groups(),
        }
    }
}

/// Read and parse one RON file, or `None` (with a warning) if it cannot be used
fn load_file<T: DeserializeOwned>(dir: &Path, name: &str) -> Option<T> {
    let path = dir.join(name);
    if !path.exists() {
        log::debug!("{} not found, using defaults", path.display());
        return None;
    }
    match fs::read_to_string(&path) {
        Ok(content) => match ron::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Failed to parse {}: {}. Using defaults.", name, e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read {}: {}. Using defaults.", name, e);
            None
        }
    }
}

fn write_file<T: Serialize>(dir: &Path, name: &str, value: &T) -> anyhow::Result<()> {
    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
        .with_context(|| format!("Failed to serialize {}", name))?;
    fs::write(dir.join(name), text).with_context(|| format!("Failed to write {}", name))?;
    Ok(())
}

/// Export all default data to RON files for easy editing
pub fn export_default_data(dir: &Path) -> anyhow::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    write_file(dir, BASES_FILE, &default_bases())?;
    write_file(dir, MODIFIERS_FILE, &default_modifiers())?;
    write_file(dir, EXCLUSIONS_FILE, &default_exclusion_groups())?;
    log::info!("default data exported to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::items::StatRange;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("craftsim-data-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_export_then_load() {
        let dir = scratch_dir("export");
        let result = export_default_data(&dir);
        assert!(result.is_ok(), "Failed to export default data: {:?}", result.err());

        assert!(dir.join(BASES_FILE).exists(), "bases.ron not created");
        assert!(dir.join(MODIFIERS_FILE).exists(), "modifiers.ron not created");
        assert!(dir.join(EXCLUSIONS_FILE).exists(), "exclusion_groups.ron not created");

        let data = DataManager::load_from_dir(&dir);
        let defaults = DataManager::default();
        assert_eq!(data.bases.bases, defaults.bases.bases);
        assert_eq!(data.modifiers.modifiers, defaults.modifiers.modifiers);
        assert_eq!(data.exclusions.groups, defaults.exclusions.groups);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_uses_defaults() {
        let data = DataManager::load_from_dir(&scratch_dir("missing"));
        assert!(!data.bases.bases.is_empty());
        assert!(!data.modifiers.modifiers.is_empty());
        assert_eq!(data.exclusion_catalog().len(), data.exclusions.groups.len());
    }

    #[test]
    fn test_inverted_ranges_are_swapped_on_load() {
        let dir = scratch_dir("inverted");
        fs::create_dir_all(&dir).unwrap();
        let mut catalog = default_modifiers();
        let first = &mut catalog.modifiers[0].modifier;
        first.ranges = vec![StatRange { min: 10, max: 5 }];
        let name = first.name.clone();
        write_file(&dir, MODIFIERS_FILE, &catalog).unwrap();

        let data = DataManager::load_from_dir(&dir);
        let loaded = data.modifiers.find(&name).unwrap();
        assert_eq!(loaded.ranges, vec![StatRange { min: 5, max: 10 }]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_broken_file_falls_back_per_file() {
        let dir = scratch_dir("broken");
        export_default_data(&dir).unwrap();
        fs::write(dir.join(BASES_FILE), "this is not ron").unwrap();
        fs::write(dir.join(EXCLUSIONS_FILE), "(groups: [])").unwrap();

        let data = DataManager::load_from_dir(&dir);
        assert_eq!(data.bases.bases, default_bases().bases);
        assert!(data.exclusions.groups.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
