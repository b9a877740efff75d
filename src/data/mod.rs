//! Catalog data
//!
//! Base items, modifier definitions and exclusion groups, loaded from
//! external RON files so the catalog can be edited without rebuilding.

pub mod bases;
pub mod exclusions;
pub mod loader;
pub mod modifiers;

pub use bases::BaseCatalog;
pub use exclusions::ExclusionDefs;
pub use loader::{export_default_data, DataManager};
pub use modifiers::{ModifierCatalog, ModifierDef};
