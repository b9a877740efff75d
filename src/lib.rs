//! Craftsim - item crafting state engine
//!
//! Tracks an item through a crafting session: derived defence stats,
//! affix compatibility, and an undo/redo/retry history over the crafts
//! applied by an external crafting service.

pub mod config;
pub mod crafting;
pub mod data;
pub mod items;
pub mod save;
pub mod shell;

// Re-export commonly used types
pub use config::Config;
pub use crafting::{Command, CraftError, CraftingService, CraftingSession, OfflineService};
pub use data::DataManager;
pub use items::{Item, Modifier, Rarity};
