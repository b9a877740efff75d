//! Item system

pub mod item;
pub mod modifier;
pub mod stats;
pub mod exclusion;
pub mod compat;

pub use item::{Item, BaseItem, Rarity, MAX_AFFIXES};
pub use modifier::{Modifier, ModClass, ModSource, StatRange, UnrevealedModifier};
pub use stats::{StatKind, StatMap, StatEffect, Component, resolve, classify_text};
pub use exclusion::{ExclusionGroup, ExclusionCatalog, PatternMatcher};
pub use compat::{can_add, Compatibility, Rejection, ModifierPool, ModifierChoice};
