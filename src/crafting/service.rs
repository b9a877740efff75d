//! External service interfaces
//!
//! The crafting engine executes nothing itself: currencies are applied and
//! unrevealed modifiers resolved by a collaborator behind these traits.
//! Requests carry the full current item; responses carry a full replacement
//! item or a message. Randomness differs per call.

use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use crate::items::{ExclusionGroup, Item, Modifier, ModifierPool};

/// Result of applying a currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftResponse {
    pub success: bool,
    #[serde(default)]
    pub result_item: Option<Item>,
    #[serde(default)]
    pub message: String,
}

impl CraftResponse {
    pub fn ok(item: Item, message: impl Into<String>) -> Self {
        Self { success: true, result_item: Some(item), message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, result_item: None, message: message.into() }
    }
}

/// Candidate modifiers for an unrevealed placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealResponse {
    pub choices: Vec<Modifier>,
    /// The enhancing omen is active, allowing one reroll
    #[serde(default)]
    pub has_reroll_omen: bool,
}

/// Executes crafting operations
pub trait CraftingService {
    fn simulate_crafting_with_omens(
        &self,
        item: &Item,
        currency: &str,
        omens: &[String],
    ) -> Result<CraftResponse, ServiceError>;

    fn simulate_crafting(&self, item: &Item, currency: &str) -> Result<CraftResponse, ServiceError> {
        self.simulate_crafting_with_omens(item, currency, &[])
    }

    fn reveal_modifier(
        &self,
        unrevealed_id: &str,
        item: &Item,
        omens: &[String],
    ) -> Result<RevealResponse, ServiceError>;
}

/// Supplies catalog data for an item
pub trait CatalogService {
    fn available_modifiers(&self, item: &Item) -> Result<ModifierPool, ServiceError>;

    fn exclusion_groups(&self) -> Result<Vec<ExclusionGroup>, ServiceError>;

    fn available_currencies(&self, item: &Item) -> Result<Vec<String>, ServiceError>;
}
