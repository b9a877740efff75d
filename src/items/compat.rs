//! Modifier compatibility
//!
//! Decides whether a candidate modifier may be placed on an item, and
//! annotates catalog choices so incompatible ones can be greyed out before
//! the operator commits to an operation.

use serde::{Deserialize, Serialize};

use super::exclusion::ExclusionCatalog;
use super::item::{Item, MAX_AFFIXES};
use super::modifier::{ModClass, Modifier};

/// Why a modifier cannot be added
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("implicit modifiers cannot be placed manually")]
    NotAnAffix,
    #[error("item already has {max} {}es", .class.name())]
    SlotFull { class: ModClass, max: usize },
    #[error("mod group {mod_group} is already present ({existing})")]
    ModGroupTaken { mod_group: String, existing: String },
    #[error("conflicts with {existing} (exclusion group {group})")]
    ExclusionConflict { group: String, existing: String },
}

/// Result of a compatibility check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compatibility {
    Allowed,
    Rejected(Rejection),
}

impl Compatibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Compatibility::Allowed)
    }

    pub fn into_result(self) -> Result<(), Rejection> {
        match self {
            Compatibility::Allowed => Ok(()),
            Compatibility::Rejected(r) => Err(r),
        }
    }
}

/// Check whether `candidate` can join the given affix lists.
///
/// Rules, first failure wins: the target list has room, no existing modifier
/// shares the candidate's mod group, no existing modifier shares its
/// exclusion group (as matched against `catalog` for `category`).
pub fn can_add(
    candidate: &Modifier,
    prefixes: &[Modifier],
    suffixes: &[Modifier],
    catalog: &ExclusionCatalog,
    category: &str,
) -> Compatibility {
    let target = match candidate.class {
        ModClass::Prefix => prefixes,
        ModClass::Suffix => suffixes,
        ModClass::Implicit => return Compatibility::Rejected(Rejection::NotAnAffix),
    };
    if target.len() >= MAX_AFFIXES {
        return Compatibility::Rejected(Rejection::SlotFull { class: candidate.class, max: MAX_AFFIXES });
    }

    let existing = || prefixes.iter().chain(suffixes.iter());

    if let Some(other) = existing().find(|m| m.mod_group == candidate.mod_group) {
        return Compatibility::Rejected(Rejection::ModGroupTaken {
            mod_group: candidate.mod_group.clone(),
            existing: other.name.clone(),
        });
    }

    if let Some(group) = catalog.group_for(candidate, category) {
        if let Some(other) = existing().find(|m| catalog.group_for(m, category) == Some(group)) {
            return Compatibility::Rejected(Rejection::ExclusionConflict {
                group: group.to_string(),
                existing: other.name.clone(),
            });
        }
    }

    Compatibility::Allowed
}

/// Modifiers the catalog offers for an item, grouped by source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifierPool {
    #[serde(default)]
    pub prefixes: Vec<Modifier>,
    #[serde(default)]
    pub suffixes: Vec<Modifier>,
    #[serde(default)]
    pub essence_prefixes: Vec<Modifier>,
    #[serde(default)]
    pub essence_suffixes: Vec<Modifier>,
    #[serde(default)]
    pub desecrated_prefixes: Vec<Modifier>,
    #[serde(default)]
    pub desecrated_suffixes: Vec<Modifier>,
}

/// A catalog modifier with its verdict against the current item
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierChoice {
    pub modifier: Modifier,
    pub verdict: Compatibility,
}

impl ModifierPool {
    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.prefixes
            .iter()
            .chain(&self.suffixes)
            .chain(&self.essence_prefixes)
            .chain(&self.essence_suffixes)
            .chain(&self.desecrated_prefixes)
            .chain(&self.desecrated_suffixes)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Annotate every modifier the item level allows with an exclusion group
    /// and a compatibility verdict.
    pub fn annotate(&self, item: &Item, catalog: &ExclusionCatalog) -> Vec<ModifierChoice> {
        self.iter()
            .filter(|m| m.required_level <= item.item_level)
            .map(|m| {
                let mut modifier = m.clone();
                modifier.exclusion_group = catalog.group_for(&modifier, &item.category).map(str::to_string);
                let verdict = can_add(&modifier, &item.prefixes, &item.suffixes, catalog, &item.category);
                ModifierChoice { modifier, verdict }
            })
            .collect()
    }
}
