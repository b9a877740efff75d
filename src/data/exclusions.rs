//! Exclusion group definitions
//!
//! Loaded from `exclusion_groups.ron`. Patterns use `{}` (or any number)
//! where the modifier text has a rolled value.

use serde::{Deserialize, Serialize};

use crate::items::ExclusionGroup;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExclusionDefs {
    pub groups: Vec<ExclusionGroup>,
}

fn group(id: &str, description: &str, patterns: &[&str], applicable: &[&str]) -> ExclusionGroup {
    ExclusionGroup {
        id: id.to_string(),
        description: description.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        applicable: applicable.iter().map(|c| c.to_string()).collect(),
    }
}

pub fn default_exclusion_groups() -> ExclusionDefs {
    ExclusionDefs {
        groups: vec![
            group(
                "g1",
                "Fire skill levels",
                &["+{} to Level of all Fire Skills", "+{} to Level of all Fire Spell Skills"],
                &["wand"],
            ),
            group(
                "g2",
                "Cold skill levels",
                &["+{} to Level of all Cold Skills", "+{} to Level of all Cold Spell Skills"],
                &["wand"],
            ),
            group(
                "g3",
                "Local defence hybrids",
                &["+{} to Armour\n{}% increased Armour", "{}% increased Armour\n+{} to maximum Life"],
                &["body_armour", "helmet"],
            ),
        ],
    }
}
