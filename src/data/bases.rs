//! Base item catalog
//!
//! The bare bases an item can be crafted from. Loaded from `bases.ron`.

use serde::{Deserialize, Serialize};

use crate::items::{BaseItem, ModClass, Modifier, StatKind, StatMap, StatRange};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseCatalog {
    pub bases: Vec<BaseItem>,
}

impl BaseCatalog {
    /// Find a base by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&BaseItem> {
        self.bases.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a BaseItem> + 'a {
        self.bases.iter().filter(move |b| b.category.eq_ignore_ascii_case(category))
    }

    /// Distinct category tags in catalog order
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for base in &self.bases {
            if !out.contains(&base.category.as_str()) {
                out.push(&base.category);
            }
        }
        out
    }
}

fn base(name: &str, category: &str, level: u8, stats: &[(StatKind, i32)]) -> BaseItem {
    BaseItem {
        name: name.to_string(),
        category: category.to_string(),
        base_stats: stats.iter().copied().collect::<StatMap>(),
        implicits: Vec::new(),
        level,
    }
}

/// Built-in bases used when no data file is present
pub fn default_bases() -> BaseCatalog {
    use StatKind::*;

    let mut ring = base("Iron Ring", "ring", 1, &[]);
    ring.implicits.push(Modifier::new(
        "Iron Ring",
        ModClass::Implicit,
        1,
        "Adds 1 to {} Physical Damage to Attacks",
        vec![StatRange::new(4, 4)],
        "IronRingImplicit",
    ));

    let mut buckler = base("Plain Buckler", "shield", 16, &[(Evasion, 30)]);
    buckler.implicits.push(Modifier::new(
        "Plain Buckler",
        ModClass::Implicit,
        1,
        "{}% increased Evasion Rating",
        vec![StatRange::new(10, 10)],
        "BucklerImplicit",
    ));

    BaseCatalog {
        bases: vec![
            // Body armours
            base("Rusted Cuirass", "body_armour", 1, &[(Armour, 45)]),
            base("Iron Cuirass", "body_armour", 33, &[(Armour, 100)]),
            base("Leather Vest", "body_armour", 1, &[(Evasion, 30)]),
            base("Tattered Robe", "body_armour", 1, &[(EnergyShield, 28)]),
            base("Chain Mail", "body_armour", 28, &[(Armour, 60), (EnergyShield, 22)]),
            base("Scale Mail", "body_armour", 28, &[(Armour, 60), (Evasion, 55)]),
            base("Wayfarer Jacket", "body_armour", 28, &[(Evasion, 55), (EnergyShield, 22)]),
            // Other slots
            base("Iron Greathelm", "helmet", 12, &[(Armour, 30)]),
            buckler,
            ring,
            base("Withered Wand", "wand", 1, &[]),
            base("Bone Wand", "wand", 11, &[]),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_ignores_case() {
        let catalog = default_bases();
        let base = catalog.find("iron cuirass").unwrap();
        assert_eq!(base.base_stats.get(&StatKind::Armour), Some(&100));
        assert!(catalog.find("Gold Ring").is_none());
    }

    #[test]
    fn test_categories_are_distinct() {
        let catalog = default_bases();
        let categories = catalog.categories();
        assert_eq!(categories[0], "body_armour");
        assert!(categories.contains(&"wand"));
        assert_eq!(catalog.by_category("wand").count(), 2);
        assert_eq!(categories.iter().filter(|c| **c == "body_armour").count(), 1);
    }
}
