//! Modifier catalog
//!
//! Every modifier definition the offline service can roll, tagged with the
//! item categories it may appear on. Loaded from `modifiers.ron`.

use serde::{Deserialize, Serialize};

use crate::items::{Item, ModClass, ModSource, Modifier, ModifierPool, StatRange};

/// A modifier and where it may spawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierDef {
    pub modifier: Modifier,
    /// Category tags; empty means every category
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ModifierDef {
    pub fn applies_to(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c.eq_ignore_ascii_case(category))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModifierCatalog {
    pub modifiers: Vec<ModifierDef>,
}

impl ModifierCatalog {
    /// Find a definition by name (case-insensitive)
    pub fn find(&self, name: &str) -> Option<&Modifier> {
        self.modifiers
            .iter()
            .map(|d| &d.modifier)
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Modifiers that can spawn on `item`, split the way the catalog
    /// service reports them. Item level is not applied here.
    pub fn pool_for(&self, item: &Item) -> ModifierPool {
        let mut pool = ModifierPool::default();
        for def in self.modifiers.iter().filter(|d| d.applies_to(&item.category)) {
            let list = match (def.modifier.source, def.modifier.class) {
                (ModSource::Normal, ModClass::Prefix) => &mut pool.prefixes,
                (ModSource::Normal, ModClass::Suffix) => &mut pool.suffixes,
                (ModSource::Essence, ModClass::Prefix) => &mut pool.essence_prefixes,
                (ModSource::Essence, ModClass::Suffix) => &mut pool.essence_suffixes,
                (ModSource::Desecrated, ModClass::Prefix) => &mut pool.desecrated_prefixes,
                (ModSource::Desecrated, ModClass::Suffix) => &mut pool.desecrated_suffixes,
                (_, ModClass::Implicit) => continue,
            };
            let mut modifier = def.modifier.clone();
            modifier.classify();
            list.push(modifier);
        }
        pool
    }

    /// Re-derive typed stat effects and fix up inverted ranges after
    /// loading from disk
    pub fn classify_all(&mut self) {
        for def in &mut self.modifiers {
            for range in &mut def.modifier.ranges {
                if range.min > range.max {
                    log::warn!("{}: range {}..{} is inverted, swapping", def.modifier.name, range.min, range.max);
                    *range = range.normalized();
                }
            }
            def.modifier.classify();
        }
    }
}

fn def(modifier: Modifier, categories: &[&str]) -> ModifierDef {
    ModifierDef {
        modifier,
        categories: categories.iter().map(|c| c.to_string()).collect(),
    }
}

fn prefix(name: &str, tier: u8, text: &str, ranges: &[(i32, i32)], group: &str) -> Modifier {
    let ranges = ranges.iter().map(|&(min, max)| StatRange::new(min, max)).collect();
    Modifier::new(name, ModClass::Prefix, tier, text, ranges, group)
}

fn suffix(name: &str, tier: u8, text: &str, ranges: &[(i32, i32)], group: &str) -> Modifier {
    let ranges = ranges.iter().map(|&(min, max)| StatRange::new(min, max)).collect();
    Modifier::new(name, ModClass::Suffix, tier, text, ranges, group)
}

pub fn default_modifiers() -> ModifierCatalog {
    const ARMOUR: &[&str] = &["body_armour", "helmet"];
    const EVASION: &[&str] = &["body_armour", "helmet", "shield"];
    const ES: &[&str] = &["body_armour", "helmet"];
    const WAND: &[&str] = &["wand"];

    ModifierCatalog {
        modifiers: vec![
            // Flat defences
            def(prefix("Lacquered", 3, "+{} to Armour", &[(15, 35)], "LocalArmour").with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Studded", 2, "+{} to Armour", &[(36, 60)], "LocalArmour").with_level(16).with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Ribbed", 1, "+{} to Armour", &[(61, 90)], "LocalArmour").with_level(46).with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Agile", 2, "+{} to Evasion Rating", &[(12, 30)], "LocalEvasion").with_tags(&["defences", "evasion"]), EVASION),
            def(prefix("Dancer's", 1, "+{} to Evasion Rating", &[(31, 60)], "LocalEvasion").with_level(33).with_tags(&["defences", "evasion"]), EVASION),
            def(prefix("Shining", 2, "+{} to maximum Energy Shield", &[(10, 20)], "LocalEnergyShield").with_tags(&["defences", "energy_shield"]), ES),
            def(prefix("Glimmering", 1, "+{} to maximum Energy Shield", &[(21, 35)], "LocalEnergyShield").with_level(33).with_tags(&["defences", "energy_shield"]), ES),
            // Percent defences
            def(prefix("Reinforced", 2, "{}% increased Armour", &[(15, 26)], "LocalArmourPercent").with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Fortified", 1, "{}% increased Armour", &[(27, 42)], "LocalArmourPercent").with_level(33).with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Shade's", 1, "{}% increased Evasion Rating", &[(15, 42)], "LocalEvasionPercent").with_tags(&["defences", "evasion"]), EVASION),
            def(prefix("Protective", 1, "{}% increased Energy Shield", &[(15, 42)], "LocalEnergyShieldPercent").with_tags(&["defences", "energy_shield"]), ES),
            def(prefix("Bulwark", 1, "{}% increased Armour, Evasion and Energy Shield", &[(10, 20)], "LocalAllDefences").with_level(40).with_tags(&["defences"]), ARMOUR),
            // Hybrids
            def(prefix("Beetle's", 2, "+{} to Armour\n{}% increased Armour", &[(20, 32), (6, 13)], "LocalArmourHybrid").with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Crab's", 1, "+{} to Armour\n{}% increased Armour", &[(33, 50), (14, 30)], "LocalArmourHybrid").with_level(30).with_tags(&["defences", "armour"]), ARMOUR),
            def(prefix("Oyster's", 1, "{}% increased Armour\n+{} to maximum Life", &[(6, 13), (10, 20)], "LocalArmourLife").with_tags(&["defences", "armour", "life"]), ARMOUR),
            // Life and resistances
            def(prefix("Hale", 3, "+{} to maximum Life", &[(10, 24)], "IncreasedLife").with_tags(&["life"]), &["body_armour", "helmet", "shield", "ring"]),
            def(prefix("Robust", 1, "+{} to maximum Life", &[(25, 59)], "IncreasedLife").with_level(25).with_tags(&["life"]), &["body_armour", "helmet", "shield", "ring"]),
            def(suffix("of the Whelpling", 2, "+{}% to Fire Resistance", &[(6, 15)], "FireResistance").with_tags(&["elemental", "fire", "resistance"]), &[]),
            def(suffix("of the Salamander", 1, "+{}% to Fire Resistance", &[(16, 30)], "FireResistance").with_level(24).with_tags(&["elemental", "fire", "resistance"]), &[]),
            def(suffix("of the Seal", 1, "+{}% to Cold Resistance", &[(6, 30)], "ColdResistance").with_tags(&["elemental", "cold", "resistance"]), &[]),
            def(suffix("of the Cloud", 1, "+{}% to Lightning Resistance", &[(6, 30)], "LightningResistance").with_tags(&["elemental", "lightning", "resistance"]), &[]),
            def(suffix("of the Brute", 1, "+{} to Strength", &[(5, 25)], "Strength").with_tags(&["attribute"]), &[]),
            def(suffix("of the Fox", 1, "+{} to Dexterity", &[(5, 25)], "Dexterity").with_tags(&["attribute"]), &[]),
            def(suffix("of the Pupil", 1, "+{} to Intelligence", &[(5, 25)], "Intelligence").with_tags(&["attribute"]), &[]),
            // Wands
            def(prefix("Pyromancer's", 1, "+{} to Level of all Fire Skills", &[(1, 2)], "FireSkillLevels").with_tags(&["fire", "gem"]), WAND),
            def(suffix("of Flames", 1, "+{} to Level of all Fire Spell Skills", &[(1, 3)], "FireSpellSkillLevels").with_tags(&["fire", "gem"]), WAND),
            def(prefix("Cryomancer's", 1, "+{} to Level of all Cold Skills", &[(1, 2)], "ColdSkillLevels").with_tags(&["cold", "gem"]), WAND),
            def(suffix("of Ice", 1, "+{} to Level of all Cold Spell Skills", &[(1, 3)], "ColdSpellSkillLevels").with_tags(&["cold", "gem"]), WAND),
            def(prefix("Apprentice's", 2, "{}% increased Spell Damage", &[(25, 44)], "SpellDamage").with_tags(&["caster"]), WAND),
            def(suffix("of Talent", 1, "{}% increased Cast Speed", &[(9, 20)], "CastSpeed").with_tags(&["caster", "speed"]), WAND),
            // Essences
            def(
                prefix("Essence of the Body", 1, "+{} to maximum Life", &[(60, 80)], "IncreasedLife")
                    .with_source(ModSource::Essence)
                    .with_tags(&["life"]),
                &["body_armour", "helmet"],
            ),
            def(
                suffix("Essence of Insulation", 1, "+{}% to Fire Resistance", &[(31, 35)], "FireResistance")
                    .with_source(ModSource::Essence)
                    .with_tags(&["elemental", "fire", "resistance"]),
                &[],
            ),
            // Desecrated
            def(
                prefix("Ulaman's", 1, "{}% increased Armour, Evasion and Energy Shield", &[(20, 30)], "DesecratedDefences")
                    .with_source(ModSource::Desecrated)
                    .with_tags(&["defences", "ulaman"]),
                &["body_armour", "helmet"],
            ),
            def(
                suffix("of Amanamu", 1, "{}% of Damage taken Recouped as Life", &[(10, 20)], "DesecratedRecoup")
                    .with_source(ModSource::Desecrated)
                    .with_tags(&["life", "amanamu"]),
                &[],
            ),
            def(
                suffix("of Kurgal", 1, "+{}% to all Elemental Resistances", &[(8, 14)], "DesecratedAllRes")
                    .with_source(ModSource::Desecrated)
                    .with_tags(&["elemental", "resistance", "kurgal"]),
                &[],
            ),
            def(
                prefix("Kurgal's", 1, "+{} to Armour\n{}% increased Armour", &[(40, 60), (25, 35)], "DesecratedArmourHybrid")
                    .with_source(ModSource::Desecrated)
                    .with_tags(&["defences", "armour", "kurgal"]),
                &["body_armour", "helmet"],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{ExclusionCatalog, Rarity};

    #[test]
    fn test_pool_filters_by_category() {
        let catalog = default_modifiers();
        let wand = Item::new("Withered Wand", "wand");
        let pool = catalog.pool_for(&wand);

        assert!(pool.iter().any(|m| m.mod_group == "FireSkillLevels"));
        assert!(pool.iter().all(|m| m.mod_group != "LocalArmour"));
        assert!(pool.suffixes.iter().any(|m| m.mod_group == "FireResistance"));
    }

    #[test]
    fn test_pool_splits_by_source() {
        let catalog = default_modifiers();
        let item = Item::new("Iron Cuirass", "body_armour");
        let pool = catalog.pool_for(&item);

        assert!(pool.essence_prefixes.iter().all(|m| m.source == ModSource::Essence));
        assert!(!pool.desecrated_prefixes.is_empty());
        assert!(pool.prefixes.iter().all(|m| m.class == ModClass::Prefix && m.source == ModSource::Normal));
    }

    #[test]
    fn test_defaults_are_well_formed() {
        let catalog = default_modifiers();
        for def in &catalog.modifiers {
            let m = &def.modifier;
            let placeholders = m.text.matches("{}").count();
            assert_eq!(placeholders, m.ranges.len(), "{} has mismatched ranges", m.name);
            assert!(m.values_in_range(), "{} starts out of range", m.name);
        }
    }

    #[test]
    fn test_hybrid_classification_from_catalog() {
        let catalog = default_modifiers();
        let crab = catalog.find("crab's").unwrap();
        assert_eq!(crab.effects.len(), 2);

        let mut item = Item::new("Iron Cuirass", "body_armour");
        item.item_level = 10;
        let choices = catalog.pool_for(&item).annotate(&item, &ExclusionCatalog::default());
        assert!(choices.iter().all(|c| c.modifier.name != "Crab's"));
        assert_eq!(item.rarity, Rarity::Normal);
    }
}
