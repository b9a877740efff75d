//! Item definitions
//!
//! The mutable crafting subject: a base with quality and item level, its
//! implicit / prefix / suffix modifiers, and the stats derived from them.

use serde::{Deserialize, Serialize};

use super::modifier::{ModClass, Modifier, UnrevealedModifier};
use super::stats::{resolve, StatKind, StatMap};

/// Maximum prefixes, and separately maximum suffixes, on one item
pub const MAX_AFFIXES: usize = 3;

/// Item rarity, derived from the number of affixes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    #[default]
    Normal,
    Magic,
    Rare,
    Unique,
}

impl Rarity {
    pub fn name(&self) -> &'static str {
        match self {
            Rarity::Normal => "Normal",
            Rarity::Magic => "Magic",
            Rarity::Rare => "Rare",
            Rarity::Unique => "Unique",
        }
    }

    /// Rarity implied by a prefix + suffix count
    pub fn for_affix_count(count: usize) -> Rarity {
        match count {
            0 => Rarity::Normal,
            1 => Rarity::Magic,
            _ => Rarity::Rare,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Rarity::Normal => 0,
            Rarity::Magic => 1,
            Rarity::Rare => 2,
            Rarity::Unique => 3,
        }
    }

    /// One-way promotion: never lowers the rarity
    pub fn promote(self, to: Rarity) -> Rarity {
        if to.rank() > self.rank() { to } else { self }
    }
}

/// A base type from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseItem {
    pub name: String,
    /// Category tag ("body_armour", "wand", ...)
    pub category: String,
    #[serde(default)]
    pub base_stats: StatMap,
    #[serde(default)]
    pub implicits: Vec<Modifier>,
    /// Level required to equip, used as the default item level
    #[serde(default = "default_level")]
    pub level: u8,
}

fn default_level() -> u8 {
    1
}

/// The item being crafted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub base_name: String,
    pub category: String,
    pub rarity: Rarity,
    /// 1-100
    pub item_level: u8,
    /// Quality percentage, seeds the percent accumulator of every stat
    pub quality: i32,
    #[serde(default)]
    pub implicits: Vec<Modifier>,
    /// Implicits the base came with; `reset` restores exactly these
    #[serde(default)]
    pub base_implicits: Vec<Modifier>,
    #[serde(default)]
    pub prefixes: Vec<Modifier>,
    #[serde(default)]
    pub suffixes: Vec<Modifier>,
    /// Placeholders awaiting reveal, referenced from the affix lists by id
    #[serde(default)]
    pub unrevealed: Vec<UnrevealedModifier>,
    #[serde(default)]
    pub corrupted: bool,
    #[serde(default)]
    pub base_stats: StatMap,
    #[serde(default)]
    pub calculated_stats: StatMap,
}

impl Item {
    pub fn new(base_name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            category: category.into(),
            rarity: Rarity::Normal,
            item_level: 1,
            quality: 0,
            implicits: Vec::new(),
            base_implicits: Vec::new(),
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            unrevealed: Vec::new(),
            corrupted: false,
            base_stats: StatMap::new(),
            calculated_stats: StatMap::new(),
        }
    }

    /// Fresh normal item of a catalog base
    pub fn from_base(base: &BaseItem, item_level: u8) -> Self {
        let mut item = Self::new(base.name.clone(), base.category.clone());
        item.item_level = item_level.clamp(1, 100);
        item.base_stats = base.base_stats.clone();
        item.implicits = base.implicits.clone();
        item.base_implicits = base.implicits.clone();
        item.refresh_stats();
        item
    }

    pub fn with_base_stat(mut self, stat: StatKind, value: i32) -> Self {
        self.base_stats.insert(stat, value);
        self.refresh_stats();
        self
    }

    pub fn affixes(&self, class: ModClass) -> &[Modifier] {
        match class {
            ModClass::Prefix => &self.prefixes,
            ModClass::Suffix => &self.suffixes,
            ModClass::Implicit => &self.implicits,
        }
    }

    pub fn affixes_mut(&mut self, class: ModClass) -> &mut Vec<Modifier> {
        match class {
            ModClass::Prefix => &mut self.prefixes,
            ModClass::Suffix => &mut self.suffixes,
            ModClass::Implicit => &mut self.implicits,
        }
    }

    /// Prefixes + suffixes
    pub fn affix_count(&self) -> usize {
        self.prefixes.len() + self.suffixes.len()
    }

    pub fn all_modifiers(&self) -> impl Iterator<Item = &Modifier> {
        self.implicits.iter().chain(&self.prefixes).chain(&self.suffixes)
    }

    /// Append an affix, promote rarity and recompute stats.
    ///
    /// Returns false when the target list is full or the modifier is implicit.
    pub fn push_affix(&mut self, modifier: Modifier) -> bool {
        if !modifier.class.is_affix() || self.affixes(modifier.class).len() >= MAX_AFFIXES {
            return false;
        }
        self.affixes_mut(modifier.class).push(modifier);
        self.promote_rarity();
        self.refresh_stats();
        true
    }

    /// Remove an affix by position. Rarity is left as is.
    pub fn remove_affix(&mut self, class: ModClass, index: usize) -> Option<Modifier> {
        if !class.is_affix() || index >= self.affixes(class).len() {
            return None;
        }
        let removed = self.affixes_mut(class).remove(index);
        if let Some(id) = &removed.unrevealed_id {
            self.unrevealed.retain(|u| &u.id != id);
        }
        self.refresh_stats();
        Some(removed)
    }

    /// Raise rarity to match the affix count; never lowers it
    pub fn promote_rarity(&mut self) {
        self.rarity = self.rarity.promote(Rarity::for_affix_count(self.affix_count()));
    }

    /// Recompute calculated stats. Only writes when the result differs and
    /// reports whether it did.
    pub fn refresh_stats(&mut self) -> bool {
        let next = resolve(&self.base_stats, self.quality, self.all_modifiers());
        if next == self.calculated_stats {
            return false;
        }
        log::debug!("{}: stats {:?} -> {:?}", self.base_name, self.calculated_stats, next);
        self.calculated_stats = next;
        true
    }

    pub fn set_quality(&mut self, quality: i32) {
        self.quality = quality.max(0);
        self.refresh_stats();
    }

    /// Re-derive typed stat effects on every modifier (after ingesting
    /// foreign item data) and recompute stats.
    pub fn classify_modifiers(&mut self) {
        for m in self.implicits.iter_mut().chain(self.prefixes.iter_mut()).chain(self.suffixes.iter_mut()) {
            m.classify();
        }
        self.refresh_stats();
    }

    /// Serialized form used to detect changes while a request is in flight
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }

    /// Position of the placeholder modifier for an unrevealed id
    pub fn placeholder_position(&self, id: &str) -> Option<(ModClass, usize)> {
        [ModClass::Prefix, ModClass::Suffix].into_iter().find_map(|class| {
            self.affixes(class)
                .iter()
                .position(|m| m.unrevealed_id.as_deref() == Some(id))
                .map(|index| (class, index))
        })
    }

    /// Strip back to the bare base. The only path that lowers rarity.
    pub fn reset(&mut self) {
        self.implicits = self.base_implicits.clone();
        self.prefixes.clear();
        self.suffixes.clear();
        self.unrevealed.clear();
        self.corrupted = false;
        self.rarity = Rarity::Normal;
        self.refresh_stats();
    }

    /// Plain-text description, one line per entry
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{} [{}] {} ilvl {} q{}%{}",
            self.base_name,
            self.category,
            self.rarity.name(),
            self.item_level,
            self.quality,
            if self.corrupted { " (corrupted)" } else { "" }
        )];
        for (stat, value) in &self.calculated_stats {
            let base = self.base_stats.get(stat).copied().unwrap_or_default();
            lines.push(format!("  {}: {} (base {})", stat.name(), value, base));
        }
        for m in &self.implicits {
            lines.push(format!("  implicit: {}", m.display_text()));
        }
        for class in [ModClass::Prefix, ModClass::Suffix] {
            for (i, m) in self.affixes(class).iter().enumerate() {
                lines.push(format!("  {} {}: {} (T{} {})", class.name(), i, m.display_text(), m.tier, m.name));
            }
        }
        lines
    }
}
