//! Modifier definitions
//!
//! A modifier is a static definition (text template, ranges, group, tags)
//! plus the values rolled for one instance of it on an item.

use serde::{Deserialize, Serialize};

use super::stats::{classify_text, StatEffect};

/// Which list on the item a modifier lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModClass {
    Prefix,
    Suffix,
    Implicit,
}

impl ModClass {
    pub fn name(&self) -> &'static str {
        match self {
            ModClass::Prefix => "prefix",
            ModClass::Suffix => "suffix",
            ModClass::Implicit => "implicit",
        }
    }

    /// Prefixes and suffixes are capped; implicits are not
    pub fn is_affix(&self) -> bool {
        matches!(self, ModClass::Prefix | ModClass::Suffix)
    }
}

/// Special sources that restrict where a modifier can come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModSource {
    #[default]
    Normal,
    /// Only obtainable through essences
    Essence,
    /// Only obtainable through desecration
    Desecrated,
}

/// Inclusive roll range for one placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatRange {
    pub min: i32,
    pub max: i32,
}

impl StatRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    /// Same range with `min <= max`, for ranges that came from data files
    pub fn normalized(self) -> Self {
        Self::new(self.min, self.max)
    }

    pub fn contains(&self, value: i32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn midpoint(&self) -> i32 {
        self.min + (self.max - self.min) / 2
    }
}

/// Placeholder tokens accepted in modifier text
const PLACEHOLDERS: [&str; 2] = ["{}", "#"];

/// One item modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Display name ("Reinforced", "of the Lynx", ...)
    pub name: String,
    pub class: ModClass,
    /// 1 is the best tier
    pub tier: u8,
    /// Stat text template, one placeholder per range
    pub text: String,
    pub ranges: Vec<StatRange>,
    /// Rolled values, paired with `ranges`
    #[serde(default)]
    pub values: Vec<i32>,
    #[serde(default = "default_required_level")]
    pub required_level: u8,
    /// Tiers of the same modifier share a group and exclude each other
    pub mod_group: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Assigned by matching against the exclusion catalog
    #[serde(default)]
    pub exclusion_group: Option<String>,
    #[serde(default)]
    pub source: ModSource,
    /// Set while this slot is an unrevealed placeholder
    #[serde(default)]
    pub unrevealed_id: Option<String>,
    /// Typed stat contributions derived from `text`
    #[serde(default)]
    pub effects: Vec<StatEffect>,
}

fn default_required_level() -> u8 {
    1
}

impl Modifier {
    /// Create a modifier definition; values start at the range minimums
    pub fn new(
        name: impl Into<String>,
        class: ModClass,
        tier: u8,
        text: impl Into<String>,
        ranges: Vec<StatRange>,
        mod_group: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let values = ranges.iter().map(|r| r.min).collect();
        Self {
            name: name.into(),
            class,
            tier,
            effects: classify_text(&text),
            text,
            ranges,
            values,
            required_level: 1,
            mod_group: mod_group.into(),
            tags: Vec::new(),
            exclusion_group: None,
            source: ModSource::Normal,
            unrevealed_id: None,
        }
    }

    /// Placeholder occupying an affix slot until revealed
    pub fn placeholder(id: impl Into<String>, class: ModClass) -> Self {
        let id = id.into();
        let mut m = Self::new(
            "Unrevealed Modifier",
            class,
            0,
            "Unrevealed Desecrated Modifier",
            Vec::new(),
            format!("unrevealed:{}", id),
        );
        m.source = ModSource::Desecrated;
        m.unrevealed_id = Some(id);
        m
    }

    pub fn with_values(mut self, values: Vec<i32>) -> Self {
        self.values = values;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.required_level = level;
        self
    }

    pub fn with_source(mut self, source: ModSource) -> Self {
        self.source = source;
        self
    }

    /// Set every value to its range midpoint
    pub fn roll_midpoint(&mut self) {
        self.values = self.ranges.iter().map(|r| r.midpoint()).collect();
    }

    /// Re-derive typed effects from the text (after deserializing foreign data)
    pub fn classify(&mut self) {
        self.effects = classify_text(&self.text);
    }

    pub fn is_unresolved(&self) -> bool {
        self.unrevealed_id.is_some()
    }

    /// Whether every rolled value sits inside its range
    pub fn values_in_range(&self) -> bool {
        self.values.len() == self.ranges.len()
            && self.values.iter().zip(&self.ranges).all(|(v, r)| r.contains(*v))
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Text with placeholders replaced by rolled values (or ranges when unrolled)
    pub fn display_text(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();
        let mut index = 0;
        loop {
            let next = PLACEHOLDERS
                .iter()
                .filter_map(|p| rest.find(p).map(|pos| (pos, p.len())))
                .min_by_key(|(pos, _)| *pos);
            let Some((pos, len)) = next else {
                out.push_str(rest);
                break;
            };
            out.push_str(&rest[..pos]);
            match (self.values.get(index), self.ranges.get(index)) {
                (Some(v), _) => out.push_str(&v.to_string()),
                (None, Some(r)) => out.push_str(&format!("({}-{})", r.min, r.max)),
                (None, None) => out.push_str(&rest[pos..pos + len]),
            }
            rest = &rest[pos + len..];
            index += 1;
        }
        out
    }
}

/// Placeholder record for a modifier awaiting reveal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrevealedModifier {
    /// Opaque id shared with the placeholder modifier in the affix list
    pub id: String,
    pub class: ModClass,
    /// Boss affinity tag the revealed modifier must carry
    #[serde(default)]
    pub required_tag: Option<String>,
    /// Descriptors of the bone that created the placeholder
    #[serde(default)]
    pub bones: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::stats::StatKind;

    #[test]
    fn test_display_text_substitutes_in_order() {
        let m = Modifier::new(
            "Fortified",
            ModClass::Prefix,
            2,
            "+{} to Armour, #% increased Armour",
            vec![StatRange::new(20, 40), StatRange::new(10, 20)],
            "ArmourHybrid",
        )
        .with_values(vec![33, 14]);
        assert_eq!(m.display_text(), "+33 to Armour, 14% increased Armour");
    }

    #[test]
    fn test_display_text_without_values_shows_range() {
        let m = Modifier::new("X", ModClass::Suffix, 1, "+{} to Evasion Rating", vec![StatRange::new(5, 9)], "Ev")
            .with_values(Vec::new());
        assert_eq!(m.display_text(), "+(5-9) to Evasion Rating");
    }

    #[test]
    fn test_new_classifies_effects() {
        let m = Modifier::new("X", ModClass::Prefix, 1, "+{} to Armour", vec![StatRange::new(1, 2)], "Ar");
        assert_eq!(m.effects.len(), 1);
        assert_eq!(m.effects[0].stat, StatKind::Armour);
    }

    #[test]
    fn test_placeholder() {
        let m = Modifier::placeholder("abc", ModClass::Suffix);
        assert!(m.is_unresolved());
        assert_eq!(m.source, ModSource::Desecrated);
        assert_ne!(m.mod_group, Modifier::placeholder("def", ModClass::Suffix).mod_group);
    }

    #[test]
    fn test_range_helpers() {
        let r = StatRange::new(30, 10);
        assert_eq!((r.min, r.max), (10, 30));
        assert_eq!(r.midpoint(), 20);
        assert!(r.contains(30));
        assert!(!r.contains(31));
    }
}
