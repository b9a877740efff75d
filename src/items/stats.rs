//! Stat resolution
//!
//! Turns an item's base defences, quality and modifier list into the
//! displayed (calculated) defences.
//!
//! Modifier text is free-form, so the semantic markers ("to Armour",
//! "increased Energy Shield", ...) are classified once, when a modifier is
//! defined, into typed [`StatEffect`]s. [`resolve`] only ever consumes those.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use super::modifier::Modifier;

/// Defensive stats tracked on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Armour,
    Evasion,
    EnergyShield,
}

impl StatKind {
    pub const ALL: [StatKind; 3] = [StatKind::Armour, StatKind::Evasion, StatKind::EnergyShield];

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            StatKind::Armour => "Armour",
            StatKind::Evasion => "Evasion Rating",
            StatKind::EnergyShield => "Energy Shield",
        }
    }
}

/// Base or calculated stat values, keyed by stat
pub type StatMap = BTreeMap<StatKind, i32>;

/// How a modifier value is applied to a stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Added to the base value
    Flat,
    /// Summed into the "increased" multiplier
    Percent,
}

/// One typed contribution of a modifier to a stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatEffect {
    pub stat: StatKind,
    pub component: Component,
    /// Index into the modifier's rolled values
    pub value_index: usize,
}

use StatKind::{Armour, EnergyShield, Evasion};

/// Recognised stat phrases, longest first so that combined phrases win over
/// their single-stat prefixes ("increased armour and evasion" before
/// "increased armour").
const PHRASES: &[(&str, Component, &[StatKind])] = &[
    ("increased armour, evasion and energy shield", Component::Percent, &[Armour, Evasion, EnergyShield]),
    ("increased armour and energy shield", Component::Percent, &[Armour, EnergyShield]),
    ("increased evasion and energy shield", Component::Percent, &[Evasion, EnergyShield]),
    ("increased armour and evasion", Component::Percent, &[Armour, Evasion]),
    ("increased maximum energy shield", Component::Percent, &[EnergyShield]),
    ("increased energy shield", Component::Percent, &[EnergyShield]),
    ("increased evasion", Component::Percent, &[Evasion]),
    ("increased armour", Component::Percent, &[Armour]),
    ("to armour and evasion rating", Component::Flat, &[Armour, Evasion]),
    ("to armour and energy shield", Component::Flat, &[Armour, EnergyShield]),
    ("to evasion rating and energy shield", Component::Flat, &[Evasion, EnergyShield]),
    ("to maximum energy shield", Component::Flat, &[EnergyShield]),
    ("to evasion rating", Component::Flat, &[Evasion]),
    ("to armour", Component::Flat, &[Armour]),
];

/// Split modifier text into value-carrying clauses.
///
/// Lines always split. A `", "` only splits when the next clause starts a new
/// value (sign, digit or placeholder), so "Armour, Evasion and Energy Shield"
/// stays one clause.
pub fn split_clauses(text: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let bytes = line.as_bytes();
        for i in 0..bytes.len().saturating_sub(1) {
            if bytes[i] != b',' || bytes[i + 1] != b' ' {
                continue;
            }
            let next = bytes.get(i + 2).copied();
            if matches!(next, Some(b'+' | b'-' | b'#' | b'{' | b'(' | b'0'..=b'9')) {
                clauses.push(line[start..i].trim());
                start = i + 2;
            }
        }
        let rest = line[start..].trim();
        if !rest.is_empty() {
            clauses.push(rest);
        }
    }
    clauses
}

/// Classify a modifier's text into typed stat effects.
///
/// Each clause consumes the next rolled value, so a hybrid
/// "+# to Armour, #% increased Armour" yields a flat effect on value 0 and a
/// percent effect on value 1. Clauses with no recognised phrase still
/// consume their value and contribute nothing.
pub fn classify_text(text: &str) -> Vec<StatEffect> {
    let mut effects = Vec::new();
    for (value_index, clause) in split_clauses(text).into_iter().enumerate() {
        let lower = clause.to_ascii_lowercase();
        let Some((_, component, stats)) = PHRASES.iter().find(|(phrase, _, _)| lower.contains(phrase)) else {
            continue;
        };
        for stat in stats.iter() {
            effects.push(StatEffect { stat: *stat, component: *component, value_index });
        }
    }
    effects
}

/// Flat and percent accumulators for one stat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub flat: i64,
    pub percent: i64,
}

/// Sum modifier contributions per stat. Percent sums are seeded with quality.
pub fn accumulate<'a>(
    quality: i32,
    modifiers: impl IntoIterator<Item = &'a Modifier>,
) -> BTreeMap<StatKind, Accumulator> {
    let mut acc: BTreeMap<StatKind, Accumulator> = StatKind::ALL
        .iter()
        .map(|s| (*s, Accumulator { flat: 0, percent: quality as i64 }))
        .collect();

    for modifier in modifiers {
        if modifier.is_unresolved() {
            continue;
        }
        for effect in &modifier.effects {
            let Some(value) = modifier.values.get(effect.value_index).copied() else {
                continue;
            };
            let entry = acc.entry(effect.stat).or_default();
            match effect.component {
                Component::Flat => entry.flat += value as i64,
                Component::Percent => entry.percent += value as i64,
            }
        }
    }
    acc
}

/// Resolve calculated stats: `floor((base + flat) * (1 + percent / 100))`.
///
/// Stats missing from `base` stay missing.
pub fn resolve<'a>(
    base: &StatMap,
    quality: i32,
    modifiers: impl IntoIterator<Item = &'a Modifier>,
) -> StatMap {
    let acc = accumulate(quality, modifiers);
    base.iter()
        .map(|(stat, base_value)| {
            let a = acc.get(stat).copied().unwrap_or(Accumulator { flat: 0, percent: quality as i64 });
            // Integer form of floor(x * (100 + p) / 100), exact for negatives too.
            let total = (*base_value as i64 + a.flat).saturating_mul(100 + a.percent);
            (*stat, saturate(total.div_euclid(100)))
        })
        .collect()
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
