//! Offline crafting service
//!
//! A local stand-in for the remote crafting backend, driven by the data
//! catalog and a seedable RNG. It applies the same compatibility rules the
//! session checks locally, but makes no attempt at real spawn weights.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::error::ServiceError;
use super::service::{CatalogService, CraftResponse, CraftingService, RevealResponse};
use crate::config::Config;
use crate::data::{DataManager, ModifierCatalog};
use crate::items::{
    can_add, ExclusionCatalog, ExclusionGroup, Item, ModClass, Modifier, ModifierPool, Rarity, StatRange,
    UnrevealedModifier, MAX_AFFIXES,
};

pub const TRANSMUTATION: &str = "Orb of Transmutation";
pub const AUGMENTATION: &str = "Orb of Augmentation";
pub const REGAL: &str = "Regal Orb";
pub const EXALTED: &str = "Exalted Orb";
pub const CHAOS: &str = "Chaos Orb";
pub const ANNULMENT: &str = "Orb of Annulment";
pub const VAAL: &str = "Vaal Orb";
pub const GNAWED_JAWBONE: &str = "Gnawed Jawbone";

pub const CURRENCIES: [&str; 8] = [TRANSMUTATION, AUGMENTATION, REGAL, EXALTED, CHAOS, ANNULMENT, VAAL, GNAWED_JAWBONE];

pub const SINISTRAL_EXALTATION: &str = "Omen of Sinistral Exaltation";
pub const DEXTRAL_EXALTATION: &str = "Omen of Dextral Exaltation";
pub const ABYSSAL_ECHOES: &str = "Omen of Abyssal Echoes";

pub const OMENS: [&str; 3] = [SINISTRAL_EXALTATION, DEXTRAL_EXALTATION, ABYSSAL_ECHOES];

/// Candidates offered per reveal
const REVEAL_CHOICES: usize = 3;
/// Per-side cap while an item is still Magic. Rarity itself follows the
/// affix count, so the second affix makes it Rare.
const MAGIC_AFFIXES: usize = 1;

struct Rolls {
    rng: StdRng,
    next_unrevealed: u64,
}

pub struct OfflineService {
    modifiers: ModifierCatalog,
    exclusions: ExclusionCatalog,
    reroll_omen: String,
    rolls: Mutex<Rolls>,
}

impl OfflineService {
    pub fn new(data: &DataManager, config: &Config) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            modifiers: data.modifiers.clone(),
            exclusions: data.exclusion_catalog(),
            reroll_omen: config.reroll_omen.clone(),
            rolls: Mutex::new(Rolls { rng, next_unrevealed: 1 }),
        }
    }

    /// Why `currency` cannot be used on `item`, if it cannot
    fn precheck(&self, item: &Item, currency: &str) -> Result<(), String> {
        if item.corrupted {
            return Err("Corrupted items cannot be modified".to_string());
        }
        match currency {
            TRANSMUTATION => require(item.rarity == Rarity::Normal, "Orb of Transmutation requires a Normal item"),
            AUGMENTATION => {
                require(item.rarity == Rarity::Magic, "Orb of Augmentation requires a Magic item")?;
                require(item.affix_count() < 2 * MAGIC_AFFIXES, "Item has no open affix")
            }
            REGAL => require(item.rarity == Rarity::Magic, "Regal Orb requires a Magic item"),
            EXALTED | GNAWED_JAWBONE => {
                require(item.rarity == Rarity::Rare, &format!("{} requires a Rare item", currency))?;
                require(item.affix_count() < 2 * MAX_AFFIXES, "Item has no open affix")
            }
            CHAOS => {
                require(item.rarity == Rarity::Rare, "Chaos Orb requires a Rare item")?;
                require(item.affix_count() > 0, "Item has no modifiers to replace")
            }
            ANNULMENT => require(item.affix_count() > 0, "Item has no modifiers to remove"),
            VAAL => Ok(()),
            other => Err(format!("Unknown currency: {}", other)),
        }
    }

    /// Roll a fresh instance of a catalog modifier
    fn roll(&self, rng: &mut StdRng, template: &Modifier, category: &str) -> Modifier {
        let mut modifier = template.clone();
        modifier.values = modifier.ranges.iter().map(|r| roll_value(rng, *r)).collect();
        modifier.exclusion_group = self.exclusions.group_for(&modifier, category).map(str::to_string);
        modifier
    }

    /// Add one random compatible modifier from the normal pool
    fn add_random(
        &self,
        rng: &mut StdRng,
        item: &mut Item,
        cap: usize,
        only: Option<ModClass>,
    ) -> Result<Modifier, String> {
        let classes = open_classes(item, cap, only);
        let pool = self.modifiers.pool_for(item);
        let candidates: Vec<&Modifier> = pool
            .prefixes
            .iter()
            .chain(&pool.suffixes)
            .filter(|m| classes.contains(&m.class) && m.required_level <= item.item_level)
            .filter(|m| can_add(m, &item.prefixes, &item.suffixes, &self.exclusions, &item.category).is_allowed())
            .collect();
        let template = candidates
            .choose(rng)
            .ok_or_else(|| "No modifiers available for this item".to_string())?;
        let modifier = self.roll(rng, template, &item.category);
        item.push_affix(modifier.clone());
        Ok(modifier)
    }

    fn remove_random(&self, rng: &mut StdRng, item: &mut Item) -> Option<Modifier> {
        let slots: Vec<(ModClass, usize)> = [ModClass::Prefix, ModClass::Suffix]
            .into_iter()
            .flat_map(|class| (0..item.affixes(class).len()).map(move |i| (class, i)))
            .collect();
        let &(class, index) = slots.choose(rng)?;
        item.remove_affix(class, index)
    }

    fn corrupt(&self, rng: &mut StdRng, item: &mut Item) -> String {
        item.corrupted = true;
        match rng.gen_range(0..3) {
            0 => "Corrupted with no other effect".to_string(),
            1 => {
                for modifier in item.prefixes.iter_mut().chain(item.suffixes.iter_mut()) {
                    if modifier.is_unresolved() {
                        continue;
                    }
                    modifier.values = modifier.ranges.iter().map(|r| roll_value(rng, *r)).collect();
                }
                "Corrupted: modifier values rerolled".to_string()
            }
            _ => {
                let template = Modifier::new(
                    "Corrupted",
                    ModClass::Implicit,
                    1,
                    "+{}% to all Elemental Resistances",
                    vec![StatRange::new(5, 10)],
                    "CorruptedImplicit",
                );
                let implicit = self.roll(rng, &template, &item.category);
                let text = implicit.display_text();
                item.implicits.push(implicit);
                format!("Corrupted: gained {}", text)
            }
        }
    }

    /// Add an unrevealed placeholder to a random open slot that has
    /// desecrated modifiers to reveal into
    fn desecrate(&self, rolls: &mut Rolls, item: &mut Item) -> Result<String, String> {
        let pool = self.modifiers.pool_for(item);
        let classes: Vec<ModClass> = open_classes(item, MAX_AFFIXES, None)
            .into_iter()
            .filter(|class| desecrated(&pool, *class).iter().any(|m| m.required_level <= item.item_level))
            .collect();
        let &class = classes
            .choose(&mut rolls.rng)
            .ok_or_else(|| "No desecrated modifiers can appear on this item".to_string())?;

        // Ids only need to be unique on the item; a loaded session may
        // already hold low ones.
        let mut id = format!("u{}", rolls.next_unrevealed);
        while item.placeholder_position(&id).is_some() {
            rolls.next_unrevealed += 1;
            id = format!("u{}", rolls.next_unrevealed);
        }
        rolls.next_unrevealed += 1;
        item.push_affix(Modifier::placeholder(id.clone(), class));
        item.unrevealed.push(UnrevealedModifier {
            id,
            class,
            required_tag: None,
            bones: vec![GNAWED_JAWBONE.to_string()],
        });
        Ok(format!("Added an unrevealed {}", class.name()))
    }
}

impl CraftingService for OfflineService {
    fn simulate_crafting_with_omens(
        &self,
        item: &Item,
        currency: &str,
        omens: &[String],
    ) -> Result<CraftResponse, ServiceError> {
        if let Err(reason) = self.precheck(item, currency) {
            log::debug!("{} refused: {}", currency, reason);
            return Ok(CraftResponse::rejected(reason));
        }
        let only = match exaltation_side(currency, omens) {
            Ok(only) => only,
            Err(reason) => return Ok(CraftResponse::rejected(reason)),
        };

        let mut guard = self.rolls.lock();
        let rolls = &mut *guard;
        let mut next = item.clone();
        let outcome = match currency {
            TRANSMUTATION => self
                .add_random(&mut rolls.rng, &mut next, MAGIC_AFFIXES, None)
                .map(|m| format!("Added {}", m.display_text())),
            AUGMENTATION => self
                .add_random(&mut rolls.rng, &mut next, MAGIC_AFFIXES, None)
                .map(|m| format!("Added {}", m.display_text())),
            REGAL => self
                .add_random(&mut rolls.rng, &mut next, MAX_AFFIXES, None)
                .map(|m| format!("Added {}", m.display_text())),
            EXALTED => self
                .add_random(&mut rolls.rng, &mut next, MAX_AFFIXES, only)
                .map(|m| format!("Added {}", m.display_text())),
            CHAOS => {
                let removed = self.remove_random(&mut rolls.rng, &mut next);
                let removed = removed.map(|m| m.name).unwrap_or_default();
                match self.add_random(&mut rolls.rng, &mut next, MAX_AFFIXES, None) {
                    Ok(added) => Ok(format!("Replaced {} with {}", removed, added.display_text())),
                    Err(_) => Ok(format!("Removed {}", removed)),
                }
            }
            ANNULMENT => self
                .remove_random(&mut rolls.rng, &mut next)
                .map(|m| format!("Removed {}", m.name))
                .ok_or_else(|| "Item has no modifiers to remove".to_string()),
            VAAL => Ok(self.corrupt(&mut rolls.rng, &mut next)),
            GNAWED_JAWBONE => self.desecrate(rolls, &mut next),
            other => Err(format!("Unknown currency: {}", other)),
        };

        match outcome {
            Ok(message) => {
                next.refresh_stats();
                Ok(CraftResponse::ok(next, message))
            }
            Err(reason) => Ok(CraftResponse::rejected(reason)),
        }
    }

    fn reveal_modifier(
        &self,
        unrevealed_id: &str,
        item: &Item,
        omens: &[String],
    ) -> Result<RevealResponse, ServiceError> {
        let record = item
            .unrevealed
            .iter()
            .find(|u| u.id == unrevealed_id)
            .ok_or_else(|| ServiceError::Malformed(format!("unknown unrevealed modifier {}", unrevealed_id)))?;

        // Check compatibility as if the placeholder's slot were empty.
        let mut open = item.clone();
        if let Some((class, position)) = item.placeholder_position(unrevealed_id) {
            open.affixes_mut(class).remove(position);
        }

        let pool = self.modifiers.pool_for(item);
        let candidates: Vec<&Modifier> = desecrated(&pool, record.class)
            .iter()
            .filter(|m| m.required_level <= item.item_level)
            .filter(|m| record.required_tag.as_deref().map_or(true, |tag| m.has_tag(tag)))
            .filter(|m| {
                let mut m = (*m).clone();
                m.class = record.class;
                can_add(&m, &open.prefixes, &open.suffixes, &self.exclusions, &item.category).is_allowed()
            })
            .collect();

        let mut guard = self.rolls.lock();
        let rng = &mut guard.rng;
        let picked: Vec<&Modifier> = candidates.choose_multiple(rng, REVEAL_CHOICES).copied().collect();
        let choices = picked.into_iter().map(|m| self.roll(rng, m, &item.category)).collect();

        Ok(RevealResponse {
            choices,
            has_reroll_omen: omens.iter().any(|o| o == &self.reroll_omen),
        })
    }
}

impl CatalogService for OfflineService {
    fn available_modifiers(&self, item: &Item) -> Result<ModifierPool, ServiceError> {
        Ok(self.modifiers.pool_for(item))
    }

    fn exclusion_groups(&self) -> Result<Vec<ExclusionGroup>, ServiceError> {
        Ok(self.exclusions.groups().cloned().collect())
    }

    fn available_currencies(&self, item: &Item) -> Result<Vec<String>, ServiceError> {
        Ok(CURRENCIES
            .iter()
            .filter(|c| self.precheck(item, c).is_ok())
            .map(|c| c.to_string())
            .collect())
    }
}

/// Uniform value in `range`, tolerating an inverted one
fn roll_value(rng: &mut StdRng, range: StatRange) -> i32 {
    let range = range.normalized();
    rng.gen_range(range.min..=range.max)
}

fn require(condition: bool, reason: &str) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

/// Affix classes with room left under `cap`, optionally narrowed to one
fn open_classes(item: &Item, cap: usize, only: Option<ModClass>) -> Vec<ModClass> {
    [ModClass::Prefix, ModClass::Suffix]
        .into_iter()
        .filter(|class| only.map_or(true, |o| o == *class))
        .filter(|class| item.affixes(*class).len() < cap)
        .collect()
}

fn desecrated(pool: &ModifierPool, class: ModClass) -> &[Modifier] {
    match class {
        ModClass::Prefix => &pool.desecrated_prefixes,
        ModClass::Suffix => &pool.desecrated_suffixes,
        ModClass::Implicit => &[],
    }
}

/// Side forced by the exaltation omens; they only affect Exalted Orbs
fn exaltation_side(currency: &str, omens: &[String]) -> Result<Option<ModClass>, String> {
    if currency != EXALTED {
        return Ok(None);
    }
    let sinistral = omens.iter().any(|o| o == SINISTRAL_EXALTATION);
    let dextral = omens.iter().any(|o| o == DEXTRAL_EXALTATION);
    match (sinistral, dextral) {
        (true, true) => Err("Sinistral and Dextral Exaltation cannot be combined".to_string()),
        (true, false) => Ok(Some(ModClass::Prefix)),
        (false, true) => Ok(Some(ModClass::Suffix)),
        (false, false) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crafting::session::{Command, CraftingSession};
    use crate::crafting::CraftError;

    fn service(seed: u64) -> OfflineService {
        let config = Config { rng_seed: Some(seed), ..Config::default() };
        OfflineService::new(&DataManager::default(), &config)
    }

    fn cuirass() -> Item {
        let data = DataManager::default();
        let base = data.bases.find("Iron Cuirass").unwrap();
        Item::from_base(base, 82)
    }

    fn rare(item: &Item, svc: &OfflineService) -> Item {
        let magic = svc.simulate_crafting(item, TRANSMUTATION).unwrap().result_item.unwrap();
        svc.simulate_crafting(&magic, REGAL).unwrap().result_item.unwrap()
    }

    #[test]
    fn test_transmute_then_regal() {
        let svc = service(1);
        let magic = svc.simulate_crafting(&cuirass(), TRANSMUTATION).unwrap();
        assert!(magic.success);
        let magic = magic.result_item.unwrap();
        assert_eq!(magic.rarity, Rarity::Magic);
        assert_eq!(magic.affix_count(), 1);
        assert!(magic.all_modifiers().all(|m| m.values_in_range()));

        let rare = svc.simulate_crafting(&magic, REGAL).unwrap().result_item.unwrap();
        assert_eq!(rare.rarity, Rarity::Rare);
        assert_eq!(rare.affix_count(), 2);
    }

    #[test]
    fn test_inverted_ranges_still_roll() {
        let mut data = DataManager::default();
        for def in &mut data.modifiers.modifiers {
            for range in &mut def.modifier.ranges {
                *range = StatRange { min: range.max, max: range.min };
            }
        }
        let config = Config { rng_seed: Some(11), ..Config::default() };
        let svc = OfflineService::new(&data, &config);

        let magic = svc.simulate_crafting(&cuirass(), TRANSMUTATION).unwrap();
        assert!(magic.success);
        let item = magic.result_item.unwrap();
        let added = item.prefixes.iter().chain(&item.suffixes).next().unwrap();
        assert!(added.values.iter().zip(&added.ranges).all(|(v, r)| (r.max..=r.min).contains(v)));
    }

    #[test]
    fn test_wrong_rarity_rejected() {
        let svc = service(2);
        let response = svc.simulate_crafting(&cuirass(), EXALTED).unwrap();
        assert!(!response.success);
        assert!(response.result_item.is_none());
        assert_eq!(response.message, "Exalted Orb requires a Rare item");
    }

    #[test]
    fn test_augment_fills_other_side() {
        let svc = service(3);
        let magic = svc.simulate_crafting(&cuirass(), TRANSMUTATION).unwrap().result_item.unwrap();
        let full = svc.simulate_crafting(&magic, AUGMENTATION).unwrap().result_item.unwrap();
        assert_eq!(full.prefixes.len(), 1);
        assert_eq!(full.suffixes.len(), 1);
        assert!(!svc.simulate_crafting(&full, AUGMENTATION).unwrap().success);
    }

    #[test]
    fn test_exaltation_omens_pick_side() {
        let svc = service(4);
        let start = rare(&cuirass(), &svc);
        let omens = vec![SINISTRAL_EXALTATION.to_string()];
        for _ in 0..10 {
            let next = svc.simulate_crafting_with_omens(&start, EXALTED, &omens).unwrap().result_item.unwrap();
            assert_eq!(next.prefixes.len(), start.prefixes.len() + 1);
            assert_eq!(next.suffixes.len(), start.suffixes.len());
        }

        let both = vec![SINISTRAL_EXALTATION.to_string(), DEXTRAL_EXALTATION.to_string()];
        assert!(!svc.simulate_crafting_with_omens(&start, EXALTED, &both).unwrap().success);
    }

    #[test]
    fn test_exclusion_groups_respected() {
        let svc = service(5);
        let data = DataManager::default();
        let mut wand = Item::from_base(data.bases.find("Withered Wand").unwrap(), 82);
        wand.push_affix(data.modifiers.find("Pyromancer's").unwrap().clone());
        wand.push_affix(data.modifiers.find("of the Brute").unwrap().clone());
        assert_eq!(wand.rarity, Rarity::Rare);

        let omens = vec![DEXTRAL_EXALTATION.to_string()];
        for _ in 0..30 {
            let next = svc.simulate_crafting_with_omens(&wand, EXALTED, &omens).unwrap().result_item.unwrap();
            assert!(next.suffixes.iter().all(|m| m.mod_group != "FireSpellSkillLevels"));
        }
    }

    #[test]
    fn test_corrupted_items_refused() {
        let svc = service(6);
        let mut item = cuirass();
        let corrupted = svc.simulate_crafting(&item, VAAL).unwrap().result_item.unwrap();
        assert!(corrupted.corrupted);
        item.corrupted = true;
        let response = svc.simulate_crafting(&item, TRANSMUTATION).unwrap();
        assert_eq!(response.message, "Corrupted items cannot be modified");
        assert!(svc.available_currencies(&item).unwrap().is_empty());
    }

    #[test]
    fn test_available_currencies_follow_rarity() {
        let svc = service(7);
        let currencies = svc.available_currencies(&cuirass()).unwrap();
        assert!(currencies.contains(&TRANSMUTATION.to_string()));
        assert!(currencies.contains(&VAAL.to_string()));
        assert!(!currencies.contains(&EXALTED.to_string()));
        assert!(!currencies.contains(&ANNULMENT.to_string()));
    }

    #[test]
    fn test_bone_then_reveal() {
        let svc = service(8);
        let start = rare(&cuirass(), &svc);
        let boned = svc.simulate_crafting(&start, GNAWED_JAWBONE).unwrap().result_item.unwrap();
        assert_eq!(boned.unrevealed.len(), 1);
        let id = boned.unrevealed[0].id.clone();
        assert!(boned.placeholder_position(&id).is_some());

        let offer = svc.reveal_modifier(&id, &boned, &[ABYSSAL_ECHOES.to_string()]).unwrap();
        assert!(!offer.choices.is_empty() && offer.choices.len() <= REVEAL_CHOICES);
        assert!(offer.has_reroll_omen);
        assert!(offer.choices.iter().all(|m| m.values_in_range()));

        let plain = svc.reveal_modifier(&id, &boned, &[]).unwrap();
        assert!(!plain.has_reroll_omen);
    }

    #[test]
    fn test_reveal_honours_required_tag() {
        let svc = service(9);
        let mut item = cuirass();
        item.push_affix(Modifier::placeholder("u1", ModClass::Prefix));
        item.unrevealed.push(UnrevealedModifier {
            id: "u1".to_string(),
            class: ModClass::Prefix,
            required_tag: Some("ulaman".to_string()),
            bones: vec![GNAWED_JAWBONE.to_string()],
        });

        let offer = svc.reveal_modifier("u1", &item, &[]).unwrap();
        assert_eq!(offer.choices.len(), 1);
        assert_eq!(offer.choices[0].name, "Ulaman's");
        assert!(svc.reveal_modifier("u9", &item, &[]).is_err());
    }

    #[test]
    fn test_session_end_to_end() {
        let data = DataManager::default();
        let config = Config { rng_seed: Some(10), ..Config::default() };
        let svc = OfflineService::new(&data, &config);
        let mut session = CraftingSession::new(data.exclusion_catalog(), &config);
        session.apply(Command::SelectBase(cuirass())).unwrap();

        for currency in [TRANSMUTATION, REGAL, EXALTED, EXALTED] {
            session.select_currency(currency);
            session.craft(&svc).unwrap();
        }
        assert_eq!(session.item().map(|i| i.affix_count()), Some(4));
        assert_eq!(session.history().len(), 4);

        session.select_currency(TRANSMUTATION);
        assert!(matches!(session.craft(&svc), Err(CraftError::ServiceRejection(_))));
        assert_eq!(session.history().len(), 4);

        session.retry_last(&svc).unwrap();
        assert_eq!(session.history().len(), 4);
        assert_eq!(session.item().map(|i| i.affix_count()), Some(4));

        for _ in 0..4 {
            session.apply(Command::Undo).unwrap();
        }
        assert_eq!(session.item().map(|i| i.affix_count()), Some(0));
        assert_eq!(session.item().map(|i| i.rarity), Some(Rarity::Normal));
    }
}
