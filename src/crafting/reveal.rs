//! Reveal protocol
//!
//! Unrevealed placeholders are resolved in two steps: the service offers a
//! handful of already-rolled candidates, then the operator picks one. With the
//! enhancing omen active the candidates may be rerolled once.

use std::collections::BTreeSet;

use super::error::{CraftError, ServiceError, ValidationError};
use super::service::CraftingService;
use crate::items::{Item, Modifier};

/// Candidates on offer for one placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct RevealOffer {
    pub unrevealed_id: String,
    pub choices: Vec<Modifier>,
    pub has_reroll_omen: bool,
    pub reroll_used: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RevealState {
    #[default]
    Idle,
    ChoicesPresented(RevealOffer),
}

/// Result of picking a candidate, ready to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct RevealOutcome {
    pub item: Item,
    pub description: String,
    /// The enhancing omen was spent on a reroll
    pub consumed_omen: bool,
}

#[derive(Debug, Clone)]
pub struct RevealCoordinator {
    state: RevealState,
    reroll_omen: String,
}

impl RevealCoordinator {
    pub fn new(reroll_omen: impl Into<String>) -> Self {
        Self { state: RevealState::Idle, reroll_omen: reroll_omen.into() }
    }

    pub fn state(&self) -> &RevealState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, RevealState::ChoicesPresented(_))
    }

    pub fn reroll_omen(&self) -> &str {
        &self.reroll_omen
    }

    pub fn offer(&self) -> Option<&RevealOffer> {
        match &self.state {
            RevealState::ChoicesPresented(offer) => Some(offer),
            RevealState::Idle => None,
        }
    }

    /// Ask the service for candidates. On any failure the state is unchanged.
    pub fn request<S: CraftingService + ?Sized>(
        &mut self,
        service: &S,
        unrevealed_id: &str,
        item: &Item,
        omens: &[String],
    ) -> Result<&RevealOffer, CraftError> {
        if self.is_active() {
            return Err(ValidationError::RevealInProgress.into());
        }
        if item.placeholder_position(unrevealed_id).is_none() {
            return Err(ValidationError::NoSuchUnrevealed(unrevealed_id.to_string()).into());
        }

        let (choices, has_reroll_omen) = fetch_choices(service, unrevealed_id, item, omens)?;
        log::info!("reveal {}: {} choices", unrevealed_id, choices.len());
        self.state = RevealState::ChoicesPresented(RevealOffer {
            unrevealed_id: unrevealed_id.to_string(),
            choices,
            has_reroll_omen,
            reroll_used: false,
        });
        match &self.state {
            RevealState::ChoicesPresented(offer) => Ok(offer),
            RevealState::Idle => Err(ValidationError::NoReveal.into()),
        }
    }

    /// Replace the candidates once, while the enhancing omen is active
    pub fn reroll<S: CraftingService + ?Sized>(
        &mut self,
        service: &S,
        item: &Item,
        active_omens: &BTreeSet<String>,
    ) -> Result<&RevealOffer, CraftError> {
        let omen_active = active_omens.contains(&self.reroll_omen);
        let RevealState::ChoicesPresented(offer) = &mut self.state else {
            return Err(ValidationError::NoReveal.into());
        };
        if !offer.has_reroll_omen || offer.reroll_used || !omen_active {
            return Err(ValidationError::RerollUnavailable.into());
        }

        let omens: Vec<String> = active_omens.iter().cloned().collect();
        let (choices, _) = fetch_choices(service, &offer.unrevealed_id, item, &omens)?;
        log::info!("reveal {}: rerolled into {} choices", offer.unrevealed_id, choices.len());
        offer.choices = choices;
        offer.reroll_used = true;
        Ok(offer)
    }

    /// Resolve the placeholder with candidate `index` and return to idle.
    ///
    /// The placeholder is replaced in place, so list lengths do not change.
    pub fn select(&mut self, index: usize, item: &Item) -> Result<RevealOutcome, CraftError> {
        let RevealState::ChoicesPresented(offer) = &self.state else {
            return Err(ValidationError::NoReveal.into());
        };
        let Some(choice) = offer.choices.get(index) else {
            return Err(ValidationError::NoSuchChoice(index).into());
        };
        let Some((class, position)) = item.placeholder_position(&offer.unrevealed_id) else {
            return Err(ValidationError::NoSuchUnrevealed(offer.unrevealed_id.clone()).into());
        };

        let mut resolved = choice.clone();
        resolved.class = class;
        resolved.unrevealed_id = None;
        let description = format!("Revealed {} ({})", resolved.name, resolved.display_text());

        let mut next = item.clone();
        next.affixes_mut(class)[position] = resolved;
        next.unrevealed.retain(|u| u.id != offer.unrevealed_id);
        next.promote_rarity();
        next.refresh_stats();

        let consumed_omen = offer.reroll_used;
        self.state = RevealState::Idle;
        Ok(RevealOutcome { item: next, description, consumed_omen })
    }

    /// Drop the candidates without touching the item
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = RevealState::Idle;
        was_active
    }
}

fn fetch_choices<S: CraftingService + ?Sized>(
    service: &S,
    unrevealed_id: &str,
    item: &Item,
    omens: &[String],
) -> Result<(Vec<Modifier>, bool), CraftError> {
    let response = service.reveal_modifier(unrevealed_id, item, omens).map_err(|e| {
        log::warn!("reveal {} failed: {}", unrevealed_id, e);
        CraftError::Transport(e)
    })?;
    if response.choices.is_empty() {
        return Err(ServiceError::Malformed("reveal returned no choices".to_string()).into());
    }
    let mut choices = response.choices;
    for choice in &mut choices {
        choice.classify();
    }
    Ok((choices, response.has_reroll_omen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use crate::crafting::service::{CraftResponse, RevealResponse};
    use crate::items::{ModClass, StatKind, StatRange, UnrevealedModifier};

    const ECHOES: &str = "Omen of Abyssal Echoes";

    struct ScriptedReveals {
        responses: RefCell<VecDeque<Result<RevealResponse, ServiceError>>>,
    }

    impl ScriptedReveals {
        fn new(responses: Vec<Result<RevealResponse, ServiceError>>) -> Self {
            Self { responses: RefCell::new(responses.into()) }
        }
    }

    impl CraftingService for ScriptedReveals {
        fn simulate_crafting_with_omens(&self, _: &Item, _: &str, _: &[String]) -> Result<CraftResponse, ServiceError> {
            Err(ServiceError::Transport("not scripted".to_string()))
        }

        fn reveal_modifier(&self, _: &str, _: &Item, _: &[String]) -> Result<RevealResponse, ServiceError> {
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(ServiceError::Transport("script exhausted".to_string())))
        }
    }

    fn choice(name: &str, value: i32) -> Modifier {
        Modifier::new(name, ModClass::Suffix, 1, "+{} to Evasion Rating", vec![StatRange::new(1, 99)], name)
            .with_values(vec![value])
    }

    fn offer(names: &[&str], reroll: bool) -> Result<RevealResponse, ServiceError> {
        Ok(RevealResponse {
            choices: names.iter().enumerate().map(|(i, n)| choice(n, 10 * (i as i32 + 1))).collect(),
            has_reroll_omen: reroll,
        })
    }

    fn item_with_placeholder() -> Item {
        let mut item = Item::new("Leather Vest", "body_armour").with_base_stat(StatKind::Evasion, 100);
        item.push_affix(Modifier::new("Agile", ModClass::Suffix, 1, "+{} to maximum Life", vec![StatRange::new(5, 5)], "Life"));
        item.push_affix(Modifier::placeholder("u1", ModClass::Suffix));
        item.unrevealed.push(UnrevealedModifier {
            id: "u1".to_string(),
            class: ModClass::Suffix,
            required_tag: Some("ulaman".to_string()),
            bones: vec!["Gnawed Jawbone".to_string()],
        });
        item
    }

    #[test]
    fn test_select_replaces_placeholder_in_place() {
        let service = ScriptedReveals::new(vec![offer(&["A", "B", "C"], false)]);
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let item = item_with_placeholder();

        coordinator.request(&service, "u1", &item, &[]).unwrap();
        let outcome = coordinator.select(1, &item).unwrap();

        assert_eq!(outcome.item.suffixes.len(), item.suffixes.len());
        assert_eq!(outcome.item.unrevealed.len(), item.unrevealed.len() - 1);
        assert_eq!(outcome.item.suffixes[1].name, "B");
        assert!(!outcome.item.suffixes[1].is_unresolved());
        assert_eq!(outcome.item.calculated_stats.get(&StatKind::Evasion), Some(&120));
        assert!(!outcome.consumed_omen);
        assert!(!coordinator.is_active());
    }

    #[test]
    fn test_reroll_once_with_omen() {
        let service = ScriptedReveals::new(vec![offer(&["A"], true), offer(&["X", "Y"], true)]);
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let item = item_with_placeholder();
        let omens: BTreeSet<String> = [ECHOES.to_string()].into_iter().collect();

        coordinator.request(&service, "u1", &item, &[]).unwrap();
        let rerolled = coordinator.reroll(&service, &item, &omens).unwrap();
        assert_eq!(rerolled.choices.len(), 2);

        let again = coordinator.reroll(&service, &item, &omens);
        assert_eq!(again.unwrap_err(), CraftError::Validation(ValidationError::RerollUnavailable));

        let outcome = coordinator.select(0, &item).unwrap();
        assert_eq!(outcome.item.suffixes[1].name, "X");
        assert!(outcome.consumed_omen);
    }

    #[test]
    fn test_reroll_requires_active_omen() {
        let service = ScriptedReveals::new(vec![offer(&["A"], true)]);
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let item = item_with_placeholder();

        coordinator.request(&service, "u1", &item, &[]).unwrap();
        assert!(coordinator.reroll(&service, &item, &BTreeSet::new()).is_err());
        assert!(coordinator.is_active());
    }

    #[test]
    fn test_failed_request_stays_idle() {
        let service = ScriptedReveals::new(vec![Err(ServiceError::Transport("down".to_string()))]);
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let item = item_with_placeholder();

        let err = coordinator.request(&service, "u1", &item, &[]).unwrap_err();
        assert!(matches!(err, CraftError::Transport(_)));
        assert!(!coordinator.is_active());
    }

    #[test]
    fn test_unknown_placeholder_rejected_locally() {
        let service = ScriptedReveals::new(Vec::new());
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let err = coordinator.request(&service, "nope", &item_with_placeholder(), &[]).unwrap_err();
        assert_eq!(err, CraftError::Validation(ValidationError::NoSuchUnrevealed("nope".to_string())));
    }

    #[test]
    fn test_cancel() {
        let service = ScriptedReveals::new(vec![offer(&["A"], false)]);
        let mut coordinator = RevealCoordinator::new(ECHOES);
        let item = item_with_placeholder();
        coordinator.request(&service, "u1", &item, &[]).unwrap();
        assert!(coordinator.cancel());
        assert!(!coordinator.cancel());
        assert!(coordinator.select(0, &item).is_err());
    }
}
