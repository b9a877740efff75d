//! Crafting session
//!
//! The aggregate that owns the live item and its history, and the single
//! place every mutation goes through.
//!
//! Currency crafts are two-phase to match the event-driven flow of a UI:
//! [`CraftingSession::begin_craft`] validates and hands back a
//! [`PendingCraft`] describing the request, and
//! [`CraftingSession::finish_craft`] consumes the service's answer. Only one
//! request may be in flight. History-mutating commands are refused while it
//! is; plain edits such as quality are not, and are caught by comparing item
//! fingerprints when the answer arrives.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use super::error::{CraftError, ServiceError, ValidationError};
use super::history::{ActionHistory, ActionKind, CraftAction};
use super::reveal::{RevealCoordinator, RevealOffer};
use super::service::{CraftResponse, CraftingService};
use crate::config::Config;
use crate::items::{can_add, ExclusionCatalog, Item, ModClass, Modifier, ModifierChoice, ModifierPool};

/// History-affecting operations
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start over on a new item; clears history
    SelectBase(Item),
    AddModifier(Modifier),
    RemoveModifier { class: ModClass, index: usize },
    Undo,
    Redo,
    RevertTo(usize),
    /// Strip the item back to its base (undoable)
    Reset,
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftKind {
    /// New history entry
    Fresh,
    /// Re-run of the last entry from its snapshot
    Retry,
}

/// A crafting request that has been issued and not yet answered
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCraft {
    ticket: u64,
    kind: CraftKind,
    /// Item the request runs against
    start: Item,
    /// Live item at issue time
    fingerprint: String,
    action: CraftAction,
    issued_at: Instant,
}

impl PendingCraft {
    pub fn item(&self) -> &Item {
        &self.start
    }

    pub fn action(&self) -> &CraftAction {
        &self.action
    }

    pub fn kind(&self) -> CraftKind {
        self.kind
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    /// Send the request to `service`
    pub fn dispatch<S: CraftingService + ?Sized>(&self, service: &S) -> Result<CraftResponse, ServiceError> {
        if self.action.omens.is_empty() {
            service.simulate_crafting(&self.start, &self.action.currency)
        } else {
            service.simulate_crafting_with_omens(&self.start, &self.action.currency, &self.action.omens)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    issued_at: Instant,
}

pub struct CraftingSession {
    item: Option<Item>,
    history: ActionHistory,
    reveal: RevealCoordinator,
    catalog: ExclusionCatalog,
    selected_currency: Option<String>,
    active_omens: BTreeSet<String>,
    currency_usage: BTreeMap<String, u32>,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    request_timeout: Duration,
}

impl CraftingSession {
    pub fn new(catalog: ExclusionCatalog, config: &Config) -> Self {
        Self {
            item: None,
            history: ActionHistory::new(),
            reveal: RevealCoordinator::new(config.reroll_omen.clone()),
            catalog,
            selected_currency: None,
            active_omens: BTreeSet::new(),
            currency_usage: BTreeMap::new(),
            in_flight: None,
            next_ticket: 1,
            request_timeout: config.request_timeout(),
        }
    }

    // ===== Accessors =====

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn catalog(&self) -> &ExclusionCatalog {
        &self.catalog
    }

    pub fn selected_currency(&self) -> Option<&str> {
        self.selected_currency.as_deref()
    }

    pub fn active_omens(&self) -> &BTreeSet<String> {
        &self.active_omens
    }

    pub fn currency_usage(&self) -> &BTreeMap<String, u32> {
        &self.currency_usage
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn reveal_offer(&self) -> Option<&RevealOffer> {
        self.reveal.offer()
    }

    pub fn can_retry(&self) -> bool {
        !self.is_busy() && self.history.last_replay().is_some()
    }

    // ===== Selection =====

    pub fn select_currency(&mut self, currency: impl Into<String>) {
        self.selected_currency = Some(currency.into());
    }

    pub fn clear_currency(&mut self) {
        self.selected_currency = None;
    }

    /// Toggle an omen; returns whether it is now active
    pub fn toggle_omen(&mut self, omen: impl Into<String>) -> bool {
        let omen = omen.into();
        if self.active_omens.remove(&omen) {
            false
        } else {
            self.active_omens.insert(omen);
            true
        }
    }

    pub fn clear_omens(&mut self) {
        self.active_omens.clear();
    }

    // ===== Non-history edits =====

    pub fn set_quality(&mut self, quality: i32) -> Result<(), CraftError> {
        self.live_mut()?.set_quality(quality);
        Ok(())
    }

    pub fn set_item_level(&mut self, level: u8) -> Result<(), CraftError> {
        self.live_mut()?.item_level = level.clamp(1, 100);
        Ok(())
    }

    /// Catalog choices annotated against the live item
    pub fn available_choices(&self, pool: &ModifierPool) -> Result<Vec<ModifierChoice>, CraftError> {
        Ok(pool.annotate(self.live()?, &self.catalog))
    }

    // ===== Commands =====

    /// Apply a history-affecting command
    pub fn apply(&mut self, command: Command) -> Result<(), CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        match command {
            Command::SelectBase(mut item) => {
                self.ingest(&mut item);
                log::info!("selected base {} ({})", item.base_name, item.category);
                self.item = Some(item);
                self.history.clear();
                self.reveal.cancel();
            }
            Command::AddModifier(modifier) => self.add_modifier(modifier)?,
            Command::RemoveModifier { class, index } => {
                self.remove_modifier(class, index)?;
                self.drop_reveal();
            }
            Command::Undo => {
                let Some(item) = self.item.as_mut() else {
                    return Ok(());
                };
                self.history.undo(item);
                self.drop_reveal();
            }
            Command::Redo => {
                let Some(item) = self.item.as_mut() else {
                    return Ok(());
                };
                self.history.redo(item);
                self.drop_reveal();
            }
            Command::RevertTo(index) => {
                let item = self.item.as_mut().ok_or(ValidationError::NoBase)?;
                if !self.history.revert_to_step(index, item) {
                    return Err(ValidationError::NoSuchStep(index).into());
                }
                self.drop_reveal();
            }
            Command::Reset => {
                let item = self.item.as_mut().ok_or(ValidationError::NoBase)?;
                let before = item.clone();
                item.reset();
                self.history.commit(before, "Reset to base", ActionKind::Reset);
                self.drop_reveal();
            }
            Command::Clear => {
                self.history.clear();
                self.drop_reveal();
            }
        }
        Ok(())
    }

    fn add_modifier(&mut self, mut modifier: Modifier) -> Result<(), CraftError> {
        let item = self.item.as_ref().ok_or(ValidationError::NoBase)?;
        if item.corrupted {
            return Err(ValidationError::Corrupted.into());
        }
        can_add(&modifier, &item.prefixes, &item.suffixes, &self.catalog, &item.category).into_result()?;

        modifier.classify();
        modifier.exclusion_group = self.catalog.group_for(&modifier, &item.category).map(str::to_string);
        let description = format!("Added {} ({})", modifier.name, modifier.display_text());

        let before = item.clone();
        let item = self.live_mut()?;
        item.push_affix(modifier);
        self.history.commit(before, description, ActionKind::Manual);
        Ok(())
    }

    fn remove_modifier(&mut self, class: ModClass, index: usize) -> Result<(), CraftError> {
        let item = self.item.as_mut().ok_or(ValidationError::NoBase)?;
        if item.corrupted {
            return Err(ValidationError::Corrupted.into());
        }
        let before = item.clone();
        let removed = item
            .remove_affix(class, index)
            .ok_or(ValidationError::NoSuchModifier { class, index })?;
        self.history.commit(before, format!("Removed {}", removed.name), ActionKind::Manual);
        Ok(())
    }

    // ===== Currency crafting =====

    /// Validate the selection and issue a craft against the live item
    pub fn begin_craft(&mut self) -> Result<PendingCraft, CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        if self.reveal.is_active() {
            return Err(ValidationError::RevealInProgress.into());
        }
        let item = self.live()?.clone();
        let currency = self.selected_currency.clone().ok_or(ValidationError::NoCurrency)?;
        let action = CraftAction::new(currency, self.active_omens.iter().cloned());
        Ok(self.issue(CraftKind::Fresh, item, action))
    }

    /// Re-issue the last replayable craft against the snapshot before it
    pub fn begin_retry(&mut self) -> Result<PendingCraft, CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        if self.reveal.is_active() {
            return Err(ValidationError::RevealInProgress.into());
        }
        self.live()?;
        let entry = self.history.last().ok_or(CraftError::NothingToRetry)?;
        let action = entry.action.replay().cloned().ok_or(CraftError::NothingToRetry)?;
        let start = entry.snapshot.clone();
        Ok(self.issue(CraftKind::Retry, start, action))
    }

    fn issue(&mut self, kind: CraftKind, start: Item, action: CraftAction) -> PendingCraft {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let issued_at = Instant::now();
        let fingerprint = self.item.as_ref().map(Item::fingerprint).unwrap_or_default();
        self.in_flight = Some(InFlight { ticket, issued_at });
        log::debug!("craft #{} issued: {} ({:?})", ticket, action.label(), kind);
        PendingCraft { ticket, kind, start, fingerprint, action, issued_at }
    }

    /// Settle an in-flight craft with the service's answer.
    ///
    /// Returns the service message on success. Every error leaves the item
    /// and history as they were.
    pub fn finish_craft(
        &mut self,
        pending: PendingCraft,
        response: Result<CraftResponse, ServiceError>,
    ) -> Result<String, CraftError> {
        match self.in_flight {
            Some(flight) if flight.ticket == pending.ticket => self.in_flight = None,
            _ => {
                log::warn!("ignoring response for stale craft #{}", pending.ticket);
                return Err(CraftError::StaleTicket);
            }
        }

        let response = response.map_err(|e| {
            log::warn!("{} failed: {}", pending.action.label(), e);
            CraftError::Transport(e)
        })?;
        if pending.issued_at.elapsed() > self.request_timeout {
            log::warn!("{} answered after the timeout; discarded", pending.action.label());
            return Err(ServiceError::Timeout(self.request_timeout).into());
        }
        if !response.success {
            log::info!("{} rejected: {}", pending.action.label(), response.message);
            return Err(CraftError::ServiceRejection(response.message));
        }
        let Some(mut result) = response.result_item else {
            return Err(ServiceError::Malformed("success without a result item".to_string()).into());
        };

        let live = self.item.as_ref().ok_or(ValidationError::NoBase)?;
        if live.fingerprint() != pending.fingerprint {
            log::warn!("item changed while {} was in flight; result discarded", pending.action.label());
            return Err(CraftError::RaceInvalidation);
        }

        self.ingest(&mut result);
        let description = if response.message.is_empty() {
            pending.action.label()
        } else {
            format!("{}: {}", pending.action.label(), response.message)
        };
        match pending.kind {
            CraftKind::Fresh => {
                self.history.commit(pending.start, description, ActionKind::Craft(pending.action.clone()));
                self.active_omens.clear();
            }
            CraftKind::Retry => {
                self.history.replace_last(format!("{} (retried)", description));
            }
        }
        self.item = Some(result);
        *self.currency_usage.entry(pending.action.currency).or_insert(0) += 1;
        Ok(response.message)
    }

    /// Give up on a request that has outlived the timeout. Returns the
    /// timeout error when one was expired.
    pub fn expire_pending(&mut self, now: Instant) -> Option<CraftError> {
        let flight = self.in_flight?;
        if now.saturating_duration_since(flight.issued_at) <= self.request_timeout {
            return None;
        }
        log::warn!("craft #{} timed out", flight.ticket);
        self.in_flight = None;
        Some(ServiceError::Timeout(self.request_timeout).into())
    }

    /// Apply the selected currency and omens through `service`
    pub fn craft<S: CraftingService + ?Sized>(&mut self, service: &S) -> Result<String, CraftError> {
        let pending = self.begin_craft()?;
        let response = pending.dispatch(service);
        self.finish_craft(pending, response)
    }

    /// Re-roll the last craft with fresh randomness, replacing it in place
    pub fn retry_last<S: CraftingService + ?Sized>(&mut self, service: &S) -> Result<String, CraftError> {
        let pending = self.begin_retry()?;
        let response = pending.dispatch(service);
        self.finish_craft(pending, response)
    }

    // ===== Reveal =====

    pub fn request_reveal<S: CraftingService + ?Sized>(
        &mut self,
        service: &S,
        unrevealed_id: &str,
    ) -> Result<&RevealOffer, CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        let item = self.item.as_ref().ok_or(ValidationError::NoBase)?;
        let omens: Vec<String> = self.active_omens.iter().cloned().collect();
        self.reveal.request(service, unrevealed_id, item, &omens)
    }

    pub fn reroll_reveal<S: CraftingService + ?Sized>(&mut self, service: &S) -> Result<&RevealOffer, CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        let item = self.item.as_ref().ok_or(ValidationError::NoBase)?;
        self.reveal.reroll(service, item, &self.active_omens)
    }

    /// Resolve the pending reveal with choice `index` and commit it
    pub fn select_reveal(&mut self, index: usize) -> Result<(), CraftError> {
        if self.is_busy() {
            return Err(CraftError::Busy);
        }
        let item = self.item.as_ref().ok_or(ValidationError::NoBase)?;
        let outcome = self.reveal.select(index, item)?;
        let before = item.clone();

        let mut next = outcome.item;
        self.ingest(&mut next);
        self.history.commit(before, outcome.description, ActionKind::Reveal);
        self.item = Some(next);
        if outcome.consumed_omen {
            self.active_omens.remove(self.reveal.reroll_omen());
        }
        Ok(())
    }

    pub fn cancel_reveal(&mut self) -> bool {
        self.reveal.cancel()
    }

    /// An offer never outlives a history change; the placeholder it
    /// targets may be gone.
    fn drop_reveal(&mut self) {
        if self.reveal.cancel() {
            log::debug!("reveal offer dropped by history change");
        }
    }

    // ===== Persistence =====

    /// Replace the whole session state (used when loading a save)
    pub fn restore(&mut self, item: Option<Item>, history: ActionHistory, usage: BTreeMap<String, u32>) {
        let mut item = item;
        if let Some(item) = item.as_mut() {
            self.ingest(item);
        }
        self.item = item;
        self.history = history;
        self.currency_usage = usage;
        self.in_flight = None;
        self.reveal.cancel();
        self.active_omens.clear();
    }

    // ===== Helpers =====

    fn live(&self) -> Result<&Item, CraftError> {
        self.item.as_ref().ok_or_else(|| ValidationError::NoBase.into())
    }

    fn live_mut(&mut self) -> Result<&mut Item, CraftError> {
        self.item.as_mut().ok_or_else(|| ValidationError::NoBase.into())
    }

    /// Normalise item data coming from outside: typed stat effects,
    /// exclusion groups, rarity floor and derived stats.
    fn ingest(&self, item: &mut Item) {
        item.classify_modifiers();
        let category = item.category.clone();
        self.catalog.annotate(&mut item.prefixes, &category);
        self.catalog.annotate(&mut item.suffixes, &category);
        item.promote_rarity();
        item.refresh_stats();
    }
}
