//! Action history
//!
//! One append-only log of committed mutations, each carrying the item as it
//! was *before* the mutation, plus a redo buffer of undone entries. Because
//! description, snapshot and replay data live in one entry they cannot drift
//! out of step.

use serde::{Deserialize, Serialize};

use crate::items::Item;

/// A currency application that can be replayed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CraftAction {
    pub currency: String,
    #[serde(default)]
    pub omens: Vec<String>,
}

impl CraftAction {
    pub fn new(currency: impl Into<String>, omens: impl IntoIterator<Item = String>) -> Self {
        let mut omens: Vec<String> = omens.into_iter().collect();
        omens.sort();
        omens.dedup();
        Self { currency: currency.into(), omens }
    }

    /// "Exalted Orb" or "Exalted Orb + Omen of ..."
    pub fn label(&self) -> String {
        if self.omens.is_empty() {
            self.currency.clone()
        } else {
            format!("{} + {}", self.currency, self.omens.join(", "))
        }
    }
}

/// What produced a history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Currency-driven; the only kind that can be retried
    Craft(CraftAction),
    /// Manual add or remove
    Manual,
    /// Unrevealed modifier resolved
    Reveal,
    /// Item stripped back to its base
    Reset,
}

impl ActionKind {
    pub fn replay(&self) -> Option<&CraftAction> {
        match self {
            ActionKind::Craft(action) => Some(action),
            _ => None,
        }
    }
}

/// One committed mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the log
    pub ordinal: usize,
    pub description: String,
    /// Item before the mutation
    pub snapshot: Item,
    pub action: ActionKind,
}

/// An undone entry and the item undo stepped back from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedoFrame {
    pub entry: HistoryEntry,
    pub item: Item,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionHistory {
    entries: Vec<HistoryEntry>,
    redo: Vec<RedoFrame>,
}

impl ActionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn redo_frames(&self) -> &[RedoFrame] {
        &self.redo
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Replay data of the most recent entry, if it is retryable
    pub fn last_replay(&self) -> Option<&CraftAction> {
        self.entries.last().and_then(|e| e.action.replay())
    }

    /// Record a mutation. `before` is the item prior to it. Invalidates redo.
    pub fn commit(&mut self, before: Item, description: impl Into<String>, action: ActionKind) -> usize {
        let ordinal = self.entries.len();
        let description = description.into();
        log::info!("history #{}: {}", ordinal, description);
        self.entries.push(HistoryEntry { ordinal, description, snapshot: before, action });
        self.redo.clear();
        ordinal
    }

    /// Step back one entry, restoring its snapshot into `current`
    pub fn undo(&mut self, current: &mut Item) -> bool {
        let Some(entry) = self.entries.pop() else {
            return false;
        };
        let after = std::mem::replace(current, entry.snapshot.clone());
        log::debug!("undo #{}: {}", entry.ordinal, entry.description);
        self.redo.push(RedoFrame { entry, item: after });
        true
    }

    /// Re-apply the most recently undone entry
    pub fn redo(&mut self, current: &mut Item) -> bool {
        let Some(RedoFrame { mut entry, item }) = self.redo.pop() else {
            return false;
        };
        entry.snapshot = std::mem::replace(current, item);
        entry.ordinal = self.entries.len();
        log::debug!("redo #{}: {}", entry.ordinal, entry.description);
        self.entries.push(entry);
        true
    }

    /// Keep entries `0..=index`, restore the snapshot at `index` and drop redo
    pub fn revert_to_step(&mut self, index: usize, current: &mut Item) -> bool {
        let Some(entry) = self.entries.get(index) else {
            return false;
        };
        *current = entry.snapshot.clone();
        self.entries.truncate(index + 1);
        self.redo.clear();
        log::info!("reverted to step #{}", index);
        true
    }

    /// Rewrite the last entry after a retry. The snapshot (the state the
    /// retry started from) is unchanged, so history length stays the same.
    pub fn replace_last(&mut self, description: impl Into<String>) -> bool {
        let Some(last) = self.entries.last_mut() else {
            return false;
        };
        last.description = description.into();
        self.redo.clear();
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quality: i32) -> Item {
        let mut item = Item::new("Iron Cuirass", "body_armour");
        item.quality = quality;
        item
    }

    /// Commit a mutation that bumps quality by one
    fn bump(history: &mut ActionHistory, current: &mut Item, action: ActionKind) {
        let before = current.clone();
        current.quality += 1;
        history.commit(before, format!("q{}", current.quality), action);
    }

    #[test]
    fn test_n_commits_then_n_undos() {
        let mut history = ActionHistory::new();
        let original = item(0);
        let mut current = original.clone();
        for _ in 0..5 {
            bump(&mut history, &mut current, ActionKind::Manual);
        }
        assert_eq!(history.len(), 5);

        for _ in 0..5 {
            assert!(history.undo(&mut current));
        }
        assert_eq!(current, original);
        assert!(history.is_empty());
        assert_eq!(history.redo_frames().len(), 5);
        assert!(!history.undo(&mut current));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut history = ActionHistory::new();
        let mut current = item(0);
        bump(&mut history, &mut current, ActionKind::Craft(CraftAction::new("Chaos Orb", Vec::new())));
        let committed = current.clone();
        let entries = history.entries().to_vec();

        assert!(history.undo(&mut current));
        assert!(history.redo(&mut current));
        assert_eq!(current, committed);
        assert_eq!(history.entries(), entries.as_slice());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut history = ActionHistory::new();
        let mut current = item(0);
        bump(&mut history, &mut current, ActionKind::Manual);
        bump(&mut history, &mut current, ActionKind::Manual);
        history.undo(&mut current);
        assert!(history.can_redo());

        bump(&mut history, &mut current, ActionKind::Manual);
        assert!(!history.can_redo());
        assert!(!history.redo(&mut current));
    }

    #[test]
    fn test_revert_to_step() {
        let mut history = ActionHistory::new();
        let mut current = item(0);
        for _ in 0..4 {
            bump(&mut history, &mut current, ActionKind::Manual);
        }
        history.undo(&mut current);

        assert!(history.revert_to_step(1, &mut current));
        assert_eq!(history.len(), 2);
        assert_eq!(current.quality, 1);
        assert!(!history.can_redo());
        assert!(!history.revert_to_step(7, &mut current));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_last_replay_only_for_crafts() {
        let mut history = ActionHistory::new();
        let mut current = item(0);
        bump(&mut history, &mut current, ActionKind::Craft(CraftAction::new("Exalted Orb", vec!["b".to_string(), "a".to_string()])));
        assert_eq!(history.last_replay().map(|a| a.omens.clone()), Some(vec!["a".to_string(), "b".to_string()]));

        bump(&mut history, &mut current, ActionKind::Reveal);
        assert!(history.last_replay().is_none());
    }

    #[test]
    fn test_replace_last_keeps_length_and_snapshot() {
        let mut history = ActionHistory::new();
        let mut current = item(0);
        bump(&mut history, &mut current, ActionKind::Craft(CraftAction::new("Chaos Orb", Vec::new())));
        let snapshot = history.last().map(|e| e.snapshot.clone());

        assert!(history.replace_last("Chaos Orb (retried)"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last().map(|e| e.snapshot.clone()), snapshot);
        assert_eq!(history.last().map(|e| e.description.as_str()), Some("Chaos Orb (retried)"));
    }
}
