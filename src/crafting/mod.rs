//! Crafting engine
//!
//! The session that owns the item being crafted, its undo/redo/retry
//! history and the reveal flow, plus the service seam crafts go through.

pub mod error;
pub mod history;
pub mod offline;
pub mod reveal;
pub mod service;
pub mod session;

pub use error::{CraftError, ServiceError, ValidationError};
pub use history::{ActionHistory, ActionKind, CraftAction, HistoryEntry, RedoFrame};
pub use offline::OfflineService;
pub use reveal::{RevealCoordinator, RevealOffer, RevealOutcome, RevealState};
pub use service::{CatalogService, CraftResponse, CraftingService, RevealResponse};
pub use session::{Command, CraftKind, CraftingSession, PendingCraft};
