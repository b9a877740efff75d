//! Crafting error taxonomy
//!
//! Every variant leaves the session's item and history untouched.

use std::time::Duration;

use crate::items::{ModClass, Rejection};

/// Failures reaching or reading the external services
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Problems caught locally, before anything reaches the network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no base item selected")]
    NoBase,
    #[error("no currency selected")]
    NoCurrency,
    #[error("item is corrupted and cannot be modified")]
    Corrupted,
    #[error("cannot add modifier: {0}")]
    Incompatible(#[from] Rejection),
    #[error("no {} at position {index}", .class.name())]
    NoSuchModifier { class: ModClass, index: usize },
    #[error("history step {0} does not exist")]
    NoSuchStep(usize),
    #[error("no unrevealed modifier with id {0}")]
    NoSuchUnrevealed(String),
    #[error("a reveal is already in progress")]
    RevealInProgress,
    #[error("no reveal in progress")]
    NoReveal,
    #[error("choice {0} does not exist")]
    NoSuchChoice(usize),
    #[error("reroll is not available")]
    RerollUnavailable,
}

/// Errors surfaced by the crafting session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CraftError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The service answered `success: false`; the message is shown verbatim
    #[error("{0}")]
    ServiceRejection(String),
    #[error("crafting service unavailable ({0})")]
    Transport(#[from] ServiceError),
    #[error("the item changed while the request was in flight; the result was discarded")]
    RaceInvalidation,
    #[error("a crafting request is already in flight")]
    Busy,
    #[error("the last action cannot be retried")]
    NothingToRetry,
    #[error("response for an expired request ignored")]
    StaleTicket,
}

impl From<Rejection> for CraftError {
    fn from(r: Rejection) -> Self {
        CraftError::Validation(ValidationError::Incompatible(r))
    }
}
