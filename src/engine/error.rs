use ulid::Ulid;

use crate::model::BookingStatus;
use crate::notify::NotifyError;
use crate::pricing::PricingError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed or missing input; nothing was persisted.
    Validation(&'static str),
    /// Walker double-booking; the id is the committed booking in the way.
    Conflict(Ulid),
    NotFound(Ulid),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    /// Pricing or notification failure; booking state is unaffected.
    Downstream(String),
    /// Persistence failure that survived the retry budget.
    Storage(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::Conflict(id) => write!(f, "conflict with committed booking: {id}"),
            EngineError::NotFound(id) => write!(f, "booking not found: {id}"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid transition: {} -> {}", from.as_str(), to.as_str())
            }
            EngineError::Downstream(msg) => write!(f, "downstream service failed: {msg}"),
            EngineError::Storage(msg) => write!(f, "storage failed: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => EngineError::NotFound(id),
            StoreError::VersionConflict(id) => {
                EngineError::Storage(format!("stale write for booking {id}"))
            }
            StoreError::Unavailable(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<PricingError> for EngineError {
    fn from(e: PricingError) -> Self {
        EngineError::Downstream(e.to_string())
    }
}

impl From<NotifyError> for EngineError {
    fn from(e: NotifyError) -> Self {
        EngineError::Downstream(e.to_string())
    }
}
