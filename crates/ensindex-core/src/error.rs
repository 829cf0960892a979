//! Error types for the ensindex pipeline.

use thiserror::Error;

/// Errors that can occur while reconciling registrar events.
///
/// Everything except [`IndexerError::ControllerNotFound`] is fatal: the unit of
/// work is rolled back and ingestion for the chain halts. Missing pricing or
/// referral facts are never errors; they are modelled as data
/// (`Pricing::Unknown`, `Referral::NotApplicable`).
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Registration lifecycle already exists for node {node} in subregistry {subregistry}")]
    LifecycleAlreadyExists { subregistry: String, node: String },

    #[error("No registration lifecycle for node {node} in subregistry {subregistry}")]
    LifecycleNotFound { subregistry: String, node: String },

    #[error("No pending correlation for logical event key {key}")]
    CorrelationMissing { key: String },

    #[error("Registrar action {id} resolved from {key} does not exist")]
    ActionMissing { id: String, key: String },

    #[error("Registrar action {id} cannot be patched: {reason}")]
    ActionMismatch { id: String, reason: String },

    #[error("Registrar action {id} violates an invariant: {reason}")]
    InvariantViolation { id: String, reason: String },

    #[error("Controller {controller} is not known on chain {chain_id}")]
    ControllerNotFound { chain_id: u64, controller: String },

    #[error("Invalid '{event}' event: {reason}")]
    InvalidEvent { event: String, reason: String },

    #[error("Out-of-order event on chain {chain_id}: {current} delivered after {previous}")]
    OutOfOrder {
        chain_id: u64,
        previous: String,
        current: String,
    },

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if ingestion must halt on this error.
    ///
    /// Coverage gaps (a removed controller we never saw added) are logged and
    /// skipped; every other kind means derived data would be corrupted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ControllerNotFound { .. })
    }

    /// Shorthand for an adapter decode failure.
    pub fn invalid_event(event: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            event: event.to_string(),
            reason: reason.into(),
        }
    }
}
