//! Desk errors

use thiserror::Error;
use turnaround_core::{CoreError, LedgerError};
use turnaround_domain::TurnaroundError;

#[derive(Debug, Error)]
pub enum DeskError {
    /// The turnaround rejected the operation
    #[error(transparent)]
    Turnaround(#[from] TurnaroundError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Audit payload error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Unknown turnaround: {0}")]
    UnknownTurnaround(String),

    #[error("Turnaround already exists: {0}")]
    DuplicateTurnaround(String),

    /// No ledger configured, or its lock was poisoned
    #[error("Ledger mirror unavailable: {0}")]
    MirrorUnavailable(String),

    /// A mirrored entry does not describe the record it claims to
    #[error("Ledger entry mismatch: {0}")]
    EntryMismatch(String),
}

impl DeskError {
    /// The domain rejection, if this is one
    pub fn as_turnaround(&self) -> Option<&TurnaroundError> {
        match self {
            DeskError::Turnaround(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;
