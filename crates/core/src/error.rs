//! Core error types

use thiserror::Error;

/// Core error type for the turnaround ledger infrastructure
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be parsed or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable ledger failure
    #[cfg(feature = "ledger")]
    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
