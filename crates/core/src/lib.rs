//! Core infrastructure for the turnaround certification ledger.
//!
//! This crate provides the ambient pieces shared by every other crate in the
//! workspace: error types, TOML configuration, structured logging setup and
//! the durable, hash-chained audit ledger that mirrors turnaround events.

pub mod config;
pub mod error;
#[cfg(feature = "ledger")]
pub mod ledger;
pub mod logging;

pub use config::{Config, LedgerConfig, LoggingConfig, PolicyConfig};
pub use error::{CoreError, Result};
#[cfg(feature = "ledger")]
pub use ledger::{
    AuditLedger, EntryDraft, LedgerEntry, LedgerError, LedgerHealth, LedgerHealthInfo,
    LedgerMetrics, GENESIS_HASH,
};
