//! Turnaround desk
//!
//! Async service layer over the turnaround domain: per-turnaround locking,
//! durable mirroring of audit records into the SQLite ledger, restore after
//! restart and reputation badge issuance.

pub mod badges;
pub mod desk;
pub mod error;
pub mod handle;
pub mod mirror;

pub use badges::{Badge, BadgeIssuer};
pub use desk::TurnaroundDesk;
pub use error::{DeskError, Result};
pub use handle::TurnaroundHandle;
pub use mirror::SharedLedger;
