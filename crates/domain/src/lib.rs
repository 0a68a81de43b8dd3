//! Turnaround domain
//!
//! Pure state machine for one aircraft turnaround, with no I/O:
//! - Task lifecycle and the fixed 27-task registry
//! - Role assignment, privilege tiers and authorization
//! - KPI aggregation and certification sealing
//! - Append-only audit log and replay from it

pub mod access;
pub mod audit;
pub mod certification;
pub mod error;
pub mod kpi;
pub mod policy;
pub mod projection;
pub mod role;
pub mod task;
pub mod template;
pub mod turnaround;

pub use access::{AccessControl, AuthorizationGuard, RoleAssignment};
pub use audit::{AuditEvent, AuditLog, AuditRecord};
pub use certification::{
    CertificationHash, CertificationHashInput, CertificationRecord, CertificationSealer,
};
pub use error::{Requirement, Result, TurnaroundError};
pub use kpi::{role_outcomes, KpiReport, KpiSnapshot, RoleOutcome};
pub use policy::MutationPolicy;
pub use projection::TurnaroundSnapshot;
pub use role::{Identity, Privilege, Role, Timestamp};
pub use task::{Task, TaskDefinition, TaskId, TaskRegistry, TaskStatus, TASK_COUNT};
pub use template::{FixedIntervalTemplate, StandardTemplate, TaskTemplate};
pub use turnaround::{Turnaround, TurnaroundHeader};
