//! Append-only audit trail of turnaround transitions
//!
//! Every accepted mutation appends exactly one [`AuditRecord`]; rejected calls
//! append nothing. Sequence numbers start at zero and have no gaps, so a
//! consumer can detect a missing record by position alone.

use serde::{Deserialize, Serialize};

use crate::certification::CertificationHash;
use crate::role::{Identity, Privilege, Role, Timestamp};
use crate::task::{TaskDefinition, TaskId, TaskStatus};
use crate::turnaround::TurnaroundHeader;

/// One state transition, serialized with a `type` discriminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    TurnaroundCreated {
        header: TurnaroundHeader,
        tasks: Vec<TaskDefinition>,
        created_by: Identity,
    },
    RoleAssigned {
        role: Role,
        identity: Identity,
        assigned_by: Identity,
    },
    PrivilegeGranted {
        identity: Identity,
        privilege: Privilege,
        granted_by: Identity,
    },
    PrivilegeRevoked {
        identity: Identity,
        privilege: Privilege,
        revoked_by: Identity,
    },
    TaskCompleted {
        task_id: TaskId,
        role: Role,
        timestamp: Timestamp,
        status: TaskStatus,
        completed_by: Identity,
    },
    DelayJustified {
        task_id: TaskId,
        text: String,
        justified_by: Identity,
    },
    MandatoryTaskChanged {
        task_id: TaskId,
        mandatory: bool,
        changed_by: Identity,
    },
    TurnaroundCertified {
        actual_departure: Timestamp,
        sealed_at: Timestamp,
        on_time: u32,
        late: u32,
        late_unjustified: u32,
        hash: CertificationHash,
        certified_by: Identity,
    },
    BadgeIssued {
        role: Role,
        identity: Identity,
    },
}

impl AuditEvent {
    /// Dotted event name used by ledger mirrors and log lines
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::TurnaroundCreated { .. } => "turnaround.created",
            AuditEvent::RoleAssigned { .. } => "role.assigned",
            AuditEvent::PrivilegeGranted { .. } => "privilege.granted",
            AuditEvent::PrivilegeRevoked { .. } => "privilege.revoked",
            AuditEvent::TaskCompleted { .. } => "task.completed",
            AuditEvent::DelayJustified { .. } => "task.delay_justified",
            AuditEvent::MandatoryTaskChanged { .. } => "task.mandatory_changed",
            AuditEvent::TurnaroundCertified { .. } => "turnaround.certified",
            AuditEvent::BadgeIssued { .. } => "badge.issued",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the log, starting at 0
    pub seq: u64,
    pub recorded_at: Timestamp,
    pub event: AuditEvent,
}

/// Ordered record sequence owned by one turnaround
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, recorded_at: Timestamp, event: AuditEvent) -> &AuditRecord {
        let seq = self.records.len() as u64;
        self.records.push(AuditRecord {
            seq,
            recorded_at,
            event,
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Records with `seq >= from`, empty when `from` is past the end
    pub fn since(&self, from: u64) -> &[AuditRecord] {
        let start = usize::try_from(from)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&AuditRecord> {
        self.records.last()
    }
}
