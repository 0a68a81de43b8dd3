//! Rebuilding turnaround state from its audit records
//!
//! Replay starts from the creation record and re-applies each transition,
//! checking every record against the state rebuilt so far. The result is a
//! [`Turnaround`] equal to the live one that produced the records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::access::{AccessControl, RoleAssignment};
use crate::audit::{AuditEvent, AuditLog, AuditRecord};
use crate::certification::{CertificationRecord, CertificationSealer};
use crate::error::{Result, TurnaroundError};
use crate::kpi::{KpiSnapshot, RoleOutcome};
use crate::policy::MutationPolicy;
use crate::role::{Privilege, Role};
use crate::task::{Task, TaskRegistry};
use crate::turnaround::{Turnaround, TurnaroundHeader};

fn diverged(seq: u64, detail: impl std::fmt::Display) -> TurnaroundError {
    TurnaroundError::ReplayDivergence(format!("record {}: {}", seq, detail))
}

impl Turnaround {
    /// Rebuild a turnaround from a complete record sequence
    pub fn replay(records: &[AuditRecord], policy: MutationPolicy) -> Result<Self> {
        let (first, rest) = records
            .split_first()
            .ok_or_else(|| TurnaroundError::ReplayDivergence("no records".to_string()))?;

        let mut turnaround = match &first.event {
            AuditEvent::TurnaroundCreated {
                header,
                tasks,
                created_by,
            } if first.seq == 0 => {
                header.validate().map_err(|e| diverged(0, e))?;
                let mut access = AccessControl::new();
                access.grant(created_by.clone(), Privilege::Administrative);
                access.grant(created_by.clone(), Privilege::Operational);
                Turnaround {
                    header: header.clone(),
                    tasks: TaskRegistry::from_slice(tasks)?,
                    roles: RoleAssignment::new(),
                    access,
                    certification: None,
                    badges: BTreeSet::new(),
                    policy,
                    audit: AuditLog::new(),
                }
            }
            _ => return Err(diverged(first.seq, "log must open with turnaround creation")),
        };
        turnaround.audit.append(first.recorded_at, first.event.clone());

        for record in rest {
            let expected = turnaround.audit.len() as u64;
            if record.seq != expected {
                return Err(diverged(
                    record.seq,
                    format!("expected sequence {}", expected),
                ));
            }
            turnaround.apply(record)?;
            turnaround.audit.append(record.recorded_at, record.event.clone());
        }

        Ok(turnaround)
    }

    fn apply(&mut self, record: &AuditRecord) -> Result<()> {
        let seq = record.seq;
        match &record.event {
            AuditEvent::TurnaroundCreated { .. } => {
                return Err(diverged(seq, "duplicate creation record"));
            }
            AuditEvent::RoleAssigned { role, identity, .. } => {
                self.roles.assign(*role, identity.clone());
            }
            AuditEvent::PrivilegeGranted {
                identity,
                privilege,
                ..
            } => {
                if !self.access.grant(identity.clone(), *privilege) {
                    return Err(diverged(seq, format!("{} already held {}", identity, privilege)));
                }
            }
            AuditEvent::PrivilegeRevoked {
                identity,
                privilege,
                ..
            } => {
                if !self.access.revoke(identity, *privilege) {
                    return Err(diverged(seq, format!("{} did not hold {}", identity, privilege)));
                }
            }
            AuditEvent::TaskCompleted {
                task_id,
                role,
                timestamp,
                status,
                completed_by,
            } => {
                if self.certification.is_some() {
                    return Err(diverged(seq, "completion after certification"));
                }
                let task = self.tasks.get(*task_id).map_err(|e| diverged(seq, e))?;
                if task.role != *role {
                    return Err(diverged(
                        seq,
                        format!("task {} belongs to {}, not {}", task_id, task.role, role),
                    ));
                }
                self.tasks
                    .restore_completion(*task_id, *status, *timestamp, completed_by.clone())
                    .map_err(|e| diverged(seq, e))?;
            }
            AuditEvent::DelayJustified { task_id, text, .. } => {
                self.tasks
                    .justify(*task_id, text.clone(), true)
                    .map_err(|e| diverged(seq, e))?;
            }
            AuditEvent::MandatoryTaskChanged {
                task_id, mandatory, ..
            } => {
                self.tasks
                    .set_mandatory(*task_id, *mandatory)
                    .map_err(|e| diverged(seq, e))?;
            }
            AuditEvent::TurnaroundCertified {
                actual_departure,
                sealed_at,
                on_time,
                late,
                late_unjustified,
                hash,
                certified_by,
            } => {
                if self.certification.is_some() {
                    return Err(diverged(seq, "second certification"));
                }
                let rebuilt_late = self.compute_kpis().late;
                if *late != rebuilt_late {
                    return Err(diverged(
                        seq,
                        format!("late count {} does not match rebuilt {}", late, rebuilt_late),
                    ));
                }
                let record = CertificationSealer::seal(
                    &self.header.off_chain_id,
                    &self.tasks,
                    certified_by.clone(),
                    *sealed_at,
                )
                .map_err(|e| diverged(seq, e))?;
                let claimed = CertificationRecord {
                    actual_departure: *actual_departure,
                    sealed_at: *sealed_at,
                    on_time: *on_time,
                    late_unjustified: *late_unjustified,
                    hash: *hash,
                    certified_by: certified_by.clone(),
                };
                if record != claimed {
                    return Err(diverged(
                        seq,
                        format!("sealed record {} does not match rebuilt {}", hash, record.hash),
                    ));
                }
                self.certification = Some(record);
            }
            AuditEvent::BadgeIssued { role, .. } => {
                if self.certification.is_none() {
                    return Err(diverged(seq, "badge before certification"));
                }
                if !self.badges.insert(*role) {
                    return Err(diverged(seq, format!("second badge for {}", role)));
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> TurnaroundSnapshot {
        TurnaroundSnapshot {
            header: self.header.clone(),
            tasks: self.tasks().to_vec(),
            roles: self.roles.clone(),
            certification: self.certification.clone(),
            kpis: self.compute_kpis(),
            role_outcomes: self.role_outcomes(),
            badges: self.badges.iter().copied().collect(),
            audit_records: self.audit.len() as u64,
        }
    }
}

/// Serializable read model of one turnaround
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnaroundSnapshot {
    pub header: TurnaroundHeader,
    pub tasks: Vec<Task>,
    pub roles: RoleAssignment,
    pub certification: Option<CertificationRecord>,
    pub kpis: KpiSnapshot,
    pub role_outcomes: Vec<RoleOutcome>,
    pub badges: Vec<Role>,
    pub audit_records: u64,
}
