//! The turnaround aggregate
//!
//! Owns the 27 tasks, the role assignment, privilege grants, the sealed
//! certification record and the audit log. Every mutation follows the same
//! path: validate preconditions and authorization, mutate, then append one
//! audit record. A rejected call returns before the first write.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::access::{AccessControl, AuthorizationGuard, RoleAssignment};
use crate::audit::{AuditEvent, AuditLog};
use crate::certification::{CertificationRecord, CertificationSealer};
use crate::error::{Result, TurnaroundError};
use crate::kpi::{self, KpiReport, KpiSnapshot, RoleOutcome};
use crate::policy::MutationPolicy;
use crate::role::{Identity, Privilege, Role, Timestamp};
use crate::task::{Task, TaskDefinition, TaskId, TaskRegistry, TaskStatus, TASK_COUNT};
use crate::template::TaskTemplate;

/// Immutable identifying data fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnaroundHeader {
    /// Opaque external reference, also bound into the certification hash
    pub off_chain_id: String,
    pub airport_code: String,
    pub scheduled_arrival: Timestamp,
    pub scheduled_departure: Timestamp,
}

impl TurnaroundHeader {
    pub fn new(
        off_chain_id: impl Into<String>,
        airport_code: impl Into<String>,
        scheduled_arrival: Timestamp,
        scheduled_departure: Timestamp,
    ) -> Result<Self> {
        let header = Self {
            off_chain_id: off_chain_id.into(),
            airport_code: airport_code.into(),
            scheduled_arrival,
            scheduled_departure,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduled_arrival >= self.scheduled_departure {
            return Err(TurnaroundError::InvalidSchedule {
                scheduled_arrival: self.scheduled_arrival,
                scheduled_departure: self.scheduled_departure,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turnaround {
    pub(crate) header: TurnaroundHeader,
    pub(crate) tasks: TaskRegistry,
    pub(crate) roles: RoleAssignment,
    pub(crate) access: AccessControl,
    pub(crate) certification: Option<CertificationRecord>,
    pub(crate) badges: BTreeSet<Role>,
    pub(crate) policy: MutationPolicy,
    pub(crate) audit: AuditLog,
}

impl Turnaround {
    /// Instantiate from a template. The creator holds both privilege tiers.
    pub fn create(
        header: TurnaroundHeader,
        template: &dyn TaskTemplate,
        created_by: Identity,
        now: Timestamp,
    ) -> Result<Self> {
        let definitions = template.generate_tasks(header.scheduled_arrival);
        Self::from_definitions(header, definitions, created_by, now)
    }

    pub fn from_definitions(
        header: TurnaroundHeader,
        definitions: [TaskDefinition; TASK_COUNT],
        created_by: Identity,
        now: Timestamp,
    ) -> Result<Self> {
        header.validate()?;

        let mut access = AccessControl::new();
        access.grant(created_by.clone(), Privilege::Administrative);
        access.grant(created_by.clone(), Privilege::Operational);

        let mut audit = AuditLog::new();
        audit.append(
            now,
            AuditEvent::TurnaroundCreated {
                header: header.clone(),
                tasks: definitions.to_vec(),
                created_by: created_by.clone(),
            },
        );

        info!(
            turnaround_id = %header.off_chain_id,
            airport = %header.airport_code,
            created_by = %created_by,
            "Turnaround created"
        );

        Ok(Self {
            header,
            tasks: TaskRegistry::new(definitions),
            roles: RoleAssignment::new(),
            access,
            certification: None,
            badges: BTreeSet::new(),
            policy: MutationPolicy::default(),
            audit,
        })
    }

    pub fn with_policy(mut self, policy: MutationPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn guard(&self) -> AuthorizationGuard<'_> {
        AuthorizationGuard::new(&self.roles, &self.access)
    }

    pub fn complete_task(
        &mut self,
        task_id: TaskId,
        caller: &Identity,
        now: Timestamp,
    ) -> Result<TaskStatus> {
        let task = self.tasks.get(task_id)?;
        if self.is_certified() {
            return Err(TurnaroundError::AlreadyCertified);
        }
        if task.is_completed() {
            return Err(TurnaroundError::AlreadyCompleted { task_id });
        }
        let role = task.role;
        self.guard().require_role(caller, role)?;

        let status = self.tasks.complete(task_id, caller.clone(), now)?;
        self.audit.append(
            now,
            AuditEvent::TaskCompleted {
                task_id,
                role,
                timestamp: now,
                status,
                completed_by: caller.clone(),
            },
        );

        debug!(
            turnaround_id = %self.header.off_chain_id,
            task_id,
            role = %role,
            status = ?status,
            "Task completed"
        );
        Ok(status)
    }

    pub fn justify_delay(
        &mut self,
        task_id: TaskId,
        caller: &Identity,
        text: impl Into<String>,
        now: Timestamp,
    ) -> Result<()> {
        let role = self.tasks.get(task_id)?.role;
        if self.is_certified() && !self.policy.allow_post_certification_justification {
            return Err(TurnaroundError::AlreadyCertified);
        }
        self.guard().require_role(caller, role)?;

        let text = text.into();
        self.tasks
            .justify(task_id, text.clone(), self.policy.allow_justification_revision)?;
        self.audit.append(
            now,
            AuditEvent::DelayJustified {
                task_id,
                text,
                justified_by: caller.clone(),
            },
        );

        debug!(
            turnaround_id = %self.header.off_chain_id,
            task_id,
            "Delay justified"
        );
        Ok(())
    }

    /// Returns the previous flag. The call is recorded even when the flag is unchanged.
    pub fn set_mandatory(
        &mut self,
        task_id: TaskId,
        caller: &Identity,
        mandatory: bool,
        now: Timestamp,
    ) -> Result<bool> {
        self.guard().require_privilege(caller, Privilege::Operational)?;
        self.tasks.get(task_id)?;
        if self.is_certified() && !self.policy.allow_post_certification_mandatory_change {
            return Err(TurnaroundError::AlreadyCertified);
        }

        let previous = self.tasks.set_mandatory(task_id, mandatory)?;
        self.audit.append(
            now,
            AuditEvent::MandatoryTaskChanged {
                task_id,
                mandatory,
                changed_by: caller.clone(),
            },
        );

        debug!(
            turnaround_id = %self.header.off_chain_id,
            task_id,
            mandatory,
            "Mandatory flag set"
        );
        Ok(previous)
    }

    /// Seal the turnaround. All-or-nothing: a rejection leaves it untouched.
    pub fn certify(&mut self, now: Timestamp, caller: &Identity) -> Result<&CertificationRecord> {
        self.guard().require_privilege(caller, Privilege::Operational)?;
        if self.is_certified() {
            return Err(TurnaroundError::AlreadyCertified);
        }

        let record =
            CertificationSealer::seal(&self.header.off_chain_id, &self.tasks, caller.clone(), now)?;
        let late = self.compute_kpis().late;

        self.audit.append(
            now,
            AuditEvent::TurnaroundCertified {
                actual_departure: record.actual_departure,
                sealed_at: record.sealed_at,
                on_time: record.on_time,
                late,
                late_unjustified: record.late_unjustified,
                hash: record.hash,
                certified_by: caller.clone(),
            },
        );

        info!(
            turnaround_id = %self.header.off_chain_id,
            on_time = record.on_time,
            late_unjustified = record.late_unjustified,
            hash = %record.hash,
            "Turnaround certified"
        );

        Ok(&*self.certification.insert(record))
    }

    /// Returns the identity that previously held the role
    pub fn assign_role(
        &mut self,
        caller: &Identity,
        role: Role,
        identity: Identity,
        now: Timestamp,
    ) -> Result<Option<Identity>> {
        self.guard()
            .require_privilege(caller, Privilege::Administrative)?;

        let previous = self.roles.assign(role, identity.clone());
        self.audit.append(
            now,
            AuditEvent::RoleAssigned {
                role,
                identity: identity.clone(),
                assigned_by: caller.clone(),
            },
        );

        info!(
            turnaround_id = %self.header.off_chain_id,
            role = %role,
            identity = %identity,
            "Role assigned"
        );
        Ok(previous)
    }

    /// Returns false, and records nothing, if the grant already existed
    pub fn grant_privilege(
        &mut self,
        caller: &Identity,
        identity: Identity,
        privilege: Privilege,
        now: Timestamp,
    ) -> Result<bool> {
        self.guard()
            .require_privilege(caller, Privilege::Administrative)?;

        if !self.access.grant(identity.clone(), privilege) {
            return Ok(false);
        }
        self.audit.append(
            now,
            AuditEvent::PrivilegeGranted {
                identity: identity.clone(),
                privilege,
                granted_by: caller.clone(),
            },
        );

        info!(
            turnaround_id = %self.header.off_chain_id,
            identity = %identity,
            privilege = %privilege,
            "Privilege granted"
        );
        Ok(true)
    }

    /// Returns false, and records nothing, if there was no such grant
    pub fn revoke_privilege(
        &mut self,
        caller: &Identity,
        identity: &Identity,
        privilege: Privilege,
        now: Timestamp,
    ) -> Result<bool> {
        self.guard()
            .require_privilege(caller, Privilege::Administrative)?;

        if !self.access.revoke(identity, privilege) {
            return Ok(false);
        }
        self.audit.append(
            now,
            AuditEvent::PrivilegeRevoked {
                identity: identity.clone(),
                privilege,
                revoked_by: caller.clone(),
            },
        );

        info!(
            turnaround_id = %self.header.off_chain_id,
            identity = %identity,
            privilege = %privilege,
            "Privilege revoked"
        );
        Ok(true)
    }

    /// Note a badge issued by the downstream issuer, at most once per role
    pub fn record_badge_issued(
        &mut self,
        role: Role,
        identity: Identity,
        now: Timestamp,
    ) -> Result<()> {
        if !self.is_certified() {
            return Err(TurnaroundError::NotCertified);
        }
        if self.badges.contains(&role) {
            return Err(TurnaroundError::BadgeAlreadyIssued { role });
        }

        self.badges.insert(role);
        self.audit.append(
            now,
            AuditEvent::BadgeIssued {
                role,
                identity: identity.clone(),
            },
        );

        info!(
            turnaround_id = %self.header.off_chain_id,
            role = %role,
            identity = %identity,
            "Badge issued"
        );
        Ok(())
    }

    pub fn header(&self) -> &TurnaroundHeader {
        &self.header
    }

    pub fn off_chain_id(&self) -> &str {
        &self.header.off_chain_id
    }

    pub fn task(&self, task_id: TaskId) -> Result<&Task> {
        self.tasks.get(task_id)
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_slice()
    }

    pub fn compute_kpis(&self) -> KpiSnapshot {
        KpiSnapshot::compute(self.tasks.iter())
    }

    /// Live counters, available before and after sealing
    pub fn kpis(&self) -> KpiReport {
        self.compute_kpis().report()
    }

    pub fn role_outcomes(&self) -> Vec<RoleOutcome> {
        kpi::role_outcomes(self.tasks.iter())
    }

    /// Seconds from scheduled arrival to actual departure, 0 until sealed
    pub fn operational_duration(&self) -> u64 {
        self.certification
            .as_ref()
            .map(|record| {
                record
                    .actual_departure
                    .saturating_sub(self.header.scheduled_arrival)
            })
            .unwrap_or(0)
    }

    pub fn is_certified(&self) -> bool {
        self.certification.is_some()
    }

    pub fn certification(&self) -> Option<&CertificationRecord> {
        self.certification.as_ref()
    }

    /// Recompute the sealed hash; false when not certified or on mismatch
    pub fn verify_certification(&self) -> bool {
        self.certification
            .as_ref()
            .map(|record| record.verify(&self.header.off_chain_id))
            .unwrap_or(false)
    }

    pub fn badges_issued(&self) -> &BTreeSet<Role> {
        &self.badges
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub fn role_assignment(&self) -> &RoleAssignment {
        &self.roles
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }
}
