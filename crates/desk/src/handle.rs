//! Concurrent access to one turnaround
//!
//! A [`TurnaroundHandle`] is a cheap clone around a per-turnaround
//! `tokio::sync::RwLock`. Mutations take the write lock for their whole
//! duration, so two calls on the same turnaround never interleave. Reads share
//! the lock and always see a state between two mutations. Handles of different
//! turnarounds share nothing.
//!
//! When a ledger is attached, every record appended by a mutation is mirrored
//! before the write lock is released. A mirror failure does not undo the
//! mutation: it is logged, the unmirrored tail stays queued, and the next
//! mutation or [`TurnaroundHandle::sync_mirror`] retries it. Ledger writes are
//! synchronous SQLite calls, so they run on tokio's blocking pool rather than
//! on the worker thread holding the lock.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;
use turnaround_domain::{
    AuditRecord, CertificationRecord, Identity, KpiReport, KpiSnapshot, Privilege, Role,
    RoleOutcome, Task, TaskId, TaskStatus, Timestamp, Turnaround, TurnaroundSnapshot,
};

use crate::badges::{Badge, BadgeIssuer};
use crate::error::{DeskError, Result};
use crate::mirror::{self, SharedLedger};

struct HandleState {
    turnaround: Turnaround,
    /// Number of leading audit records already in the ledger
    mirrored: u64,
}

#[derive(Clone)]
pub struct TurnaroundHandle {
    off_chain_id: Arc<str>,
    state: Arc<RwLock<HandleState>>,
    mirror: Option<SharedLedger>,
}

impl TurnaroundHandle {
    /// Handle without a durable mirror
    pub fn new(turnaround: Turnaround) -> Self {
        let mirrored = turnaround.audit_log().len() as u64;
        Self::build(turnaround, None, mirrored)
    }

    /// Handle mirroring into `ledger`, whose copy already holds the first
    /// `mirrored` records of this turnaround
    pub fn with_mirror(turnaround: Turnaround, ledger: SharedLedger, mirrored: u64) -> Self {
        Self::build(turnaround, Some(ledger), mirrored)
    }

    fn build(turnaround: Turnaround, mirror: Option<SharedLedger>, mirrored: u64) -> Self {
        Self {
            off_chain_id: Arc::from(turnaround.off_chain_id()),
            state: Arc::new(RwLock::new(HandleState {
                turnaround,
                mirrored,
            })),
            mirror,
        }
    }

    pub fn off_chain_id(&self) -> &str {
        &self.off_chain_id
    }

    /// Run one mutation under the write lock, then mirror what it appended
    async fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Turnaround) -> turnaround_domain::Result<T>,
    {
        let mut state = self.state.write().await;
        let value = op(&mut state.turnaround)?;

        if let Err(e) = self.flush(&mut state).await {
            warn!(
                turnaround_id = %self.off_chain_id,
                mirrored = state.mirrored,
                pending = (state.turnaround.audit_log().len() as u64).saturating_sub(state.mirrored),
                error = %e,
                "Audit mirror behind, will retry"
            );
        }
        Ok(value)
    }

    async fn read<T>(&self, f: impl FnOnce(&Turnaround) -> T) -> T {
        let state = self.state.read().await;
        f(&state.turnaround)
    }

    /// Ledger writes run on the blocking pool; the write lock stays held until
    /// they finish so records reach the ledger in order.
    async fn flush(&self, state: &mut HandleState) -> Result<usize> {
        let Some(ledger) = &self.mirror else {
            state.mirrored = state.turnaround.audit_log().len() as u64;
            return Ok(0);
        };

        let pending = state.turnaround.audit_log().since(state.mirrored).to_vec();
        if pending.is_empty() {
            return Ok(0);
        }

        let ledger = Arc::clone(ledger);
        let turnaround_id = Arc::clone(&self.off_chain_id);
        let (written, outcome) = tokio::task::spawn_blocking(move || {
            mirror::append_batch(&ledger, &turnaround_id, &pending)
        })
        .await
        .map_err(|e| DeskError::MirrorUnavailable(format!("mirror task failed: {}", e)))?;

        state.mirrored += written as u64;
        outcome.map(|()| written)
    }

    /// Mirror any records left behind by earlier failures
    pub async fn sync_mirror(&self) -> Result<usize> {
        let mut state = self.state.write().await;
        self.flush(&mut state).await
    }

    /// Records not yet in the ledger
    pub async fn pending_mirror(&self) -> u64 {
        let state = self.state.read().await;
        (state.turnaround.audit_log().len() as u64).saturating_sub(state.mirrored)
    }

    pub async fn complete_task(
        &self,
        task_id: TaskId,
        caller: &Identity,
        now: Timestamp,
    ) -> Result<TaskStatus> {
        self.mutate(|ta| ta.complete_task(task_id, caller, now))
            .await
    }

    pub async fn justify_delay(
        &self,
        task_id: TaskId,
        caller: &Identity,
        text: impl Into<String>,
        now: Timestamp,
    ) -> Result<()> {
        let text = text.into();
        self.mutate(|ta| ta.justify_delay(task_id, caller, text, now))
            .await
    }

    pub async fn set_mandatory(
        &self,
        task_id: TaskId,
        caller: &Identity,
        mandatory: bool,
        now: Timestamp,
    ) -> Result<bool> {
        self.mutate(|ta| ta.set_mandatory(task_id, caller, mandatory, now))
            .await
    }

    pub async fn certify(&self, now: Timestamp, caller: &Identity) -> Result<CertificationRecord> {
        self.mutate(|ta| ta.certify(now, caller).cloned()).await
    }

    pub async fn assign_role(
        &self,
        caller: &Identity,
        role: Role,
        identity: Identity,
        now: Timestamp,
    ) -> Result<Option<Identity>> {
        self.mutate(|ta| ta.assign_role(caller, role, identity, now))
            .await
    }

    pub async fn grant_privilege(
        &self,
        caller: &Identity,
        identity: Identity,
        privilege: Privilege,
        now: Timestamp,
    ) -> Result<bool> {
        self.mutate(|ta| ta.grant_privilege(caller, identity, privilege, now))
            .await
    }

    pub async fn revoke_privilege(
        &self,
        caller: &Identity,
        identity: &Identity,
        privilege: Privilege,
        now: Timestamp,
    ) -> Result<bool> {
        self.mutate(|ta| ta.revoke_privilege(caller, identity, privilege, now))
            .await
    }

    pub async fn issue_badges(&self, issuer: &BadgeIssuer, now: Timestamp) -> Result<Vec<Badge>> {
        self.mutate(|ta| issuer.issue(ta, now)).await
    }

    pub async fn task(&self, task_id: TaskId) -> Result<Task> {
        Ok(self.read(|ta| ta.task(task_id).cloned()).await?)
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.read(|ta| ta.tasks().to_vec()).await
    }

    pub async fn kpis(&self) -> KpiReport {
        self.read(Turnaround::kpis).await
    }

    pub async fn compute_kpis(&self) -> KpiSnapshot {
        self.read(Turnaround::compute_kpis).await
    }

    pub async fn role_outcomes(&self) -> Vec<RoleOutcome> {
        self.read(Turnaround::role_outcomes).await
    }

    pub async fn operational_duration(&self) -> u64 {
        self.read(Turnaround::operational_duration).await
    }

    pub async fn is_certified(&self) -> bool {
        self.read(Turnaround::is_certified).await
    }

    pub async fn certification(&self) -> Option<CertificationRecord> {
        self.read(|ta| ta.certification().cloned()).await
    }

    pub async fn verify_certification(&self) -> bool {
        self.read(Turnaround::verify_certification).await
    }

    pub async fn snapshot(&self) -> TurnaroundSnapshot {
        self.read(Turnaround::snapshot).await
    }

    /// Audit records with `seq >= from`, for downstream consumers
    pub async fn audit_since(&self, from: u64) -> Vec<AuditRecord> {
        self.read(|ta| ta.audit_log().since(from).to_vec()).await
    }

    /// Clone of the full aggregate at this instant
    pub async fn turnaround(&self) -> Turnaround {
        self.read(Turnaround::clone).await
    }
}

impl std::fmt::Debug for TurnaroundHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnaroundHandle")
            .field("off_chain_id", &self.off_chain_id)
            .field("mirrored", &self.mirror.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnaround_core::AuditLedger;
    use turnaround_domain::{FixedIntervalTemplate, TurnaroundError, TurnaroundHeader, TASK_COUNT};

    const T0: Timestamp = 50_000;

    fn admin() -> Identity {
        Identity::from("admin")
    }

    fn turnaround(id: &str) -> Turnaround {
        let header = TurnaroundHeader::new(id, "LHR", T0, T0 + 10_000).unwrap();
        Turnaround::create(header, &FixedIntervalTemplate::new(300, true), admin(), T0).unwrap()
    }

    #[tokio::test]
    async fn test_mutations_and_reads() {
        let handle = TurnaroundHandle::new(turnaround("TA-H"));
        assert_eq!(
            handle.complete_task(0, &admin(), T0).await.unwrap(),
            TaskStatus::OnTime
        );
        let err = handle.complete_task(0, &admin(), T0).await.unwrap_err();
        assert_eq!(
            err.as_turnaround(),
            Some(&TurnaroundError::AlreadyCompleted { task_id: 0 })
        );
        assert!(handle.task(TASK_COUNT).await.is_err());
        assert_eq!(handle.kpis().await.on_time, 1);
        assert_eq!(handle.pending_mirror().await, 0);
        assert_eq!(handle.operational_duration().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_completions_apply_once() {
        let handle = TurnaroundHandle::new(turnaround("TA-RACE"));

        let mut joins = Vec::new();
        for worker in 0..8u64 {
            let handle = handle.clone();
            joins.push(tokio::spawn(async move {
                let mut won = 0usize;
                for id in 0..TASK_COUNT {
                    if handle.complete_task(id, &admin(), T0 + worker).await.is_ok() {
                        won += 1;
                    }
                }
                won
            }));
        }

        let mut total = 0;
        for join in joins {
            total += join.await.unwrap();
        }
        assert_eq!(total, TASK_COUNT);
        // one creation record plus exactly one completion per task
        assert_eq!(handle.audit_since(0).await.len(), TASK_COUNT + 1);
    }

    #[tokio::test]
    async fn test_mirror_follows_mutations() {
        let ledger = mirror::shared(AuditLedger::open_in_memory("handle-test").unwrap());
        let handle = TurnaroundHandle::with_mirror(turnaround("TA-MIR"), ledger.clone(), 0);
        assert_eq!(handle.pending_mirror().await, 1);
        assert_eq!(handle.sync_mirror().await.unwrap(), 1);

        handle.complete_task(3, &admin(), T0 + 900).await.unwrap();
        handle
            .assign_role(&admin(), Role::Gate, Identity::from("gate-9"), T0)
            .await
            .unwrap();
        assert_eq!(handle.pending_mirror().await, 0);

        let guard = mirror::lock(&ledger).unwrap();
        assert_eq!(guard.last_turnaround_seq("TA-MIR").unwrap(), Some(2));
        let rebuilt =
            mirror::replay_from_ledger(&guard, "TA-MIR", turnaround_domain::MutationPolicy::default())
                .unwrap();
        drop(guard);
        assert_eq!(rebuilt, handle.turnaround().await);
    }
}
