//! Registry of live turnarounds
//!
//! The desk maps off-chain identifiers to handles. The map lock is held only
//! while looking up or inserting a handle; operations on a turnaround go
//! through its own handle lock.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{info, warn};
use turnaround_core::{AuditLedger, Config};
use turnaround_domain::{
    Identity, MutationPolicy, TaskTemplate, Timestamp, Turnaround, TurnaroundHeader,
};

use crate::error::{DeskError, Result};
use crate::handle::TurnaroundHandle;
use crate::mirror::{self, SharedLedger};

pub struct TurnaroundDesk {
    handles: RwLock<HashMap<String, TurnaroundHandle>>,
    ledger: Option<SharedLedger>,
    policy: MutationPolicy,
}

impl TurnaroundDesk {
    pub fn new(policy: MutationPolicy) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            ledger: None,
            policy,
        }
    }

    pub fn with_ledger(mut self, ledger: AuditLedger) -> Self {
        self.ledger = Some(mirror::shared(ledger));
        self
    }

    /// Build from configuration, opening the durable mirror when a path is set
    pub fn from_config(config: &Config) -> Result<Self> {
        let desk = Self::new(MutationPolicy::from(&config.policy));
        match &config.ledger.path {
            Some(path) => {
                let ledger = AuditLedger::open(path, config.ledger_id())?;
                info!(
                    ledger_id = %ledger.ledger_id(),
                    path = %path.display(),
                    "Turnaround desk mirroring to ledger"
                );
                Ok(desk.with_ledger(ledger))
            }
            None => Ok(desk),
        }
    }

    pub fn policy(&self) -> MutationPolicy {
        self.policy
    }

    pub fn ledger(&self) -> Option<&SharedLedger> {
        self.ledger.as_ref()
    }

    /// Open a new turnaround. Fails if the id is live here or already mirrored.
    pub async fn create(
        &self,
        header: TurnaroundHeader,
        template: &(dyn TaskTemplate + Sync),
        created_by: Identity,
        now: Timestamp,
    ) -> Result<TurnaroundHandle> {
        let turnaround =
            Turnaround::create(header, template, created_by, now)?.with_policy(self.policy);
        let id = turnaround.off_chain_id().to_string();

        let mut handles = self.handles.write().await;
        if handles.contains_key(&id) {
            return Err(DeskError::DuplicateTurnaround(id));
        }

        let handle = match &self.ledger {
            Some(ledger) => {
                if mirror::lock(ledger)?.last_turnaround_seq(&id)?.is_some() {
                    return Err(DeskError::DuplicateTurnaround(id));
                }
                TurnaroundHandle::with_mirror(turnaround, ledger.clone(), 0)
            }
            None => TurnaroundHandle::new(turnaround),
        };

        if let Err(e) = handle.sync_mirror().await {
            warn!(turnaround_id = %id, error = %e, "Creation record not mirrored yet");
        }

        info!(turnaround_id = %id, "Turnaround opened on desk");
        handles.insert(id, handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, off_chain_id: &str) -> Result<TurnaroundHandle> {
        self.handles
            .read()
            .await
            .get(off_chain_id)
            .cloned()
            .ok_or_else(|| DeskError::UnknownTurnaround(off_chain_id.to_string()))
    }

    /// Reload a turnaround from the durable mirror after a restart
    pub async fn restore(&self, off_chain_id: &str) -> Result<TurnaroundHandle> {
        let ledger = self
            .ledger
            .as_ref()
            .ok_or_else(|| DeskError::MirrorUnavailable("no ledger configured".to_string()))?;

        let mut handles = self.handles.write().await;
        if handles.contains_key(off_chain_id) {
            return Err(DeskError::DuplicateTurnaround(off_chain_id.to_string()));
        }

        let turnaround = {
            let guard = mirror::lock(ledger)?;
            mirror::replay_from_ledger(&guard, off_chain_id, self.policy)?
        };
        let mirrored = turnaround.audit_log().len() as u64;

        info!(
            turnaround_id = %off_chain_id,
            records = mirrored,
            certified = turnaround.is_certified(),
            "Turnaround restored from ledger"
        );

        let handle = TurnaroundHandle::with_mirror(turnaround, ledger.clone(), mirrored);
        handles.insert(off_chain_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Live identifiers in sorted order
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }
}
