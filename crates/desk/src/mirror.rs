//! Mapping between audit records and durable ledger entries
//!
//! Each [`AuditRecord`] becomes one ledger entry whose payload is the record's
//! JSON. Loading reverses the mapping and checks that the entry columns agree
//! with the payload before the records are handed to replay.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use turnaround_core::{AuditLedger, EntryDraft, LedgerEntry};
use turnaround_domain::{AuditRecord, MutationPolicy, Turnaround};

use crate::error::{DeskError, Result};

/// Ledger shared by every handle of one desk
pub type SharedLedger = Arc<Mutex<AuditLedger>>;

pub fn shared(ledger: AuditLedger) -> SharedLedger {
    Arc::new(Mutex::new(ledger))
}

pub fn lock(ledger: &SharedLedger) -> Result<MutexGuard<'_, AuditLedger>> {
    ledger
        .lock()
        .map_err(|_| DeskError::MirrorUnavailable("ledger lock poisoned".to_string()))
}

pub fn draft_for(turnaround_id: &str, record: &AuditRecord) -> Result<EntryDraft> {
    Ok(EntryDraft {
        turnaround_id: turnaround_id.to_string(),
        turnaround_seq: record.seq,
        event_type: record.event.event_type().to_string(),
        timestamp: record.recorded_at,
        payload: serde_json::to_string(record)?,
    })
}

/// Append one record, returning its global ledger sequence number
pub fn append_record(
    ledger: &mut AuditLedger,
    turnaround_id: &str,
    record: &AuditRecord,
) -> Result<u64> {
    let (seq_no, _) = ledger.append(draft_for(turnaround_id, record)?)?;
    debug!(
        turnaround_id,
        turnaround_seq = record.seq,
        seq_no,
        event_type = record.event.event_type(),
        "Audit record mirrored"
    );
    Ok(seq_no)
}

/// Append `records` in order under one lock, stopping at the first failure.
///
/// Returns how many were written alongside the outcome, so a caller can
/// resume from the first unwritten record.
pub fn append_batch(
    ledger: &SharedLedger,
    turnaround_id: &str,
    records: &[AuditRecord],
) -> (usize, Result<()>) {
    let mut guard = match lock(ledger) {
        Ok(guard) => guard,
        Err(e) => return (0, Err(e)),
    };
    for (written, record) in records.iter().enumerate() {
        if let Err(e) = append_record(&mut guard, turnaround_id, record) {
            return (written, Err(e));
        }
    }
    (records.len(), Ok(()))
}

pub fn record_from_entry(entry: &LedgerEntry) -> Result<AuditRecord> {
    let record: AuditRecord = serde_json::from_str(&entry.payload)?;
    if record.seq != entry.turnaround_seq {
        return Err(DeskError::EntryMismatch(format!(
            "{} entry {} carries record {}",
            entry.turnaround_id, entry.turnaround_seq, record.seq
        )));
    }
    if record.event.event_type() != entry.event_type {
        return Err(DeskError::EntryMismatch(format!(
            "{} entry {} is labelled {} but holds {}",
            entry.turnaround_id,
            entry.turnaround_seq,
            entry.event_type,
            record.event.event_type()
        )));
    }
    if record.recorded_at != entry.timestamp {
        return Err(DeskError::EntryMismatch(format!(
            "{} entry {} timestamp {} differs from record {}",
            entry.turnaround_id, entry.turnaround_seq, entry.timestamp, record.recorded_at
        )));
    }
    Ok(record)
}

pub fn load_records(ledger: &AuditLedger, turnaround_id: &str) -> Result<Vec<AuditRecord>> {
    ledger
        .entries_for_turnaround(turnaround_id)?
        .iter()
        .map(record_from_entry)
        .collect()
}

/// Rebuild a turnaround from its mirrored records
pub fn replay_from_ledger(
    ledger: &AuditLedger,
    turnaround_id: &str,
    policy: MutationPolicy,
) -> Result<Turnaround> {
    let records = load_records(ledger, turnaround_id)?;
    if records.is_empty() {
        return Err(DeskError::UnknownTurnaround(turnaround_id.to_string()));
    }
    Ok(Turnaround::replay(&records, policy)?)
}
