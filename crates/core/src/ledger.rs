//! Audit Ledger - durable append-only mirror of turnaround audit records
//!
//! Every record a turnaround appends to its in-memory audit log can be mirrored
//! here so that reporting consumers have a durable ingestion source.
//!
//! # Architecture
//!
//! Each entry is persisted with:
//! - seq_no: global, monotonically increasing sequence number
//! - turnaround_id / turnaround_seq: position in the owning turnaround's log
//! - event_type: record kind (`task.completed`, `turnaround.certified`, ...)
//! - timestamp: operational time of the transition (Unix seconds)
//! - payload: canonical JSON of the record
//! - entry_hash: BLAKE3 over the fields above plus prev_entry_hash
//! - prev_entry_hash: entry_hash of the previous row (zeros for genesis)
//!
//! # Guarantees
//!
//! - Strict ordering: seq_no increases by 1, turnaround_seq increases by 1 per turnaround
//! - Chain continuity: prev_entry_hash must match the previous entry_hash
//! - Append-only: no in-place updates or deletes
//! - Corruption detection: reopening recomputes every hash and link

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Previous-hash value of the first entry
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

const ENTRY_DOMAIN: &[u8] = b"turnaround-ledger/entry/v1";

/// Fields supplied by the caller when mirroring a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub turnaround_id: String,
    pub turnaround_seq: u64,
    pub event_type: String,
    pub timestamp: u64,
    pub payload: String,
}

/// A persisted, hash-chained ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub turnaround_id: String,
    pub turnaround_seq: u64,
    pub event_type: String,
    pub timestamp: u64,
    pub payload: String,
    pub entry_hash: Vec<u8>,
    pub prev_entry_hash: Vec<u8>,
}

impl LedgerEntry {
    /// Chain a draft onto `prev_entry_hash`
    pub fn seal(draft: EntryDraft, prev_entry_hash: Vec<u8>) -> Self {
        let entry_hash = Self::compute_hash(&draft, &prev_entry_hash);
        Self {
            turnaround_id: draft.turnaround_id,
            turnaround_seq: draft.turnaround_seq,
            event_type: draft.event_type,
            timestamp: draft.timestamp,
            payload: draft.payload,
            entry_hash,
            prev_entry_hash,
        }
    }

    fn compute_hash(draft: &EntryDraft, prev_entry_hash: &[u8]) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ENTRY_DOMAIN);
        hasher.update(prev_entry_hash);
        for field in [&draft.turnaround_id, &draft.event_type, &draft.payload] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update(&draft.turnaround_seq.to_le_bytes());
        hasher.update(&draft.timestamp.to_le_bytes());
        hasher.finalize().as_bytes().to_vec()
    }

    /// Recompute the entry hash from the stored fields
    pub fn verify_hash(&self) -> bool {
        let draft = EntryDraft {
            turnaround_id: self.turnaround_id.clone(),
            turnaround_seq: self.turnaround_seq,
            event_type: self.event_type.clone(),
            timestamp: self.timestamp,
            payload: self.payload.clone(),
        };
        Self::compute_hash(&draft, &self.prev_entry_hash) == self.entry_hash
    }
}

/// Ledger health status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerHealth {
    /// Ledger is healthy
    Ok,
    /// Ledger is corrupted
    Corrupted {
        /// Last good sequence number
        last_good_seq_no: Option<u64>,
        /// First failing sequence number
        first_bad_seq_no: u64,
        /// Error type description
        error_type: String,
    },
}

impl LedgerHealth {
    /// Check if the ledger is healthy
    pub fn is_ok(&self) -> bool {
        matches!(self, LedgerHealth::Ok)
    }
}

/// Ledger health information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerHealthInfo {
    pub status: LedgerHealth,
    pub ledger_id: String,
    pub entry_count: u64,
}

/// Errors that can occur in ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Turnaround sequence violation for {turnaround_id}: expected {expected}, got {actual}")]
    SequenceViolation {
        turnaround_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Entry not found: seq_no={seq_no}")]
    EntryNotFound { seq_no: u64 },

    #[error("Ledger corrupted: {0}")]
    CorruptionDetected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Observability metrics for the ledger
#[derive(Debug, Default, Clone)]
pub struct LedgerMetrics {
    pub ledger_entries_appended_total: u64,
    pub ledger_startup_checks_total: u64,
    pub ledger_corruption_detections_total: u64,
}

const SELECT_COLUMNS: &str = "seq_no, turnaround_id, turnaround_seq, event_type, timestamp, \
                              payload, entry_hash, prev_entry_hash";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(u64, LedgerEntry)> {
    Ok((
        row.get::<_, i64>(0)? as u64,
        LedgerEntry {
            turnaround_id: row.get(1)?,
            turnaround_seq: row.get::<_, i64>(2)? as u64,
            event_type: row.get(3)?,
            timestamp: row.get::<_, i64>(4)? as u64,
            payload: row.get(5)?,
            entry_hash: row.get(6)?,
            prev_entry_hash: row.get(7)?,
        },
    ))
}

/// Audit ledger with SQLite backend
pub struct AuditLedger {
    conn: Connection,
    ledger_id: String,
    health: LedgerHealth,
    metrics: LedgerMetrics,
}

impl AuditLedger {
    /// Create or open a ledger at the specified path
    pub fn open(path: impl AsRef<Path>, ledger_id: impl Into<String>) -> Result<Self> {
        let ledger_id = ledger_id.into();
        let path = path.as_ref();

        info!(
            ledger_id = %ledger_id,
            path = %path.display(),
            "Opening audit ledger"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn, ledger_id)
    }

    /// Open a throwaway ledger held in memory
    pub fn open_in_memory(ledger_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, ledger_id.into())
    }

    fn from_connection(conn: Connection, ledger_id: String) -> Result<Self> {
        Self::init_schema(&conn)?;

        let mut ledger = Self {
            conn,
            ledger_id,
            health: LedgerHealth::Ok,
            metrics: LedgerMetrics::default(),
        };

        ledger.startup_continuity_check()?;

        Ok(ledger)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_entries (
                seq_no INTEGER PRIMARY KEY AUTOINCREMENT,
                turnaround_id TEXT NOT NULL,
                turnaround_seq INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                payload TEXT NOT NULL,
                entry_hash BLOB NOT NULL,
                prev_entry_hash BLOB NOT NULL,
                UNIQUE (turnaround_id, turnaround_seq)
            );

            CREATE INDEX IF NOT EXISTS idx_turnaround ON audit_entries(turnaround_id, turnaround_seq);
            CREATE INDEX IF NOT EXISTS idx_event_type ON audit_entries(event_type);
            "#,
        )?;

        Ok(())
    }

    /// Append a record, chaining it to the current head
    ///
    /// `turnaround_seq` must be exactly one past the last mirrored record of the
    /// same turnaround (or 0 for its first record).
    pub fn append(&mut self, draft: EntryDraft) -> Result<(u64, LedgerEntry)> {
        if !self.health.is_ok() {
            warn!(
                ledger_id = %self.ledger_id,
                "Attempted to append to corrupted ledger"
            );
            return Err(LedgerError::CorruptionDetected(
                "Cannot append to corrupted ledger".to_string(),
            ));
        }

        if draft.turnaround_id.is_empty() {
            return Err(LedgerError::InvalidEntry(
                "turnaround_id cannot be empty".to_string(),
            ));
        }
        if draft.event_type.is_empty() {
            return Err(LedgerError::InvalidEntry(
                "event_type cannot be empty".to_string(),
            ));
        }

        let tx = self.conn.transaction()?;

        let expected_seq = Self::last_turnaround_seq_internal(&tx, &draft.turnaround_id)?
            .map(|s| s + 1)
            .unwrap_or(0);
        if draft.turnaround_seq != expected_seq {
            return Err(LedgerError::SequenceViolation {
                turnaround_id: draft.turnaround_id,
                expected: expected_seq,
                actual: draft.turnaround_seq,
            });
        }

        let prev_entry_hash = Self::latest_entry_internal(&tx)?
            .map(|(_, e)| e.entry_hash)
            .unwrap_or_else(|| GENESIS_HASH.to_vec());

        let entry = LedgerEntry::seal(draft, prev_entry_hash);

        tx.execute(
            r#"
            INSERT INTO audit_entries (
                turnaround_id, turnaround_seq, event_type, timestamp,
                payload, entry_hash, prev_entry_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                entry.turnaround_id,
                entry.turnaround_seq as i64,
                entry.event_type,
                entry.timestamp as i64,
                entry.payload,
                entry.entry_hash,
                entry.prev_entry_hash,
            ],
        )?;

        let seq_no = tx.last_insert_rowid() as u64;
        tx.commit()?;

        self.metrics.ledger_entries_appended_total += 1;

        debug!(
            ledger_id = %self.ledger_id,
            seq_no = seq_no,
            turnaround_id = %entry.turnaround_id,
            event_type = %entry.event_type,
            "Entry appended to audit ledger"
        );

        Ok((seq_no, entry))
    }

    fn latest_entry_internal(tx: &Transaction) -> Result<Option<(u64, LedgerEntry)>> {
        let sql = format!(
            "SELECT {} FROM audit_entries ORDER BY seq_no DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let result = tx.query_row(&sql, [], row_to_entry).optional()?;
        Ok(result)
    }

    fn last_turnaround_seq_internal(tx: &Transaction, turnaround_id: &str) -> Result<Option<u64>> {
        let result: Option<i64> = tx.query_row(
            "SELECT MAX(turnaround_seq) FROM audit_entries WHERE turnaround_id = ?1",
            [turnaround_id],
            |row| row.get(0),
        )?;
        Ok(result.map(|s| s as u64))
    }

    /// Latest entry in the ledger
    pub fn get_latest_entry(&self) -> Result<Option<(u64, LedgerEntry)>> {
        let sql = format!(
            "SELECT {} FROM audit_entries ORDER BY seq_no DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let result = self.conn.query_row(&sql, [], row_to_entry).optional()?;
        Ok(result)
    }

    /// Entry by global sequence number
    pub fn get_entry_by_seq_no(&self, seq_no: u64) -> Result<LedgerEntry> {
        let sql = format!("SELECT {} FROM audit_entries WHERE seq_no = ?1", SELECT_COLUMNS);
        self.conn
            .query_row(&sql, [seq_no as i64], row_to_entry)
            .map(|(_, entry)| entry)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => LedgerError::EntryNotFound { seq_no },
                e => LedgerError::DatabaseError(e),
            })
    }

    /// Highest mirrored `turnaround_seq` for a turnaround
    pub fn last_turnaround_seq(&self, turnaround_id: &str) -> Result<Option<u64>> {
        let result: Option<i64> = self.conn.query_row(
            "SELECT MAX(turnaround_seq) FROM audit_entries WHERE turnaround_id = ?1",
            [turnaround_id],
            |row| row.get(0),
        )?;
        Ok(result.map(|s| s as u64))
    }

    /// All entries of one turnaround in log order
    pub fn entries_for_turnaround(&self, turnaround_id: &str) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM audit_entries WHERE turnaround_id = ?1 ORDER BY turnaround_seq ASC",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map([turnaround_id], row_to_entry)?
            .map(|r| r.map(|(_, entry)| entry))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Iterate entries starting from a sequence number (inclusive)
    pub fn iterate_entries(&self, from_seq_no: u64, limit: usize) -> Result<Vec<(u64, LedgerEntry)>> {
        let sql = format!(
            "SELECT {} FROM audit_entries WHERE seq_no >= ?1 ORDER BY seq_no ASC LIMIT ?2",
            SELECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![from_seq_no as i64, limit as i64], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn entry_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM audit_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn mark_corrupted(
        &mut self,
        last_good_seq_no: Option<u64>,
        first_bad_seq_no: u64,
        error_type: String,
    ) -> LedgerError {
        self.health = LedgerHealth::Corrupted {
            last_good_seq_no,
            first_bad_seq_no,
            error_type: error_type.clone(),
        };
        self.metrics.ledger_corruption_detections_total += 1;

        error!(
            ledger_id = %self.ledger_id,
            seq_no = first_bad_seq_no,
            error_type = %error_type,
            "Audit ledger corruption detected"
        );

        LedgerError::CorruptionDetected(error_type)
    }

    /// Verify sequence numbering, chain links and entry hashes
    pub fn startup_continuity_check(&mut self) -> Result<()> {
        self.metrics.ledger_startup_checks_total += 1;

        info!(ledger_id = %self.ledger_id, "Starting audit ledger continuity check");

        let sql = format!("SELECT {} FROM audit_entries ORDER BY seq_no ASC", SELECT_COLUMNS);
        let entries: Vec<(u64, LedgerEntry)> = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        if entries.is_empty() {
            info!(ledger_id = %self.ledger_id, "Audit ledger is empty, continuity check passed");
            return Ok(());
        }

        let mut expected_seq_no = entries[0].0;
        let mut prev_entry_hash = GENESIS_HASH.to_vec();

        for (i, (seq_no, entry)) in entries.iter().enumerate() {
            let last_good = if i > 0 { Some(entries[i - 1].0) } else { None };

            if *seq_no != expected_seq_no {
                let error_type = format!(
                    "Missing entries: gap between {} and {}",
                    expected_seq_no.saturating_sub(1),
                    seq_no
                );
                return Err(self.mark_corrupted(last_good, *seq_no, error_type));
            }

            if entry.prev_entry_hash != prev_entry_hash {
                let error_type = format!(
                    "Hash mismatch at seq_no {}: expected prev_hash {}, got {}",
                    seq_no,
                    hex::encode(&prev_entry_hash),
                    hex::encode(&entry.prev_entry_hash)
                );
                return Err(self.mark_corrupted(last_good, *seq_no, error_type));
            }

            if !entry.verify_hash() {
                let error_type = format!("Entry content altered at seq_no {}", seq_no);
                return Err(self.mark_corrupted(last_good, *seq_no, error_type));
            }

            prev_entry_hash = entry.entry_hash.clone();
            expected_seq_no += 1;
        }

        info!(
            ledger_id = %self.ledger_id,
            entry_count = entries.len(),
            "Audit ledger continuity check passed"
        );

        Ok(())
    }

    /// Health status with entry count
    pub fn get_ledger_health(&self) -> LedgerHealthInfo {
        LedgerHealthInfo {
            status: self.health.clone(),
            ledger_id: self.ledger_id.clone(),
            entry_count: self.entry_count().unwrap_or(0),
        }
    }

    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    pub fn ledger_id(&self) -> &str {
        &self.ledger_id
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(self.conn.path().unwrap_or(""))
    }

    /// Execute raw SQL for testing purposes only
    ///
    /// Bypasses every integrity check; used to simulate tampering.
    #[doc(hidden)]
    pub fn __test_execute_raw_sql(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }
}
