//! Certification sealing and the certification hash
//!
//! The hash is a BLAKE3 commitment over a canonical, length-prefixed encoding
//! of the sealed fields. Anyone holding the published values can rebuild
//! [`CertificationHashInput`] and recompute it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Result, TurnaroundError};
use crate::kpi::KpiSnapshot;
use crate::role::{Identity, Timestamp};
use crate::task::TaskRegistry;

const CERTIFICATION_DOMAIN: &[u8] = b"turnaround-certification/v1";

/// 32-byte BLAKE3 digest, serialized as lowercase hex
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CertificationHash([u8; 32]);

impl CertificationHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|e| {
            TurnaroundError::InvalidHash(format!("not hex: {}", e))
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            TurnaroundError::InvalidHash(format!(
                "expected 32 bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Debug for CertificationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertificationHash({})", self.to_hex())
    }
}

impl fmt::Display for CertificationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CertificationHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CertificationHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Everything the certification hash commits to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationHashInput {
    pub off_chain_id: String,
    pub actual_departure: Timestamp,
    pub on_time: u32,
    pub late_unjustified: u32,
    pub sealed_at: Timestamp,
}

impl CertificationHashInput {
    pub fn compute(&self) -> CertificationHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(CERTIFICATION_DOMAIN);
        hasher.update(&(self.off_chain_id.len() as u64).to_le_bytes());
        hasher.update(self.off_chain_id.as_bytes());
        hasher.update(&self.actual_departure.to_le_bytes());
        hasher.update(&self.on_time.to_le_bytes());
        hasher.update(&self.late_unjustified.to_le_bytes());
        hasher.update(&self.sealed_at.to_le_bytes());
        CertificationHash(*hasher.finalize().as_bytes())
    }
}

/// Sealed snapshot retained on a certified turnaround
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRecord {
    pub actual_departure: Timestamp,
    pub sealed_at: Timestamp,
    pub on_time: u32,
    pub late_unjustified: u32,
    pub hash: CertificationHash,
    pub certified_by: Identity,
}

impl CertificationRecord {
    pub fn hash_input(&self, off_chain_id: &str) -> CertificationHashInput {
        CertificationHashInput {
            off_chain_id: off_chain_id.to_string(),
            actual_departure: self.actual_departure,
            on_time: self.on_time,
            late_unjustified: self.late_unjustified,
            sealed_at: self.sealed_at,
        }
    }

    pub fn verify(&self, off_chain_id: &str) -> bool {
        self.hash_input(off_chain_id).compute() == self.hash
    }

    pub fn sla_breached(&self) -> bool {
        self.late_unjustified > 0
    }
}

/// Validates certification preconditions and produces the sealed record.
///
/// Sealing reads the registry and never mutates it, so a rejected call
/// leaves no trace.
pub struct CertificationSealer;

impl CertificationSealer {
    pub fn seal(
        off_chain_id: &str,
        tasks: &TaskRegistry,
        certified_by: Identity,
        now: Timestamp,
    ) -> Result<CertificationRecord> {
        let outstanding = tasks.outstanding_mandatory();
        if !outstanding.is_empty() {
            return Err(TurnaroundError::MandatoryTaskIncomplete { outstanding });
        }

        let kpis = KpiSnapshot::compute(tasks.iter());
        let input = CertificationHashInput {
            off_chain_id: off_chain_id.to_string(),
            actual_departure: now,
            on_time: kpis.on_time,
            late_unjustified: kpis.late_unjustified,
            sealed_at: now,
        };

        Ok(CertificationRecord {
            actual_departure: now,
            sealed_at: now,
            on_time: kpis.on_time,
            late_unjustified: kpis.late_unjustified,
            hash: input.compute(),
            certified_by,
        })
    }
}
