//! Post-certification mutation rules

use serde::{Deserialize, Serialize};
use turnaround_core::PolicyConfig;

/// Decides which task mutations a sealed turnaround still accepts.
///
/// The sealed KPI snapshot and hash never change; these switches only
/// govern the live task records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationPolicy {
    pub allow_post_certification_justification: bool,
    pub allow_post_certification_mandatory_change: bool,
    pub allow_justification_revision: bool,
}

impl MutationPolicy {
    /// Everything frozen once sealed, justifications written once
    pub fn strict() -> Self {
        Self {
            allow_post_certification_justification: false,
            allow_post_certification_mandatory_change: false,
            allow_justification_revision: false,
        }
    }

    /// Justification and mandatory toggles stay open after sealing
    pub fn permissive() -> Self {
        Self {
            allow_post_certification_justification: true,
            allow_post_certification_mandatory_change: true,
            allow_justification_revision: true,
        }
    }
}

impl Default for MutationPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for MutationPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            allow_post_certification_justification: config.allow_post_certification_justification,
            allow_post_certification_mandatory_change: config
                .allow_post_certification_mandatory_change,
            allow_justification_revision: config.allow_justification_revision,
        }
    }
}
