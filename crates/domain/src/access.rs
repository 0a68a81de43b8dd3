//! Role assignment, privilege tiers and the authorization predicate
//!
//! Two independent capabilities are combined here: a role→identity mapping
//! and a set of privilege grants. Task-level authorization is the OR of
//! "assigned to the task's role" and "holds operational privilege".
//! Administrative privilege never satisfies a task-level check.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Requirement, Result, TurnaroundError};
use crate::role::{Identity, Privilege, Role};

/// One authorized identity per role, overwritable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    assignments: BTreeMap<Role, Identity>,
}

impl RoleAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity previously holding the role
    pub fn assign(&mut self, role: Role, identity: Identity) -> Option<Identity> {
        self.assignments.insert(role, identity)
    }

    pub fn identity_for(&self, role: Role) -> Option<&Identity> {
        self.assignments.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &Identity)> {
        self.assignments.iter().map(|(role, id)| (*role, id))
    }
}

/// Privilege grants per identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    administrators: BTreeSet<Identity>,
    operators: BTreeSet<Identity>,
}

impl AccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn members_mut(&mut self, privilege: Privilege) -> &mut BTreeSet<Identity> {
        match privilege {
            Privilege::Administrative => &mut self.administrators,
            Privilege::Operational => &mut self.operators,
        }
    }

    /// Returns false if already granted
    pub fn grant(&mut self, identity: Identity, privilege: Privilege) -> bool {
        self.members_mut(privilege).insert(identity)
    }

    /// Returns false if it was not granted
    pub fn revoke(&mut self, identity: &Identity, privilege: Privilege) -> bool {
        self.members_mut(privilege).remove(identity)
    }

    pub fn has(&self, identity: &Identity, privilege: Privilege) -> bool {
        match privilege {
            Privilege::Administrative => self.administrators.contains(identity),
            Privilege::Operational => self.operators.contains(identity),
        }
    }

    pub fn holders(&self, privilege: Privilege) -> impl Iterator<Item = &Identity> {
        match privilege {
            Privilege::Administrative => self.administrators.iter(),
            Privilege::Operational => self.operators.iter(),
        }
    }
}

/// Read-only view answering "may this caller do that"
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationGuard<'a> {
    assignment: &'a RoleAssignment,
    access: &'a AccessControl,
}

impl<'a> AuthorizationGuard<'a> {
    pub fn new(assignment: &'a RoleAssignment, access: &'a AccessControl) -> Self {
        Self { assignment, access }
    }

    pub fn is_authorized(&self, caller: &Identity, required_role: Role) -> bool {
        self.assignment.identity_for(required_role) == Some(caller)
            || self.access.has(caller, Privilege::Operational)
    }

    pub fn require_role(&self, caller: &Identity, required_role: Role) -> Result<()> {
        if self.is_authorized(caller, required_role) {
            Ok(())
        } else {
            Err(unauthorized(caller, Requirement::Role(required_role)))
        }
    }

    pub fn require_privilege(&self, caller: &Identity, privilege: Privilege) -> Result<()> {
        if self.access.has(caller, privilege) {
            Ok(())
        } else {
            Err(unauthorized(caller, Requirement::Privilege(privilege)))
        }
    }
}

fn unauthorized(caller: &Identity, required: Requirement) -> TurnaroundError {
    TurnaroundError::Unauthorized {
        identity: caller.to_string(),
        required,
    }
}
