//! Reputation badges for roles of a certified turnaround
//!
//! A role earns a badge when it completed at least one task and none of its
//! late tasks is left unjustified. The badge goes to the identity assigned to
//! the role at issuance time. Each (turnaround, role) pair is issued at most
//! once; the turnaround's audit log records every issuance.

use serde::{Deserialize, Serialize};
use tracing::debug;
use turnaround_domain::{Identity, Role, RoleOutcome, Timestamp, Turnaround, TurnaroundError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub turnaround_id: String,
    pub role: Role,
    pub identity: Identity,
    pub on_time: u32,
    pub issued_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BadgeIssuer;

impl BadgeIssuer {
    pub fn new() -> Self {
        Self
    }

    /// Roles that would receive a badge now, with their outcomes
    pub fn eligible(&self, turnaround: &Turnaround) -> Vec<(RoleOutcome, Identity)> {
        turnaround
            .role_outcomes()
            .into_iter()
            .filter(|outcome| outcome.badge_eligible())
            .filter(|outcome| !turnaround.badges_issued().contains(&outcome.role))
            .filter_map(|outcome| {
                turnaround
                    .role_assignment()
                    .identity_for(outcome.role)
                    .map(|identity| (outcome, identity.clone()))
            })
            .collect()
    }

    /// Issue every outstanding badge. Calling again issues only newly eligible roles.
    pub fn issue(
        &self,
        turnaround: &mut Turnaround,
        now: Timestamp,
    ) -> Result<Vec<Badge>, TurnaroundError> {
        if !turnaround.is_certified() {
            return Err(TurnaroundError::NotCertified);
        }

        let mut issued = Vec::new();
        for (outcome, identity) in self.eligible(turnaround) {
            turnaround.record_badge_issued(outcome.role, identity.clone(), now)?;
            issued.push(Badge {
                turnaround_id: turnaround.off_chain_id().to_string(),
                role: outcome.role,
                identity,
                on_time: outcome.on_time,
                issued_at: now,
            });
        }

        debug!(
            turnaround_id = %turnaround.off_chain_id(),
            count = issued.len(),
            "Badges issued"
        );
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnaround_domain::{FixedIntervalTemplate, TurnaroundHeader, TASK_COUNT};

    const T0: Timestamp = 10_000;

    fn admin() -> Identity {
        Identity::from("admin")
    }

    /// Fuel (tasks 2, 8, ...) finishes one task late, catering never acts
    fn certified() -> Turnaround {
        let header = TurnaroundHeader::new("TA-B", "AMS", T0, T0 + 9_000).unwrap();
        let mut ta =
            Turnaround::create(header, &FixedIntervalTemplate::new(60, false), admin(), T0)
                .unwrap();
        for role in Role::ALL {
            ta.assign_role(&admin(), role, Identity::new(format!("{}-lead", role)), T0)
                .unwrap();
        }
        for id in 0..TASK_COUNT {
            let role = ta.task(id).unwrap().role;
            if role == Role::Catering {
                continue;
            }
            let due = ta.task(id).unwrap().deadline;
            let at = if id == 8 { due + 120 } else { due };
            ta.complete_task(id, &admin(), at).unwrap();
        }
        ta.certify(T0 + 5_000, &admin()).unwrap();
        ta
    }

    #[test]
    fn test_requires_certification() {
        let header = TurnaroundHeader::new("TA-U", "AMS", T0, T0 + 1).unwrap();
        let mut ta =
            Turnaround::create(header, &FixedIntervalTemplate::new(60, false), admin(), T0)
                .unwrap();
        assert_eq!(
            BadgeIssuer::new().issue(&mut ta, T0),
            Err(TurnaroundError::NotCertified)
        );
    }

    #[test]
    fn test_eligibility_rules() {
        let mut ta = certified();
        let badges = BadgeIssuer::new().issue(&mut ta, T0 + 6_000).unwrap();
        let roles: Vec<Role> = badges.iter().map(|b| b.role).collect();

        assert!(!roles.contains(&Role::Fuel), "unjustified late task");
        assert!(!roles.contains(&Role::Catering), "did not participate");
        assert_eq!(roles.len(), 4);
        let gate = badges.iter().find(|b| b.role == Role::Gate).unwrap();
        assert_eq!(gate.identity, Identity::from("gate-lead"));
    }

    #[test]
    fn test_at_most_once_per_role() {
        let mut ta = certified().with_policy(turnaround_domain::MutationPolicy::permissive());
        let issuer = BadgeIssuer::new();
        assert_eq!(issuer.issue(&mut ta, T0 + 6_000).unwrap().len(), 4);
        assert!(issuer.issue(&mut ta, T0 + 6_001).unwrap().is_empty());

        // justifying fuel's late task after sealing makes it eligible once
        ta.justify_delay(8, &admin(), "hydrant pit blocked", T0 + 6_002)
            .unwrap();
        let late = issuer.issue(&mut ta, T0 + 6_003).unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].role, Role::Fuel);
        assert!(issuer.issue(&mut ta, T0 + 6_004).unwrap().is_empty());
        assert_eq!(ta.badges_issued().len(), 5);
    }
}
