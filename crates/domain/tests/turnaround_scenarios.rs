//! Integration tests for the turnaround lifecycle
//!
//! These tests drive a turnaround end to end through its public API:
//! - Full on-time turnaround and certification
//! - Late completion, SLA breach and justification
//! - Authorization by role assignment and operational override
//! - Post-certification policy and replay from the audit log

use turnaround_domain::{
    AuditEvent, FixedIntervalTemplate, Identity, MutationPolicy, Privilege, Requirement, Role,
    StandardTemplate, TaskStatus, Timestamp, Turnaround, TurnaroundError, TurnaroundHeader,
    TASK_COUNT,
};

const T0: Timestamp = 1_760_600_000;
const MINUTE: u64 = 60;

fn admin() -> Identity {
    Identity::from("station-admin")
}

/// 27 mandatory tasks due at T0+0, T0+5min, ... T0+130min
fn five_minute_turnaround() -> Turnaround {
    let header = TurnaroundHeader::new("LH400-FRA-20261016", "FRA", T0, T0 + 150 * MINUTE).unwrap();
    Turnaround::create(
        header,
        &FixedIntervalTemplate::new(5 * MINUTE, true),
        admin(),
        T0 - 30 * MINUTE,
    )
    .unwrap()
}

fn deadline(task_id: usize) -> Timestamp {
    T0 + task_id as u64 * 5 * MINUTE
}

#[test]
fn test_all_on_time_then_certify() {
    let mut ta = five_minute_turnaround();

    for id in 0..TASK_COUNT {
        let status = ta.complete_task(id, &admin(), deadline(id)).unwrap();
        assert_eq!(status, TaskStatus::OnTime);
    }

    let kpis = ta.compute_kpis();
    assert_eq!(kpis.on_time, 27);
    assert_eq!(kpis.late, 0);

    let record = ta.certify(T0 + 140 * MINUTE, &admin()).unwrap().clone();
    assert_eq!(record.on_time, 27);
    assert_eq!(record.late_unjustified, 0);
    assert!(!record.sla_breached());
    assert!(!ta.kpis().sla_breached);
    assert!(ta.is_certified());
    assert_eq!(ta.operational_duration(), 140 * MINUTE);

    let recomputed = record.hash_input(ta.off_chain_id()).compute();
    assert_eq!(recomputed, record.hash);
}

#[test]
fn test_late_task_breaches_until_justified() {
    let mut ta = five_minute_turnaround();

    ta.complete_task(5, &admin(), deadline(5) + 10 * MINUTE)
        .unwrap();
    assert_eq!(ta.task(5).unwrap().status, TaskStatus::Late);
    assert!(ta.kpis().sla_breached);
    assert_eq!(ta.kpis().late_unjustified, 1);

    ta.justify_delay(5, &admin(), "baggage belt failure", T0 + 60 * MINUTE)
        .unwrap();
    let kpis = ta.kpis();
    assert!(!kpis.sla_breached);
    assert_eq!(kpis.late_unjustified, 0);
    assert_eq!(ta.compute_kpis().late, 1);
}

#[test]
fn test_role_assignment_authorizes_completion() {
    let mut ta = five_minute_turnaround();
    let fueler = Identity::from("fuel-crew-7");
    let caterer = Identity::from("catering-3");

    // task 2 is a fuel task in the round-robin template
    assert_eq!(ta.task(2).unwrap().role, Role::Fuel);
    ta.assign_role(&admin(), Role::Fuel, fueler.clone(), T0)
        .unwrap();
    ta.assign_role(&admin(), Role::Catering, caterer.clone(), T0)
        .unwrap();

    assert_eq!(
        ta.complete_task(2, &caterer, T0),
        Err(TurnaroundError::Unauthorized {
            identity: "catering-3".to_string(),
            required: Requirement::Role(Role::Fuel),
        })
    );
    assert!(!ta.task(2).unwrap().is_completed());

    assert_eq!(ta.complete_task(2, &fueler, T0), Ok(TaskStatus::OnTime));
    assert_eq!(ta.task(2).unwrap().completed_by.as_ref(), Some(&fueler));
}

#[test]
fn test_admin_without_operational_cannot_complete_or_certify() {
    let mut ta = five_minute_turnaround();
    let it = Identity::from("it-admin");
    ta.grant_privilege(&admin(), it.clone(), Privilege::Administrative, T0)
        .unwrap();

    assert!(matches!(
        ta.complete_task(0, &it, T0),
        Err(TurnaroundError::Unauthorized { .. })
    ));
    assert_eq!(
        ta.certify(T0, &it).unwrap_err(),
        TurnaroundError::Unauthorized {
            identity: "it-admin".to_string(),
            required: Requirement::Privilege(Privilege::Operational),
        }
    );

    // but may still provision roles
    ta.assign_role(&it, Role::Gate, Identity::from("gate-1"), T0)
        .unwrap();
    assert!(ta
        .revoke_privilege(&it, &admin(), Privilege::Operational, T0)
        .unwrap());
    assert!(ta.complete_task(0, &admin(), T0).is_err());
}

#[test]
fn test_certify_lists_every_outstanding_mandatory_task() {
    let mut ta = five_minute_turnaround();
    for id in (0..TASK_COUNT).filter(|id| id % 3 != 0) {
        ta.complete_task(id, &admin(), deadline(id)).unwrap();
    }
    let log_len = ta.audit_log().len();

    let err = ta.certify(T0 + 140 * MINUTE, &admin()).unwrap_err();
    let expected: Vec<usize> = (0..TASK_COUNT).filter(|id| id % 3 == 0).collect();
    assert_eq!(
        err,
        TurnaroundError::MandatoryTaskIncomplete {
            outstanding: expected
        }
    );
    assert!(!ta.is_certified());
    assert!(ta.certification().is_none());
    assert_eq!(ta.audit_log().len(), log_len);

    // waiving the outstanding tasks unblocks certification
    for id in (0..TASK_COUNT).filter(|id| id % 3 == 0) {
        ta.set_mandatory(id, &admin(), false, T0 + 139 * MINUTE)
            .unwrap();
    }
    ta.certify(T0 + 140 * MINUTE, &admin()).unwrap();
    assert_eq!(ta.certification().map(|c| c.on_time), Some(18));
}

#[test]
fn test_certified_turnaround_is_frozen_under_default_policy() {
    let mut ta = five_minute_turnaround();
    ta.complete_task(3, &admin(), deadline(3) + MINUTE).unwrap();
    for id in (0..TASK_COUNT).filter(|id| *id != 3) {
        ta.complete_task(id, &admin(), deadline(id)).unwrap();
    }
    let sealed = ta.certify(T0 + 140 * MINUTE, &admin()).unwrap().clone();
    assert!(sealed.sla_breached());

    assert_eq!(
        ta.justify_delay(3, &admin(), "late", T0 + 141 * MINUTE),
        Err(TurnaroundError::AlreadyCertified)
    );
    assert_eq!(
        ta.set_mandatory(3, &admin(), false, T0 + 141 * MINUTE),
        Err(TurnaroundError::AlreadyCertified)
    );
    assert_eq!(
        ta.certify(T0 + 150 * MINUTE, &admin()).unwrap_err(),
        TurnaroundError::AlreadyCertified
    );
    assert_eq!(ta.certification(), Some(&sealed));
}

#[test]
fn test_permissive_policy_keeps_sealed_snapshot() {
    let header = TurnaroundHeader::new("TA-P", "FRA", T0, T0 + 150 * MINUTE).unwrap();
    let mut ta = Turnaround::create(
        header,
        &FixedIntervalTemplate::new(5 * MINUTE, true),
        admin(),
        T0,
    )
    .unwrap()
    .with_policy(MutationPolicy::permissive());

    ta.complete_task(0, &admin(), T0 + MINUTE).unwrap();
    for id in 1..TASK_COUNT {
        ta.complete_task(id, &admin(), deadline(id)).unwrap();
    }
    let sealed = ta.certify(T0 + 140 * MINUTE, &admin()).unwrap().clone();
    assert_eq!(sealed.late_unjustified, 1);

    ta.justify_delay(0, &admin(), "chocks missing", T0 + 150 * MINUTE)
        .unwrap();
    ta.set_mandatory(1, &admin(), false, T0 + 150 * MINUTE)
        .unwrap();

    // the live view moves, the sealed record does not
    assert!(!ta.kpis().sla_breached);
    assert_eq!(ta.certification(), Some(&sealed));
    assert!(ta.verify_certification());
}

#[test]
fn test_strict_policy_rejects_justification_revision() {
    let header = TurnaroundHeader::new("TA-S", "FRA", T0, T0 + 150 * MINUTE).unwrap();
    let mut ta = Turnaround::create(header, &StandardTemplate, admin(), T0)
        .unwrap()
        .with_policy(MutationPolicy::strict());

    let due = ta.task(0).unwrap().deadline;
    ta.complete_task(0, &admin(), due + 1).unwrap();
    ta.justify_delay(0, &admin(), "tug unavailable", due + 2)
        .unwrap();
    assert_eq!(
        ta.justify_delay(0, &admin(), "second story", due + 3),
        Err(TurnaroundError::AlreadyJustified { task_id: 0 })
    );
}

#[test]
fn test_justify_preconditions() {
    let mut ta = five_minute_turnaround();
    assert_eq!(
        ta.justify_delay(TASK_COUNT, &admin(), "x", T0),
        Err(TurnaroundError::InvalidTask { task_id: TASK_COUNT })
    );
    assert_eq!(
        ta.justify_delay(4, &admin(), "x", T0),
        Err(TurnaroundError::NotCompleted { task_id: 4 })
    );
    ta.complete_task(4, &admin(), deadline(4)).unwrap();
    assert_eq!(
        ta.justify_delay(4, &admin(), "x", T0),
        Err(TurnaroundError::NotLate { task_id: 4 })
    );
}

#[test]
fn test_audit_log_replays_to_live_state() {
    let mut ta = five_minute_turnaround();
    ta.assign_role(&admin(), Role::Gate, Identity::from("gate-1"), T0)
        .unwrap();
    for id in 0..TASK_COUNT {
        let at = if id == 9 { deadline(id) + 7 * MINUTE } else { deadline(id) };
        ta.complete_task(id, &admin(), at).unwrap();
    }
    ta.justify_delay(9, &admin(), "crew bus late", T0 + 100 * MINUTE)
        .unwrap();
    ta.certify(T0 + 140 * MINUTE, &admin()).unwrap();

    let records = ta.audit_log().records();
    assert!(records
        .iter()
        .enumerate()
        .all(|(i, r)| r.seq == i as u64));
    assert!(matches!(
        records.last().map(|r| &r.event),
        Some(AuditEvent::TurnaroundCertified { .. })
    ));

    let rebuilt = Turnaround::replay(records, ta.policy()).unwrap();
    assert_eq!(rebuilt.tasks(), ta.tasks());
    assert_eq!(rebuilt.certification(), ta.certification());
    assert_eq!(rebuilt, ta);
}
