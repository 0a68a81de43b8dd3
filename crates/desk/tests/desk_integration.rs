//! Integration tests for the turnaround desk
//!
//! These tests verify end-to-end scenarios including:
//! - Full lifecycle mirrored into a ledger file, then restored after restart
//! - Independent turnarounds progressing concurrently
//! - Tampering with the ledger file detected on reopen
//! - Badge issuance after certification

use std::path::PathBuf;

use turnaround_core::{AuditLedger, Config};
use turnaround_desk::{BadgeIssuer, DeskError, TurnaroundDesk};
use turnaround_domain::{
    FixedIntervalTemplate, Identity, MutationPolicy, Role, TaskStatus, Timestamp,
    TurnaroundHeader, TASK_COUNT,
};

const T0: Timestamp = 1_760_600_000;
const MINUTE: u64 = 60;

fn temp_db(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}.db", prefix, uuid::Uuid::new_v4()))
}

fn cleanup(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
}

fn config_for(path: &PathBuf) -> Config {
    Config::from_toml_str(&format!(
        "[ledger]\npath = \"{}\"\nledger_id = \"desk-it\"\n",
        path.display()
    ))
    .unwrap()
}

fn header(id: &str) -> TurnaroundHeader {
    TurnaroundHeader::new(id, "FRA", T0, T0 + 150 * MINUTE).unwrap()
}

fn admin() -> Identity {
    Identity::from("station-admin")
}

#[tokio::test]
async fn test_lifecycle_survives_restart() {
    let path = temp_db("desk_lifecycle");
    let template = FixedIntervalTemplate::new(5 * MINUTE, true);
    let fuel = Identity::from("fuel-lead");

    // Phase 1: run a turnaround to certification with the mirror attached
    let (sealed, tasks) = {
        let desk = TurnaroundDesk::from_config(&config_for(&path)).unwrap();
        let handle = desk
            .create(header("LH400"), &template, admin(), T0 - 30 * MINUTE)
            .await
            .unwrap();

        handle
            .assign_role(&admin(), Role::Fuel, fuel.clone(), T0)
            .await
            .unwrap();
        for id in 0..TASK_COUNT {
            let due = T0 + id as u64 * 5 * MINUTE;
            let at = if id == 5 { due + 10 * MINUTE } else { due };
            handle.complete_task(id, &admin(), at).await.unwrap();
        }
        assert!(handle.kpis().await.sla_breached);
        handle
            .justify_delay(5, &admin(), "bird strike inspection", T0 + 60 * MINUTE)
            .await
            .unwrap();
        assert!(!handle.kpis().await.sla_breached);

        let sealed = handle.certify(T0 + 140 * MINUTE, &admin()).await.unwrap();
        assert_eq!(handle.pending_mirror().await, 0);
        (sealed, handle.tasks().await)
    };

    // Phase 2: a fresh desk restores the turnaround from the ledger file
    {
        let desk = TurnaroundDesk::from_config(&config_for(&path)).unwrap();
        assert!(matches!(
            desk.get("LH400").await,
            Err(DeskError::UnknownTurnaround(_))
        ));

        let handle = desk.restore("LH400").await.unwrap();
        assert_eq!(handle.certification().await, Some(sealed));
        assert_eq!(handle.tasks().await, tasks);
        assert!(handle.verify_certification().await);
        assert_eq!(handle.operational_duration().await, 140 * MINUTE);

        // the id is taken, live or mirrored
        assert!(matches!(
            desk.create(header("LH400"), &template, admin(), T0).await,
            Err(DeskError::DuplicateTurnaround(_))
        ));

        // new records continue the mirrored sequence
        let badges = handle
            .issue_badges(&BadgeIssuer::new(), T0 + 141 * MINUTE)
            .await
            .unwrap();
        assert!(badges.iter().any(|b| b.role == Role::Fuel && b.identity == fuel));
        assert_eq!(handle.pending_mirror().await, 0);
    }

    // Phase 3: the chain is intact and replays including the badges
    {
        let ledger = AuditLedger::open(&path, "desk-it").unwrap();
        assert!(ledger.get_ledger_health().status.is_ok());
        let rebuilt = turnaround_desk::mirror::replay_from_ledger(
            &ledger,
            "LH400",
            MutationPolicy::default(),
        )
        .unwrap();
        assert_eq!(rebuilt.badges_issued().len(), 1);
    }

    cleanup(&path);
}

#[tokio::test]
async fn test_tampered_ledger_refuses_to_open() {
    let path = temp_db("desk_tamper");
    {
        let desk = TurnaroundDesk::from_config(&config_for(&path)).unwrap();
        let handle = desk
            .create(
                header("AF1234"),
                &FixedIntervalTemplate::new(MINUTE, false),
                admin(),
                T0,
            )
            .await
            .unwrap();
        for id in 0..4 {
            handle.complete_task(id, &admin(), T0 + 10).await.unwrap();
        }
    }

    {
        let ledger = AuditLedger::open(&path, "desk-it").unwrap();
        ledger
            .__test_execute_raw_sql(
                "UPDATE audit_entries SET payload = replace(payload, 'on_time', 'late') WHERE turnaround_seq = 2",
                &[],
            )
            .unwrap();
    }

    assert!(AuditLedger::open(&path, "desk-it").is_err());
    assert!(TurnaroundDesk::from_config(&config_for(&path)).is_err());

    cleanup(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_turnarounds_in_parallel() {
    let desk = std::sync::Arc::new(
        TurnaroundDesk::new(MutationPolicy::default())
            .with_ledger(AuditLedger::open_in_memory("parallel").unwrap()),
    );

    let mut joins = Vec::new();
    for n in 0..6 {
        let desk = desk.clone();
        joins.push(tokio::spawn(async move {
            let id = format!("TA-{}", n);
            let handle = desk
                .create(
                    header(&id),
                    &FixedIntervalTemplate::new(5 * MINUTE, true),
                    admin(),
                    T0,
                )
                .await
                .unwrap();
            for task in 0..TASK_COUNT {
                let status = handle
                    .complete_task(task, &admin(), T0 + task as u64 * 5 * MINUTE)
                    .await
                    .unwrap();
                assert_eq!(status, TaskStatus::OnTime);
            }
            handle.certify(T0 + 140 * MINUTE, &admin()).await.unwrap()
        }));
    }

    let mut hashes = Vec::new();
    for join in joins {
        let record = join.await.unwrap();
        assert_eq!(record.on_time, TASK_COUNT as u32);
        hashes.push(record.hash);
    }
    hashes.sort_by_key(|h| h.to_hex());
    hashes.dedup();
    assert_eq!(hashes.len(), 6, "distinct ids must seal distinct hashes");

    assert_eq!(desk.len().await, 6);
    let ledger = turnaround_desk::mirror::lock(desk.ledger().unwrap()).unwrap();
    for n in 0..6 {
        let last = ledger.last_turnaround_seq(&format!("TA-{}", n)).unwrap();
        assert_eq!(last, Some(TASK_COUNT as u64 + 1));
    }
}
