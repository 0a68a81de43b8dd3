//! Turnaround CLI Tool
//!
//! Auditor-side commands that work without a running desk: recompute a
//! certification hash from published values, rebuild a turnaround from a
//! ledger file, and check a ledger file's chain.

use serde::Serialize;
use std::path::PathBuf;
use std::process;

use turnaround_core::{AuditLedger, LedgerHealth};
use turnaround_desk::mirror;
use turnaround_domain::{CertificationHash, CertificationHashInput, MutationPolicy};

#[derive(Debug, Serialize)]
struct VerifyHashOutput {
    hash: String,
    expected: Option<String>,
    matches: Option<bool>,
}

#[derive(Debug, Serialize)]
struct HealthOutput {
    healthy: bool,
    ledger_id: String,
    entry_count: u64,
    latest_entry_hash: Option<String>,
    message: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn parse_u64(flag: &str, value: Option<&String>) -> Result<u64, String> {
    value
        .ok_or_else(|| format!("Missing {} argument", flag))?
        .parse()
        .map_err(|e| format!("Invalid {}: {}", flag, e))
}

fn parse_u32(flag: &str, value: Option<&String>) -> Result<u32, String> {
    value
        .ok_or_else(|| format!("Missing {} argument", flag))?
        .parse()
        .map_err(|e| format!("Invalid {}: {}", flag, e))
}

/// Collect `--flag value` pairs, ignoring unknown arguments
fn flag_values(args: &[String]) -> std::collections::HashMap<String, String> {
    let mut values = std::collections::HashMap::new();
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with("--") && i + 1 < args.len() {
            values.insert(args[i].clone(), args[i + 1].clone());
            i += 1;
        }
        i += 1;
    }
    values
}

fn cmd_verify_hash(args: &[String]) -> Result<(), String> {
    let flags = flag_values(args);
    let input = CertificationHashInput {
        off_chain_id: flags
            .get("--id")
            .cloned()
            .ok_or("Missing --id argument")?,
        actual_departure: parse_u64("--departure", flags.get("--departure"))?,
        on_time: parse_u32("--on-time", flags.get("--on-time"))?,
        late_unjustified: parse_u32("--late-unjustified", flags.get("--late-unjustified"))?,
        sealed_at: parse_u64("--sealed-at", flags.get("--sealed-at"))?,
    };
    let hash = input.compute();

    let expected = match flags.get("--expected") {
        Some(hex) => Some(CertificationHash::from_hex(hex).map_err(|e| e.to_string())?),
        None => None,
    };
    let matches = expected.map(|e| e == hash);

    print_json(&VerifyHashOutput {
        hash: hash.to_hex(),
        expected: expected.map(|e| e.to_hex()),
        matches,
    })?;

    match matches {
        Some(false) => Err("Certification hash does not match".to_string()),
        _ => Ok(()),
    }
}

fn cmd_replay(args: &[String]) -> Result<(), String> {
    let flags = flag_values(args);
    let db = flags.get("--db").map(PathBuf::from).ok_or("Missing --db argument")?;
    let id = flags.get("--id").ok_or("Missing --id argument")?;

    let ledger = AuditLedger::open(&db, "turnaround-cli")
        .map_err(|e| format!("Failed to open ledger: {}", e))?;
    let turnaround = mirror::replay_from_ledger(&ledger, id, MutationPolicy::permissive())
        .map_err(|e| format!("Replay failed: {}", e))?;

    print_json(&turnaround.snapshot())?;

    if turnaround.is_certified() && !turnaround.verify_certification() {
        return Err("Certification hash does not match replayed state".to_string());
    }
    Ok(())
}

fn cmd_health(args: &[String]) -> Result<(), String> {
    let flags = flag_values(args);
    let db = flags.get("--db").map(PathBuf::from).ok_or("Missing --db argument")?;

    let output = match AuditLedger::open(&db, "turnaround-cli") {
        Ok(ledger) => {
            let health = ledger.get_ledger_health();
            let latest = ledger
                .get_latest_entry()
                .map_err(|e| format!("Failed to read latest entry: {}", e))?;
            HealthOutput {
                healthy: health.status.is_ok(),
                ledger_id: health.ledger_id,
                entry_count: health.entry_count,
                latest_entry_hash: latest.map(|(_, entry)| hex::encode(entry.entry_hash)),
                message: match health.status {
                    LedgerHealth::Ok => "Chain verified".to_string(),
                    LedgerHealth::Corrupted { error_type, .. } => error_type,
                },
            }
        }
        Err(e) => HealthOutput {
            healthy: false,
            ledger_id: "turnaround-cli".to_string(),
            entry_count: 0,
            latest_entry_hash: None,
            message: e.to_string(),
        },
    };

    let healthy = output.healthy;
    print_json(&output)?;
    if healthy {
        Ok(())
    } else {
        Err("Ledger failed continuity check".to_string())
    }
}

fn print_usage() {
    println!("Turnaround CLI - Audit certified turnarounds");
    println!();
    println!("USAGE:");
    println!("    turnaround-cli verify-hash --id <id> --departure <ts> --on-time <n> --late-unjustified <n> --sealed-at <ts> [--expected <hex>]");
    println!("    turnaround-cli replay --db <ledger.db> --id <id>");
    println!("    turnaround-cli health --db <ledger.db>");
    println!();
    println!("COMMANDS:");
    println!("    verify-hash  Recompute a certification hash from its inputs");
    println!("    replay       Rebuild a turnaround from a ledger file");
    println!("    health       Run the ledger continuity check");
    println!();
    println!("Set RUST_LOG to enable diagnostic logging on stderr.");
}

fn main() {
    if std::env::var_os("RUST_LOG").is_some() {
        turnaround_core::logging::init_stderr();
    }

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Error: Usage: turnaround-cli <command> [options]");
        println!();
        print_usage();
        process::exit(1);
    }

    let rest = &args[2..];
    let result = match args[1].as_str() {
        "verify-hash" => cmd_verify_hash(rest),
        "replay" => cmd_replay(rest),
        "health" => cmd_health(rest),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(format!("Unknown command: {}", other)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
