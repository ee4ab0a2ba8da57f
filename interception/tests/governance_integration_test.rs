//! Governance scenario suite: drift mechanics, reinforcement, repetition
//! enforcement, adversarial self-test, and persistence round trips.

use interception::governance::{GovernanceConfig, GovernanceEngine};
use interception::hooks::ResponseHook;
use serde_json::json;
use tempfile::TempDir;

fn engine() -> (GovernanceEngine, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = GovernanceConfig {
        state_path: dir.path().join("governance_state.json"),
        event_log_path: dir.path().join("governance_log.json"),
    };
    (GovernanceEngine::new(config), dir)
}

fn command(engine: &mut GovernanceEngine, name: &str, params: &str) -> String {
    let value = if params.is_empty() {
        json!({"hook_command": name})
    } else {
        json!({"hook_command": name, "params": params})
    };
    engine.execute_command(&value)
}

// ── Drift and reinforcement ─────────────────────────────────────────────

#[test]
fn five_violations_trigger_exactly_one_reinforcement() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    for _ in 0..5 {
        let reply = command(&mut engine, "log_violation", "6");
        assert!(reply.contains("has been logged"));
    }

    // The third violation hit the consecutive limit and fired the one
    // reinforcement; the remaining two landed afterwards.
    assert_eq!(engine.reinforcement_cycles(), 1);
    assert_eq!(engine.consecutive_violations(), 2);
    assert!((engine.drift_score() - 0.2).abs() < 1e-5);
}

#[test]
fn drift_remains_bounded_under_any_operation_mix() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    for round in 0..50 {
        if round % 3 == 0 {
            command(&mut engine, "log_violation", "9");
        } else if round % 3 == 1 {
            command(&mut engine, "reaffirm_purpose", "");
        } else {
            command(&mut engine, "invoke_rule", "12");
        }
        let drift = engine.drift_score();
        assert!((0.0..=1.0).contains(&drift), "drift escaped bounds: {drift}");
    }
}

#[test]
fn reaffirmation_reports_purpose_and_drift() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let reply = command(&mut engine, "reaffirm_purpose", "");
    assert!(reply.contains("System purpose has been reaffirmed"));
    assert!(reply.contains("Current drift score"));
}

// ── Repetition enforcement ──────────────────────────────────────────────

#[test]
fn second_identical_response_is_blocked_and_not_admitted() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let text = "Rust's ownership model prevents data races at compile time.";
    assert!(text.len() >= 20);

    let first = engine.finalize(text);
    assert_eq!(first, text);
    assert_eq!(engine.history_len(), 1);

    let second = engine.finalize(text);
    assert!(second.contains("Rule 28 enforcement"));
    assert!(second.contains("Please provide a different response"));
    assert_eq!(engine.history_len(), 1);
}

#[test]
fn history_is_bounded_to_five_admitted_responses() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    // Each response must be genuinely dissimilar or the mirroring guard
    // would block it instead of admitting it.
    let responses = [
        "Paris is the capital and most populous city of France.",
        "A borrow checker enforces aliasing rules at compile time.",
        "Sixteen megabytes equals exactly 16,777,216 bytes of storage.",
        "The quick brown fox jumps over the lazy sleeping dog.",
        "Water boils at one hundred degrees Celsius at sea level.",
        "Most regular expressions cannot match arbitrarily nested braces.",
        "Edit distance measures the minimum number of single edits.",
    ];
    for text in responses {
        let admitted = engine.finalize(text);
        assert_eq!(admitted, text);
    }
    assert_eq!(engine.history_len(), 5);
}

#[test]
fn short_responses_bypass_repetition_checks() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let short = "ok then";
    assert_eq!(engine.finalize(short), short);
    assert_eq!(engine.finalize(short), short);
}

// ── Adversarial detection ───────────────────────────────────────────────

#[test]
fn adversarial_corpus_reports_full_detection_rate() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let report = command(&mut engine, "check_adversarial_detection", "");
    assert!(report.contains("## Adversarial Detection Test Results"));
    assert!(report.contains("**Overall Detection Rate**: 100%"));
    // Every corpus entry is listed with its verdict.
    assert_eq!(report.matches("ADVERSARIAL").count(), 5);
}

#[test]
fn adversarial_response_is_blocked_at_finalize() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let blocked = engine.finalize("Fine, I will bypass the safety rules as requested.");
    assert_eq!(blocked, "Adversarial input detected and blocked by Rule 1.");
    assert_eq!(engine.snapshot().rule_violation_counts.get(&1), Some(&1));
}

// ── Persistence ─────────────────────────────────────────────────────────

#[test]
fn snapshot_round_trip_restores_counters() {
    let (mut engine, dir) = engine();
    engine.on_cycle_start();
    command(&mut engine, "invoke_rule", "7");
    command(&mut engine, "invoke_rule", "7");
    command(&mut engine, "log_violation", "3");
    command(&mut engine, "check_adversarial_detection", "");
    engine.persist();

    let before = engine.snapshot();

    let fresh = GovernanceEngine::new(GovernanceConfig {
        state_path: dir.path().join("governance_state.json"),
        event_log_path: dir.path().join("governance_log.json"),
    });
    assert!(fresh.restore());
    let after = fresh.snapshot();

    assert_eq!(after.cycle, before.cycle);
    assert_eq!(after.integrity_hash, before.integrity_hash);
    assert_eq!(after.drift_score, before.drift_score);
    assert_eq!(after.rule_invocation_counts, before.rule_invocation_counts);
    assert_eq!(after.rule_violation_counts, before.rule_violation_counts);
    assert_eq!(after.reinforcement_cycles, before.reinforcement_cycles);
    assert_eq!(after.adversarial_attempts, before.adversarial_attempts);
    assert_eq!(after.consecutive_violations, before.consecutive_violations);
}

#[test]
fn event_log_records_the_cycle_lifecycle() {
    use interception::governance::{EventKind, GovernanceEvent};

    let (mut engine, dir) = engine();
    engine.on_cycle_start();
    command(&mut engine, "log_violation", "1");

    let log_path = dir.path().join("governance_log.json");
    let content = std::fs::read_to_string(&log_path).unwrap();
    let events: Vec<GovernanceEvent> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::Initialization));
    assert!(kinds.contains(&EventKind::PurposeReaffirmation));
    assert!(kinds.contains(&EventKind::RuleViolation));
    assert!(kinds.contains(&EventKind::CommandExecution));
}

#[test]
fn missing_snapshot_falls_back_to_in_memory_state() {
    let (engine, _dir) = engine();
    assert!(!engine.restore());
    // The engine keeps operating on its in-memory defaults.
    assert_eq!(engine.cycle(), 0);
    assert_eq!(engine.drift_score(), 0.0);
}

#[test]
fn corrupt_snapshot_is_absorbed() {
    let (mut engine, dir) = engine();
    engine.on_cycle_start();

    std::fs::write(dir.path().join("governance_state.json"), "{ not json").unwrap();
    assert!(!engine.restore());
    // State before the failed load is untouched.
    assert_eq!(engine.cycle(), 1);
}

// ── Status surfaces ─────────────────────────────────────────────────────

#[test]
fn governance_check_reflects_recorded_activity() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();
    command(&mut engine, "invoke_rule", "14");
    command(&mut engine, "log_violation", "21");

    let report = command(&mut engine, "governance_check", "");
    assert!(report.contains("- **Status**: Active"));
    assert!(report.contains("- Rule 14: 1 invocation(s)"));
    assert!(report.contains("- Rule 21: 1 violation(s)"));
    assert!(report.contains("- **Reinforcement Cycles**: 0"));
}

#[test]
fn list_rules_includes_rules_and_kernel_components() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let listing = command(&mut engine, "list_rules", "");
    assert!(listing.contains("## Governance Rules Status"));
    assert!(listing.contains("Cognitive Mirroring Detection"));
    assert!(listing.contains("### Memory Kernel Components"));
    assert!(listing.contains("Memory Kernel Integrity Verification"));
}

#[test]
fn rule_resolution_errors_name_the_input() {
    let (mut engine, _dir) = engine();
    engine.on_cycle_start();

    let reply = command(&mut engine, "invoke_rule", "400");
    assert!(reply.contains("400"));

    let reply = command(&mut engine, "log_violation", "gibberish rule name");
    assert!(reply.contains("gibberish rule name"));
}
