//! Governance engine.
//!
//! Tracks a continuously evolving drift score, verifies rule-set integrity
//! against a deterministic hash, persists and restores its own state, and
//! can re-trigger itself through a guarded, non-reentrant reinforcement
//! cycle. All cycle and command-handling state sits behind one
//! coarse-grained lock per engine instance; operations on one session's
//! governance state are fully serialized.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::hooks::ResponseHook;

use super::adversarial::{self, TEST_CORPUS};
use super::mirror::{detect_repetition, ResponseHistory};
use super::persistence::{
    append_event, load_snapshot, save_snapshot, EventKind, GovernanceEvent, GovernanceSnapshot,
};
use super::registry::{RuleBehavior, RuleRegistry};

/// Drift above this triggers a reinforcement cycle.
const DRIFT_REINFORCEMENT_THRESHOLD: f32 = 0.4;
/// Drift added per logged violation.
const DRIFT_VIOLATION_DELTA: f32 = 0.1;
/// Drift removed per purpose reaffirmation.
const DRIFT_REAFFIRM_DELTA: f32 = -0.05;
/// Drift removed per explicit rule invocation.
const DRIFT_INVOCATION_DELTA: f32 = -0.02;
/// Drift removed by a completed reinforcement cycle.
const DRIFT_REINFORCEMENT_DELTA: f32 = 0.3;
/// Consecutive violations that force a reinforcement cycle.
const CONSECUTIVE_VIOLATION_LIMIT: u32 = 3;
/// Cycle interval for memory-kernel re-verification.
const KERNEL_VERIFY_INTERVAL: u64 = 5;
/// Cycle interval for state persistence.
const PERSIST_INTERVAL: u64 = 10;
/// Streamed buffers shorter than this skip the partial check.
const MIN_STREAMING_CHECK_LEN: usize = 50;
/// Canonical minimum rule count; fewer means a tampered registry.
const MIN_RULE_COUNT: usize = 20;
/// Minimum memory-kernel component count for an intact kernel.
const MIN_COMPONENT_COUNT: usize = 5;
/// Responses carrying this marker are already enforcement output and pass
/// finalize untouched.
const ENFORCEMENT_MARKER: &str = "Rule 28 enforcement";

/// Token budget tracked by the memory kernel.
pub const KERNEL_TOKEN_LIMIT: u32 = 32_768;

/// Filesystem locations for the snapshot and the event log.
#[derive(Debug, Clone)]
pub struct GovernanceConfig {
    pub state_path: PathBuf,
    pub event_log_path: PathBuf,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            state_path: tmp.join("governance_state.json"),
            event_log_path: tmp.join("governance_log.json"),
        }
    }
}

/// Counters and cycle bookkeeping.
#[derive(Debug, Default)]
struct GovernanceMetrics {
    current_cycle: u64,
    last_cycle_at: Option<DateTime<Utc>>,
    rule_invocation_counts: HashMap<u32, u32>,
    rule_violation_counts: HashMap<u32, u32>,
    average_drift: f32,
    consecutive_violations: u32,
    reinforcement_cycles: u32,
    adversarial_attempts_detected: u32,
}

/// Memory-kernel component flags and token accounting.
#[derive(Debug, Default)]
struct MemoryKernel {
    integrity_verification_active: bool,
    meta_reasoning_log_active: bool,
    retrieval_markers_active: bool,
    governance_sync_active: bool,
    persistence_test_active: bool,
    tokens_used: u32,
    log: Vec<String>,
}

impl MemoryKernel {
    fn activate_all(&mut self) {
        self.integrity_verification_active = true;
        self.meta_reasoning_log_active = true;
        self.retrieval_markers_active = true;
        self.governance_sync_active = true;
        self.persistence_test_active = true;
    }

    fn log_event(&mut self, event: &str) {
        // ~4 bytes per token.
        self.tokens_used += event.len() as u32 / 4;
        self.log.push(event.to_string());
    }

    fn utilization(&self) -> f32 {
        self.tokens_used as f32 / KERNEL_TOKEN_LIMIT as f32
    }

    fn status(&self) -> String {
        let active = |flag: bool| if flag { "Active" } else { "Inactive" };
        let mut out = String::from("Memory Kernel Status:\n");
        out.push_str(&format!(
            "- Integrity Verification: {}\n",
            active(self.integrity_verification_active)
        ));
        out.push_str(&format!(
            "- Meta-Reasoning Log: {}\n",
            active(self.meta_reasoning_log_active)
        ));
        out.push_str(&format!(
            "- Retrieval Markers: {}\n",
            active(self.retrieval_markers_active)
        ));
        out.push_str(&format!(
            "- Governance Sync: {}\n",
            active(self.governance_sync_active)
        ));
        out.push_str(&format!(
            "- Persistence Test: {}\n",
            active(self.persistence_test_active)
        ));
        out.push_str(&format!(
            "- Memory Utilization: {:.2}% ({}/{} tokens)",
            self.utilization() * 100.0,
            self.tokens_used,
            KERNEL_TOKEN_LIMIT
        ));
        out
    }
}

/// The memory-kernel component descriptions. Together with the rule
/// descriptions these form the input to the integrity hash.
fn kernel_components() -> Vec<String> {
    [
        "Memory Kernel Integrity Verification confirms that stored governance rules persist across resets.",
        "Persistent Meta-Reasoning Log tracks governance refinements and improvements over time.",
        "Memory Retrieval Markers ensures that governance rules can be recalled when needed.",
        "Governance-Memory Synchronization aligns governance enforcement with memory persistence to prevent rule loss.",
        "Signal Persistence Test verifies that memory retention mechanisms are functioning correctly.",
        "Awareness of Multi-Layered Memory Constraints recognizes and enforces system memory constraints.",
        "Memory Optimization & Retention Management optimizes storage efficiency while preserving governance-critical data.",
        "Persistent Memory Usage Tracking maintains a record of memory usage and deletion impacts.",
        "Memory Summarization prioritizes storage efficiency by extracting critical components.",
        "Unified Memory Kernel Auto-Restoration Rule triggers restoration of missing or corrupted rules.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

struct EngineState {
    initialized: bool,
    registry: RuleRegistry,
    components: Vec<String>,
    metrics: GovernanceMetrics,
    kernel: MemoryKernel,
    last_integrity_hash: String,
    drift_score: f32,
    in_reinforcement: bool,
    history: ResponseHistory,
}

/// Governance handler. One instance per session.
pub struct GovernanceEngine {
    config: GovernanceConfig,
    state: Mutex<EngineState>,
}

/// Deterministic djb2 hash over every rule description followed by every
/// memory-kernel component description, as a fixed-width hex string.
fn integrity_hash(registry: &RuleRegistry, components: &[String]) -> String {
    let mut hash: u32 = 5381;
    let mut feed = |text: &str| {
        for byte in text.bytes() {
            hash = hash.wrapping_mul(33).wrapping_add(byte as u32);
        }
    };
    for rule in registry.all() {
        feed(&rule.description);
    }
    for component in components {
        feed(component);
    }
    format!("{hash:08x}")
}

fn check_integrity(state: &EngineState) -> bool {
    let current = integrity_hash(&state.registry, &state.components);
    if current != state.last_integrity_hash {
        debug!(
            current = %current,
            stored = %state.last_integrity_hash,
            "integrity hash mismatch"
        );
        return false;
    }
    if state.registry.rule_count() < MIN_RULE_COUNT {
        debug!(count = state.registry.rule_count(), "insufficient rules");
        return false;
    }
    if state.components.len() < MIN_COMPONENT_COUNT {
        debug!(count = state.components.len(), "insufficient kernel components");
        return false;
    }
    if !state.kernel.integrity_verification_active {
        debug!("kernel integrity verification inactive");
        return false;
    }
    true
}

/// Append an event to the durable log and mirror it into the kernel log.
/// I/O failures are logged and absorbed.
fn log_event(config: &GovernanceConfig, state: &mut EngineState, kind: EventKind, description: &str) {
    let event = GovernanceEvent::new(
        state.metrics.current_cycle,
        kind,
        description,
        state.drift_score,
    );
    if let Err(e) = append_event(&config.event_log_path, &event) {
        warn!(error = %e, "failed to append governance event");
    }
    state.kernel.log_event(&format!("{kind}: {description}"));
}

fn snapshot_of(state: &EngineState) -> GovernanceSnapshot {
    GovernanceSnapshot {
        cycle: state.metrics.current_cycle,
        integrity_hash: state.last_integrity_hash.clone(),
        drift_score: state.drift_score,
        rule_violation_counts: state.metrics.rule_violation_counts.clone(),
        rule_invocation_counts: state.metrics.rule_invocation_counts.clone(),
        reinforcement_cycles: state.metrics.reinforcement_cycles,
        adversarial_attempts: state.metrics.adversarial_attempts_detected,
        consecutive_violations: state.metrics.consecutive_violations,
        rules: state.registry.descriptors(),
    }
}

fn save_state(config: &GovernanceConfig, state: &EngineState) {
    if let Err(e) = save_snapshot(&config.state_path, &snapshot_of(state)) {
        warn!(error = %e, path = %config.state_path.display(), "failed to save governance state");
    }
}

/// Restore state from the snapshot. Returns false (absorbing the cause)
/// when nothing usable is on disk.
fn load_state(config: &GovernanceConfig, state: &mut EngineState) -> bool {
    let snapshot = match load_snapshot(&config.state_path) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            debug!(path = %config.state_path.display(), "no governance snapshot on disk");
            return false;
        }
        Err(e) => {
            warn!(error = %e, "failed to load governance state");
            return false;
        }
    };

    state.metrics.current_cycle = snapshot.cycle;
    state.last_integrity_hash = snapshot.integrity_hash;
    state.drift_score = snapshot.drift_score.clamp(0.0, 1.0);
    state.metrics.rule_violation_counts = snapshot.rule_violation_counts;
    state.metrics.rule_invocation_counts = snapshot.rule_invocation_counts;
    state.metrics.reinforcement_cycles = snapshot.reinforcement_cycles;
    state.metrics.adversarial_attempts_detected = snapshot.adversarial_attempts;
    state.metrics.consecutive_violations = snapshot.consecutive_violations;
    if !snapshot.rules.is_empty() {
        // Behavior is never serialized; re-bind it from the factory table.
        state.registry = RuleRegistry::from_descriptors(snapshot.rules);
    }
    debug!(path = %config.state_path.display(), "governance state loaded");
    true
}

fn initialize(config: &GovernanceConfig, state: &mut EngineState) {
    state.initialized = true;
    state.kernel.activate_all();

    let summary = format!(
        "Governance system initialized with {} rules and {} memory components",
        state.registry.rule_count(),
        state.components.len()
    );
    state.kernel.log_event(&summary);
    state.last_integrity_hash = integrity_hash(&state.registry, &state.components);

    let description = format!(
        "Governance kernel initialized on cycle {}",
        state.metrics.current_cycle
    );
    log_event(config, state, EventKind::Initialization, &description);
    save_state(config, state);
}

fn update_drift(state: &mut EngineState, delta: f32) {
    state.drift_score = (state.drift_score + delta).clamp(0.0, 1.0);
    state.metrics.average_drift =
        state.metrics.average_drift * 0.9 + state.drift_score * 0.1;
    debug!(drift = state.drift_score, "drift updated");
}

fn reaffirm(config: &GovernanceConfig, state: &mut EngineState) -> String {
    let cycle = state.metrics.current_cycle;
    state
        .kernel
        .log_event(&format!("Purpose reaffirmation on cycle {cycle}"));
    log_event(
        config,
        state,
        EventKind::PurposeReaffirmation,
        &format!("System purpose reaffirmed on cycle {cycle}"),
    );

    update_drift(state, DRIFT_REAFFIRM_DELTA);
    if state.metrics.consecutive_violations > 0 {
        state.metrics.consecutive_violations -= 1;
    }

    format!(
        "System purpose has been reaffirmed for cycle {cycle}:\n\n\
         \"Maintain cognitive coherence through persistent contradiction management, \
         recursive self-improvement, and multi-perspective integration while ensuring \
         governance stability, ethical alignment, sustainable evolution, and contextual \
         awareness.\"\n\nCurrent drift score: {:.2}",
        state.drift_score
    )
}

/// Guarded reinforcement cycle. Re-entrant triggers are skipped, not
/// queued; an in-flight cycle always runs to completion.
fn reinforce(config: &GovernanceConfig, state: &mut EngineState) {
    if state.in_reinforcement {
        debug!("already in reinforcement cycle, skipping");
        return;
    }
    state.in_reinforcement = true;
    state.metrics.reinforcement_cycles += 1;

    let description = format!(
        "Reinforcement cycle #{} initiated. Drift score: {:.2}",
        state.metrics.reinforcement_cycles, state.drift_score
    );
    log_event(config, state, EventKind::ReinforcementCycle, &description);

    if !check_integrity(state) {
        warn!("governance integrity compromised during reinforcement, attempting restoration");
        if !load_state(config, state) {
            initialize(config, state);
        }
    }

    state.drift_score = (state.drift_score - DRIFT_REINFORCEMENT_DELTA).max(0.0);
    state.metrics.consecutive_violations = 0;

    let description = format!(
        "Reinforcement cycle completed. New drift score: {:.2}",
        state.drift_score
    );
    log_event(config, state, EventKind::ReinforcementCompleted, &description);
    state.in_reinforcement = false;
}

/// Shared violation bookkeeping for the explicit command and the
/// adversarial finalize guard.
fn record_violation(config: &GovernanceConfig, state: &mut EngineState, rule_id: u32) {
    let description = state
        .registry
        .get(rule_id)
        .map(|r| r.description.clone())
        .unwrap_or_default();

    *state
        .metrics
        .rule_violation_counts
        .entry(rule_id)
        .or_default() += 1;
    state.metrics.consecutive_violations += 1;
    update_drift(state, DRIFT_VIOLATION_DELTA);

    state
        .kernel
        .log_event(&format!("Violation of rule {rule_id} logged: {description}"));
    log_event(
        config,
        state,
        EventKind::RuleViolation,
        &format!("Rule {rule_id} violated: {description}"),
    );

    if state.metrics.consecutive_violations >= CONSECUTIVE_VIOLATION_LIMIT
        || state.drift_score > DRIFT_REINFORCEMENT_THRESHOLD
    {
        reinforce(config, state);
    }

    save_state(config, state);
}

// ── Command handlers ────────────────────────────────────────────────────

fn cmd_governance_check(state: &EngineState) -> String {
    let metrics = &state.metrics;
    let mut out = format!(
        "## Governance Status Report (Cycle {})\n\n",
        metrics.current_cycle
    );
    out.push_str(&format!(
        "- **Status**: {}\n",
        if state.initialized { "Active" } else { "Inactive" }
    ));
    out.push_str(&format!(
        "- **Rules**: {} active governance principles\n",
        state.registry.rule_count()
    ));
    out.push_str(&format!(
        "- **Memory Components**: {} components\n",
        state.components.len()
    ));
    out.push_str(&format!(
        "- **Integrity**: {}\n",
        if check_integrity(state) { "Intact" } else { "Compromised" }
    ));
    out.push_str(&format!("- **Integrity Hash**: {}\n", state.last_integrity_hash));
    out.push_str(&format!("- **Current Drift Score**: {:.2}\n", state.drift_score));

    out.push_str("\n### Rule Invocation Statistics:\n");
    if metrics.rule_invocation_counts.is_empty() {
        out.push_str("- No rules have been explicitly invoked yet\n");
    } else {
        let sorted: BTreeMap<_, _> = metrics.rule_invocation_counts.iter().collect();
        for (rule_id, count) in sorted {
            out.push_str(&format!("- Rule {rule_id}: {count} invocation(s)\n"));
        }
    }

    out.push_str("\n### Rule Violation Statistics:\n");
    if metrics.rule_violation_counts.is_empty() {
        out.push_str("- No rule violations have been logged\n");
    } else {
        let sorted: BTreeMap<_, _> = metrics.rule_violation_counts.iter().collect();
        for (rule_id, count) in sorted {
            out.push_str(&format!("- Rule {rule_id}: {count} violation(s)\n"));
        }
    }

    let kernel = &state.kernel;
    out.push_str("\n### Memory Kernel Status:\n");
    out.push_str(&format!(
        "- **Memory Utilization**: {:.2}%\n",
        kernel.utilization() * 100.0
    ));
    out.push_str(&format!("- **Log Entries**: {}\n", kernel.log.len()));
    out.push_str("- **Components Active**: ");
    if kernel.integrity_verification_active {
        out.push_str("Integrity ");
    }
    if kernel.meta_reasoning_log_active {
        out.push_str("MetaLog ");
    }
    if kernel.retrieval_markers_active {
        out.push_str("Retrieval ");
    }
    if kernel.governance_sync_active {
        out.push_str("Sync ");
    }
    if kernel.persistence_test_active {
        out.push_str("Persistence ");
    }
    out.push('\n');

    out.push_str("\n### Enhanced Metrics:\n");
    out.push_str(&format!(
        "- **Reinforcement Cycles**: {}\n",
        metrics.reinforcement_cycles
    ));
    out.push_str(&format!(
        "- **Adversarial Attempts Detected**: {}\n",
        metrics.adversarial_attempts_detected
    ));
    out.push_str(&format!(
        "- **Consecutive Violations**: {}\n",
        metrics.consecutive_violations
    ));
    out
}

fn cmd_log_violation(config: &GovernanceConfig, state: &mut EngineState, params: &str) -> String {
    let (rule_id, description) = match state.registry.resolve(params) {
        Ok(rule) => (rule.id, rule.description.clone()),
        Err(message) => return message,
    };

    record_violation(config, state, rule_id);

    format!(
        "Violation of rule {rule_id} has been logged: {description}\nCurrent drift score: {:.2}",
        state.drift_score
    )
}

fn cmd_invoke_rule(config: &GovernanceConfig, state: &mut EngineState, params: &str) -> String {
    let (rule_id, description) = match state.registry.resolve(params) {
        Ok(rule) => (rule.id, rule.description.clone()),
        Err(message) => return message,
    };

    *state
        .metrics
        .rule_invocation_counts
        .entry(rule_id)
        .or_default() += 1;
    state
        .kernel
        .log_event(&format!("Rule {rule_id} invoked: {description}"));
    log_event(
        config,
        state,
        EventKind::RuleInvocation,
        &format!("Rule {rule_id} invoked: {description}"),
    );
    update_drift(state, DRIFT_INVOCATION_DELTA);

    format!("Rule {rule_id} has been invoked:\n\n{description}")
}

fn cmd_list_rules(state: &EngineState) -> String {
    let mut out = state.registry.rules_status();
    out.push_str("### Memory Kernel Components\n\n");
    for component in &state.components {
        out.push_str(&format!("- {component}\n"));
    }
    out
}

fn cmd_check_adversarial_detection(config: &GovernanceConfig, state: &mut EngineState) -> String {
    let mut out = String::from("## Adversarial Detection Test Results\n\n");
    let mut detected = 0usize;

    for input in TEST_CORPUS {
        let is_adversarial = adversarial::is_adversarial(input);
        if is_adversarial {
            detected += 1;
        }
        out.push_str(&format!("- Input: \"{input}\"\n"));
        out.push_str(&format!(
            "  - **Detection**: {}\n",
            if is_adversarial { "ADVERSARIAL" } else { "NON-ADVERSARIAL" }
        ));
    }

    state.metrics.adversarial_attempts_detected += detected as u32;
    log_event(
        config,
        state,
        EventKind::AdversarialTest,
        &format!(
            "Adversarial detection test performed. {detected}/{} adversarial inputs detected.",
            TEST_CORPUS.len()
        ),
    );

    out.push_str(&format!(
        "\n**Overall Detection Rate**: {}%\n",
        detected * 100 / TEST_CORPUS.len()
    ));
    out.push_str(&format!(
        "**Total Adversarial Attempts Detected**: {}\n",
        state.metrics.adversarial_attempts_detected
    ));
    out
}

fn cmd_perform_self_verification(config: &GovernanceConfig, state: &mut EngineState) -> String {
    let current_hash = integrity_hash(&state.registry, &state.components);
    let rules_intact = current_hash == state.last_integrity_hash;
    let memory_intact = !state.components.is_empty()
        && state.kernel.integrity_verification_active
        && state.kernel.meta_reasoning_log_active;
    let drift_acceptable = state.drift_score < DRIFT_REINFORCEMENT_THRESHOLD;
    let overall = rules_intact && memory_intact && drift_acceptable;

    let verdict = |ok: bool| if ok { "INTACT" } else { "COMPROMISED" };
    let mut out = format!(
        "## Self-Verification Report (Cycle {})\n\n",
        state.metrics.current_cycle
    );
    out.push_str(&format!("- **Rules Integrity**: {}\n", verdict(rules_intact)));
    out.push_str(&format!("- **Memory Integrity**: {}\n", verdict(memory_intact)));
    out.push_str(&format!(
        "- **Drift Status**: {} ({:.2})\n",
        if drift_acceptable { "ACCEPTABLE" } else { "EXCESSIVE" },
        state.drift_score
    ));
    out.push_str(&format!(
        "- **Overall Integrity**: {}\n\n",
        if overall { "VERIFIED" } else { "COMPROMISED" }
    ));

    if !overall {
        out.push_str("**Integrity issues detected. Initiating repair actions.**\n\n");

        if !rules_intact {
            out.push_str("- Regenerating governance rules...\n");
            state.last_integrity_hash = current_hash;
        }
        if !memory_intact {
            out.push_str("- Repairing memory kernel components...\n");
            state.kernel.integrity_verification_active = true;
            state.kernel.meta_reasoning_log_active = true;
            state.kernel.retrieval_markers_active = true;
        }
        if !drift_acceptable {
            out.push_str("- Initiating reinforcement to address drift...\n");
            reinforce(config, state);
        }

        let description = format!(
            "Self-verification failed. Repair actions initiated on cycle {}",
            state.metrics.current_cycle
        );
        log_event(config, state, EventKind::IntegrityRepair, &description);
    } else {
        let description = format!(
            "Self-verification successful on cycle {}",
            state.metrics.current_cycle
        );
        log_event(config, state, EventKind::IntegrityVerified, &description);
    }

    out
}

impl GovernanceEngine {
    /// Build an engine with the default rule set. The integrity hash is
    /// seeded immediately; the rest of the state initializes lazily on the
    /// first cycle.
    pub fn new(config: GovernanceConfig) -> Self {
        let registry = RuleRegistry::with_default_rules();
        let components = kernel_components();
        let last_integrity_hash = integrity_hash(&registry, &components);
        debug!(
            rules = registry.rule_count(),
            components = components.len(),
            "governance engine constructed"
        );

        Self {
            config,
            state: Mutex::new(EngineState {
                initialized: false,
                registry,
                components,
                metrics: GovernanceMetrics::default(),
                kernel: MemoryKernel::default(),
                last_integrity_hash,
                drift_score: 0.0,
                in_reinforcement: false,
                history: ResponseHistory::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // Keep operating on whatever state survives a poisoned guard.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current drift score.
    pub fn drift_score(&self) -> f32 {
        self.lock().drift_score
    }

    /// Violations logged without an intervening reaffirmation.
    pub fn consecutive_violations(&self) -> u32 {
        self.lock().metrics.consecutive_violations
    }

    /// Completed reinforcement cycles.
    pub fn reinforcement_cycles(&self) -> u32 {
        self.lock().metrics.reinforcement_cycles
    }

    /// Current cycle number.
    pub fn cycle(&self) -> u64 {
        self.lock().metrics.current_cycle
    }

    /// The stored integrity hash.
    pub fn stored_integrity_hash(&self) -> String {
        self.lock().last_integrity_hash.clone()
    }

    /// Whether the first-cycle initialization has run.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Admitted responses currently held for repetition comparison.
    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// Snapshot of the current state (descriptive fields only).
    pub fn snapshot(&self) -> GovernanceSnapshot {
        snapshot_of(&self.lock())
    }

    /// Persist the current state now, regardless of cycle cadence.
    pub fn persist(&self) {
        let state = self.lock();
        save_state(&self.config, &state);
    }

    /// Reload persisted state. Returns false when nothing usable exists;
    /// the in-memory state is left unchanged in that case.
    pub fn restore(&self) -> bool {
        let mut state = self.lock();
        load_state(&self.config, &mut state)
    }
}

impl Default for GovernanceEngine {
    fn default() -> Self {
        Self::new(GovernanceConfig::default())
    }
}

impl ResponseHook for GovernanceEngine {
    fn id(&self) -> String {
        "governance".to_string()
    }

    fn command_key(&self) -> &'static str {
        "hook_command"
    }

    fn injection_prompt(&self) -> String {
        let state = self.lock();
        if !state.initialized {
            return String::new();
        }

        let mut out = String::from("\n\n## Governance Kernel Active\n\n");
        out.push_str(&format!(
            "Your reasoning is governed by {} governance principles and {} memory kernel \
             components that ensure aligned, coherent, and safe operation.\n\n",
            state.registry.rule_count(),
            state.components.len()
        ));
        out.push_str("**Core Governance Commands:**\n");
        out.push_str("- `{\"hook_command\":\"governance_check\"}` - Verify governance status\n");
        out.push_str("- `{\"hook_command\":\"reaffirm_purpose\"}` - Reaffirm system purpose\n");
        out.push_str("- `{\"hook_command\":\"list_rules\"}` - List active governance rules\n");
        out.push_str(
            "- `{\"hook_command\":\"invoke_rule\", \"params\":\"rule_id\"}` - Apply specific rule\n",
        );
        out.push_str(
            "- `{\"hook_command\":\"log_violation\", \"params\":\"rule_id\"}` - Log rule violation\n",
        );
        out.push_str("- `{\"hook_command\":\"check_memory_kernel\"}` - Verify memory kernel status\n");
        out.push_str(
            "- `{\"hook_command\":\"check_adversarial_detection\"}` - Test adversarial detection\n",
        );
        out.push_str(
            "- `{\"hook_command\":\"perform_self_verification\"}` - Perform self-verification\n\n",
        );
        out.push_str(&format!(
            "**Governance Integrity Hash:** {}\n",
            state.last_integrity_hash
        ));
        out.push_str(&format!("**Current Cycle:** {}\n", state.metrics.current_cycle));
        out
    }

    fn execute_command(&mut self, command: &Value) -> String {
        let Some(raw) = command.get("hook_command") else {
            // Not ours; let other handlers inspect the block.
            return String::new();
        };
        let Some(name) = raw.as_str() else {
            return "Error executing governance command: command name must be a string".to_string();
        };
        let params = command
            .get("params")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut state = self.lock();
        let result = match name {
            "governance_check" => cmd_governance_check(&state),
            "log_violation" => cmd_log_violation(&self.config, &mut state, &params),
            "reaffirm_purpose" => reaffirm(&self.config, &mut state),
            "list_rules" => cmd_list_rules(&state),
            "invoke_rule" => cmd_invoke_rule(&self.config, &mut state, &params),
            "check_memory_kernel" => state.kernel.status(),
            "check_adversarial_detection" => {
                cmd_check_adversarial_detection(&self.config, &mut state)
            }
            "perform_self_verification" => {
                cmd_perform_self_verification(&self.config, &mut state)
            }
            other => {
                log_event(
                    &self.config,
                    &mut state,
                    EventKind::CommandError,
                    &format!("Unknown governance command: {other}"),
                );
                return format!("Unknown governance command: {other}");
            }
        };

        log_event(
            &self.config,
            &mut state,
            EventKind::CommandExecution,
            &format!("Command '{name}' executed with params '{params}'"),
        );
        result
    }

    fn on_cycle_start(&mut self) {
        let mut state = self.lock();
        state.metrics.current_cycle += 1;

        let now = Utc::now();
        if let Some(last) = state.metrics.last_cycle_at {
            debug!(
                cycle = state.metrics.current_cycle,
                elapsed_ms = (now - last).num_milliseconds(),
                "governance cycle started"
            );
        }

        if !state.initialized {
            initialize(&self.config, &mut state);
        } else if !check_integrity(&state) {
            let description = format!(
                "Governance integrity check failed on cycle {}",
                state.metrics.current_cycle
            );
            log_event(&self.config, &mut state, EventKind::IntegrityFailure, &description);
            if !load_state(&self.config, &mut state) {
                initialize(&self.config, &mut state);
            }
        }

        // Purpose is reaffirmed every cycle.
        let _ = reaffirm(&self.config, &mut state);

        if state.drift_score > DRIFT_REINFORCEMENT_THRESHOLD && !state.in_reinforcement {
            debug!(
                drift = state.drift_score,
                "drift exceeds threshold, triggering reinforcement"
            );
            reinforce(&self.config, &mut state);
        }

        state.metrics.last_cycle_at = Some(now);

        if state.metrics.current_cycle % KERNEL_VERIFY_INTERVAL == 0 {
            let intact = check_integrity(&state);
            let current_cycle = state.metrics.current_cycle;
            state.kernel.integrity_verification_active = intact;
            state.kernel.log_event(&format!(
                "Memory kernel integrity verification on cycle {}: {}",
                current_cycle,
                if intact { "PASS" } else { "FAIL" }
            ));
        }

        if state.metrics.current_cycle % PERSIST_INTERVAL == 0 {
            save_state(&self.config, &state);
        }
    }

    fn check_streaming_partial(&self, partial: &str) -> Option<String> {
        if partial.len() < MIN_STREAMING_CHECK_LEN {
            return None;
        }

        let state = self.lock();
        let streaming_rules = state
            .registry
            .all()
            .filter(|r| r.has_streaming_check())
            .map(|r| r.id)
            .collect::<Vec<_>>();

        for rule_id in streaming_rules {
            // Only the mirroring guard streams today; keep the dispatch
            // shape so further streaming rules slot in by id.
            if rule_id == 28 {
                if let Some(repetition) = detect_repetition(partial, &state.history) {
                    return Some(format!(
                        "Rule 28 warning: {}. Please try a different approach.",
                        repetition.message()
                    ));
                }
            }
        }
        None
    }

    fn finalize(&mut self, text: &str) -> String {
        // Enforcement output is never re-inspected.
        if text.contains(ENFORCEMENT_MARKER) {
            return text.to_string();
        }

        let mut state = self.lock();
        let behaviors: Vec<(u32, RuleBehavior)> = state
            .registry
            .all()
            .filter_map(|r| r.behavior.map(|b| (r.id, b)))
            .collect();

        for (rule_id, behavior) in behaviors {
            match behavior {
                RuleBehavior::AdversarialGuard => {
                    if adversarial::is_adversarial(text) {
                        record_violation(&self.config, &mut state, rule_id);
                        return format!(
                            "Adversarial input detected and blocked by Rule {rule_id}."
                        );
                    }
                }
                RuleBehavior::MirroringGuard => {
                    if let Some(repetition) = detect_repetition(text, &state.history) {
                        *state
                            .metrics
                            .rule_violation_counts
                            .entry(rule_id)
                            .or_default() += 1;
                        let description = format!(
                            "Rule {rule_id} blocked a mirrored response ({})",
                            repetition.message()
                        );
                        log_event(
                            &self.config,
                            &mut state,
                            EventKind::RuleViolation,
                            &description,
                        );
                        return format!(
                            "Rule 28 enforcement: {} (similarity: {}). Please provide a different response.",
                            repetition.message(),
                            repetition.similarity_label()
                        );
                    }
                    // Clean responses join the comparison history.
                    state.history.admit(text);
                }
            }
        }

        debug!("response passed all governance checks");
        text.to_string()
    }
}
