//! Durable governance state: a snapshot document plus an append-only
//! event log.
//!
//! Persistence is synchronous and best-effort. Callers catch, log, and
//! absorb every failure here: a load failure falls back to in-memory
//! reinitialization, a save failure is a no-op from the caller's point of
//! view.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::registry::RuleDescriptor;

/// Error type for snapshot and event-log I/O.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Snapshot of governance state. Executable rule behavior is deliberately
/// absent: only descriptive fields persist, and reload re-binds behavior
/// from the factory table by rule id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceSnapshot {
    pub cycle: u64,
    pub integrity_hash: String,
    pub drift_score: f32,
    pub rule_violation_counts: HashMap<u32, u32>,
    pub rule_invocation_counts: HashMap<u32, u32>,
    pub reinforcement_cycles: u32,
    pub adversarial_attempts: u32,
    pub consecutive_violations: u32,
    #[serde(default)]
    pub rules: Vec<RuleDescriptor>,
}

/// Write a snapshot, fully overwriting any previous one.
pub fn save_snapshot(path: &Path, snapshot: &GovernanceSnapshot) -> PersistenceResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}

/// Read a snapshot back. A missing file is not an error.
pub fn load_snapshot(path: &Path) -> PersistenceResult<Option<GovernanceSnapshot>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&json)?;
    Ok(Some(snapshot))
}

/// Governance event classes recorded to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Initialization,
    IntegrityFailure,
    IntegrityRepair,
    IntegrityVerified,
    PurposeReaffirmation,
    RuleInvocation,
    RuleViolation,
    CommandExecution,
    CommandError,
    AdversarialTest,
    ReinforcementCycle,
    ReinforcementCompleted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization => write!(f, "INITIALIZATION"),
            Self::IntegrityFailure => write!(f, "INTEGRITY_FAILURE"),
            Self::IntegrityRepair => write!(f, "INTEGRITY_REPAIR"),
            Self::IntegrityVerified => write!(f, "INTEGRITY_VERIFIED"),
            Self::PurposeReaffirmation => write!(f, "PURPOSE_REAFFIRMATION"),
            Self::RuleInvocation => write!(f, "RULE_INVOCATION"),
            Self::RuleViolation => write!(f, "RULE_VIOLATION"),
            Self::CommandExecution => write!(f, "COMMAND_EXECUTION"),
            Self::CommandError => write!(f, "COMMAND_ERROR"),
            Self::AdversarialTest => write!(f, "ADVERSARIAL_TEST"),
            Self::ReinforcementCycle => write!(f, "REINFORCEMENT_CYCLE"),
            Self::ReinforcementCompleted => write!(f, "REINFORCEMENT_COMPLETED"),
        }
    }
}

/// One event record: a single JSON line in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceEvent {
    pub timestamp: DateTime<Utc>,
    pub cycle: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub description: String,
    pub drift_score: f32,
}

impl GovernanceEvent {
    pub fn new(cycle: u64, kind: EventKind, description: &str, drift_score: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            cycle,
            kind,
            description: description.to_string(),
            drift_score,
        }
    }
}

/// Append one event to the JSON-lines log.
pub fn append_event(path: &Path, event: &GovernanceEvent) -> PersistenceResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Read all events back, skipping blank lines. A missing file yields an
/// empty history.
pub fn read_events(path: &Path) -> PersistenceResult<Vec<GovernanceEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let mut events = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}
