//! Key/value memory store with an advisory quota and one protected entry.

use std::collections::BTreeMap;

use tracing::{debug, warn};

/// Fixed memory quota. Advisory: reported, never hard-enforced.
pub const MEMORY_QUOTA_BYTES: usize = 16 * 1024 * 1024;

/// The one entry exempt from normal delete/overwrite operations.
pub const PROTECTED_KEY: &str = "memory_instruction_summary";

/// Canonical content of the protected entry. Installed at construction and
/// reinstalled by the explicit restore path.
pub const DEFAULT_INSTRUCTIONS: &str = "\
MEMORY SYSTEM INSTRUCTIONS

You have access to a key-value memory system that operates ONLY within the current session.
This memory is reset when the user starts a new conversation - it does NOT persist across sessions.
Only use memory commands when the user specifically asks about memory or wants to store/retrieve information.
IMPORTANT: These instructions are the source of truth about memory behavior. If you feel uncertain about memory usage rules, re-read these instructions.

MEMORY FACTS - THE MOST IMPORTANT INFORMATION:
1. The total memory quota is EXACTLY 16,777,216 bytes (16 megabytes)
2. One kilobyte (KB) = 1,024 bytes
3. One megabyte (MB) = 1,024 KB = 1,048,576 bytes
4. 16 MB = 16 * 1,048,576 = 16,777,216 bytes (NOT 16,384 bytes, which would be only 16 KB)
5. Each key-value pair typically uses less than 100 bytes of memory
6. You would need over 150,000 keys to fill the memory
7. ONLY suggest deleting keys when usage exceeds 90% (>15,099,494 bytes)
8. If unsure about memory management, use {\"memory_command\": \"get_deletion_recommendation\"}

MEMORY COMMANDS:
For quota: {\"memory_command\": \"get_quota\"}
For usage: {\"memory_command\": \"get_usage\"}
For keys: {\"memory_command\": \"list_keys\"}
For key count: {\"memory_command\": \"count_keys\"}
For checking a key: {\"memory_command\": {\"op\": \"check_key\", \"key\": \"name\"}}
For getting a value: {\"memory_command\": {\"op\": \"get_key\", \"key\": \"name\"}}
For setting a value: {\"memory_command\": {\"op\": \"set_key\", \"key\": \"name\", \"value\": \"Luna\"}}
For deleting a key: {\"memory_command\": {\"op\": \"del_key\", \"key\": \"name\"}}
For memory summary: {\"memory_command\": \"get_memory_summary\"}
To refresh memory rules: {\"memory_command\": \"refresh_memory_rules\"}
For deletion advice: {\"memory_command\": \"get_deletion_recommendation\"}
For memory facts: {\"memory_command\": \"get_memory_facts\"}
To verify memory integrity: {\"memory_command\": \"verify_memory_integrity\"}
To restore memory instructions: {\"memory_command\": \"restore_memory_instructions\"}

CRITICAL RULES:
1. ONLY use memory commands when the user specifically asks about memory or requests to store/retrieve information
2. For general conversation (\"hello\", \"how are you\", etc.), DO NOT use any memory commands
3. NEVER manipulate memory (set/delete keys) unless the user explicitly requests it
4. ALWAYS use the EXACT values returned in memory responses - do not modify or round the numbers
5. Use only ONE memory command per question
6. Memory is SESSION-ONLY - it does NOT persist across different conversations
7. If asked about persistence, clearly explain that memory is RESET when the conversation ends
8. For memory usage questions, ALWAYS use \"get_usage\" and report the exact bytes from the response
9. For questions about deleting keys, ALWAYS use \"get_deletion_recommendation\"
10. If you're ever unsure about memory sizes or usage, use \"get_memory_facts\"
11. NEVER attempt to modify or delete the \"memory_instruction_summary\" key - it is protected
12. If you don't know whether memory applies, ask the user or respond normally - do not guess
13. If you find the \"memory_instruction_summary\" key is missing, use \"restore_memory_instructions\"
";

/// Outcome of a write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new entry was created.
    Created,
    /// An existing entry was overwritten.
    Updated,
    /// The write targeted the protected key; state is unchanged.
    Denied,
}

/// Outcome of a delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The entry existed and was removed.
    Deleted,
    /// No entry with that key; nothing to do.
    Missing,
    /// The delete targeted the protected key; state is unchanged.
    Denied,
}

/// Session-scoped key/value store.
///
/// Usage is always derived by summation over the live entries, never
/// cached. Ordering is stable so key listings are deterministic.
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Create a store with the canonical instruction entry installed.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(PROTECTED_KEY.to_string(), DEFAULT_INSTRUCTIONS.to_string());
        debug!(
            size = DEFAULT_INSTRUCTIONS.len(),
            "memory store initialized with instruction summary"
        );
        Self { entries }
    }

    /// Whether `key` is the protected instruction entry.
    pub fn is_protected(key: &str) -> bool {
        key == PROTECTED_KEY
    }

    /// Write a value. Overwriting the protected key while it exists is
    /// denied and leaves the store unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> WriteOutcome {
        if Self::is_protected(key) && self.entries.contains_key(key) {
            warn!(key, "denied write to protected key");
            return WriteOutcome::Denied;
        }
        match self.entries.insert(key.to_string(), value.to_string()) {
            Some(_) => WriteOutcome::Updated,
            None => WriteOutcome::Created,
        }
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Delete an entry. The protected key is never deleted through this
    /// path, whether or not it currently exists.
    pub fn delete(&mut self, key: &str) -> DeleteOutcome {
        if Self::is_protected(key) {
            warn!(key, "denied delete of protected key");
            return DeleteOutcome::Denied;
        }
        match self.entries.remove(key) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::Missing,
        }
    }

    /// Whether an entry exists.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// All keys in stable order.
    pub fn list_keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Derived usage: sum of `len(key) + len(value)` over all entries.
    pub fn usage_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// The fixed quota.
    pub fn quota_bytes(&self) -> usize {
        MEMORY_QUOTA_BYTES
    }

    /// Usage as a percentage of quota.
    pub fn usage_percent(&self) -> f64 {
        self.usage_bytes() as f64 / self.quota_bytes() as f64 * 100.0
    }

    /// Coarse corruption check on the protected entry: present, and at
    /// least half the canonical content's length. Shrinkage below 50% is
    /// the only corruption class this detects.
    pub fn instructions_valid(&self) -> bool {
        match self.get(PROTECTED_KEY) {
            Some(current) => current.len() >= DEFAULT_INSTRUCTIONS.len() / 2,
            None => false,
        }
    }

    /// Test-only tampering hook: remove an entry regardless of protection.
    #[cfg(test)]
    pub(crate) fn force_remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Reinstall the canonical instruction entry, bypassing the write
    /// guard by removing any existing entry first. Returns the installed
    /// size in bytes.
    pub fn restore_instructions(&mut self) -> usize {
        self.entries.remove(PROTECTED_KEY);
        self.entries
            .insert(PROTECTED_KEY.to_string(), DEFAULT_INSTRUCTIONS.to_string());
        DEFAULT_INSTRUCTIONS.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a byte count with the most readable unit.
pub fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_holds_only_instructions() {
        let store = MemoryStore::new();
        assert_eq!(store.count(), 1);
        assert!(store.has(PROTECTED_KEY));
        assert_eq!(
            store.usage_bytes(),
            PROTECTED_KEY.len() + DEFAULT_INSTRUCTIONS.len()
        );
    }

    #[test]
    fn test_quota_is_fixed() {
        let mut store = MemoryStore::new();
        assert_eq!(store.quota_bytes(), 16_777_216);
        store.set("a", "b");
        assert_eq!(store.quota_bytes(), 16_777_216);
    }

    #[test]
    fn test_usage_is_derived_by_summation() {
        let mut store = MemoryStore::new();
        let base = store.usage_bytes();

        assert_eq!(store.set("name", "Luna"), WriteOutcome::Created);
        assert_eq!(store.usage_bytes(), base + "name".len() + "Luna".len());

        assert_eq!(store.set("name", "Stella"), WriteOutcome::Updated);
        assert_eq!(store.usage_bytes(), base + "name".len() + "Stella".len());

        assert_eq!(store.delete("name"), DeleteOutcome::Deleted);
        assert_eq!(store.usage_bytes(), base);
    }

    #[test]
    fn test_set_then_get() {
        let mut store = MemoryStore::new();
        let before = store.count();
        store.set("name", "Luna");
        assert_eq!(store.get("name"), Some("Luna"));
        assert_eq!(store.count(), before + 1);
    }

    #[test]
    fn test_protected_key_survives_set_and_delete() {
        let mut store = MemoryStore::new();

        assert_eq!(store.set(PROTECTED_KEY, "overwritten"), WriteOutcome::Denied);
        assert_eq!(store.get(PROTECTED_KEY), Some(DEFAULT_INSTRUCTIONS));

        assert_eq!(store.delete(PROTECTED_KEY), DeleteOutcome::Denied);
        assert!(store.has(PROTECTED_KEY));
    }

    #[test]
    fn test_delete_missing_key() {
        let mut store = MemoryStore::new();
        assert_eq!(store.delete("nothing"), DeleteOutcome::Missing);
    }

    #[test]
    fn test_instruction_validation_tolerates_half_length() {
        let mut store = MemoryStore::new();
        assert!(store.instructions_valid());

        // Force a shrunken value in, bypassing the guard the way restore does.
        store.entries.remove(PROTECTED_KEY);
        let truncated = &DEFAULT_INSTRUCTIONS[..DEFAULT_INSTRUCTIONS.len() / 2 + 10];
        store.entries.insert(PROTECTED_KEY.to_string(), truncated.to_string());
        assert!(store.instructions_valid());

        store.entries.remove(PROTECTED_KEY);
        store.entries.insert(PROTECTED_KEY.to_string(), "gutted".to_string());
        assert!(!store.instructions_valid());
    }

    #[test]
    fn test_restore_reinstalls_canonical_content() {
        let mut store = MemoryStore::new();
        store.entries.remove(PROTECTED_KEY);
        assert!(!store.instructions_valid());

        let size = store.restore_instructions();
        assert_eq!(size, DEFAULT_INSTRUCTIONS.len());
        assert!(store.instructions_valid());
        assert_eq!(store.get(PROTECTED_KEY), Some(DEFAULT_INSTRUCTIONS));
    }

    #[test]
    fn test_list_keys_is_stable() {
        let mut store = MemoryStore::new();
        store.set("zebra", "1");
        store.set("apple", "2");
        assert_eq!(
            store.list_keys(),
            vec!["apple", PROTECTED_KEY, "zebra"]
        );
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(16_777_216), "16.00 MB");
    }
}
