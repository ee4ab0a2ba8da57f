//! Memory handler: command surface over the key/value store.
//!
//! Every failure mode (unknown command, missing parameter, protected-key
//! violation) becomes a descriptive reply string. Nothing crosses this
//! boundary as an error.

use serde_json::Value;
use tracing::{debug, warn};

use crate::hooks::ResponseHook;

use super::store::{
    DeleteOutcome, MemoryStore, WriteOutcome, DEFAULT_INSTRUCTIONS, PROTECTED_KEY,
};

const DELETION_THRESHOLD_PERCENT: f64 = 90.0;

/// Handler exposing the session memory store to the command protocol.
pub struct MemoryHook {
    store: MemoryStore,
}

impl MemoryHook {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
        }
    }

    /// Direct access to the underlying store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Mutable access to the underlying store.
    pub fn store_mut(&mut self) -> &mut MemoryStore {
        &mut self.store
    }

    fn fullness_assessment(&self) -> String {
        let percent = self.store.usage_percent();
        let mut assessment = if percent < 1.0 {
            format!(
                "Memory usage is extremely low ({percent:.6}%). You have plenty of space and don't need to manage memory at this time."
            )
        } else if percent < 25.0 {
            format!(
                "Memory usage is very low ({percent:.4}%). You can store many more items without concern."
            )
        } else if percent < 50.0 {
            format!(
                "Memory usage is low ({percent:.2}%). Memory management is not necessary at this time."
            )
        } else if percent < 75.0 {
            format!(
                "Memory usage is moderate ({percent:.2}%). You still have significant space available."
            )
        } else if percent < DELETION_THRESHOLD_PERCENT {
            format!(
                "Memory usage is getting high ({percent:.2}%). Consider reviewing your stored keys if you plan to add much more data."
            )
        } else {
            format!(
                "Memory usage is very high ({percent:.2}%). It's recommended to remove unnecessary keys to free up space."
            )
        };

        if percent < DELETION_THRESHOLD_PERCENT {
            assessment.push_str(
                " Remember: Only suggest key deletion when usage exceeds 90% of quota.",
            );
        }
        assessment
    }

    fn integrity_warning(&self) -> Option<String> {
        if self.store.instructions_valid() {
            return None;
        }
        Some(format!(
            "WARNING: Memory instruction integrity check failed. Consider using {{\"memory_command\": \"restore_memory_instructions\"}} to restore the \"{PROTECTED_KEY}\" key."
        ))
    }

    // ── Zero-argument commands ──────────────────────────────────────────

    fn cmd_get_quota(&self) -> String {
        let quota = self.store.quota_bytes();
        format!(
            "The memory quota is {quota} bytes (exactly {:.2} MB or {:.2} KB). Remember: 1 MB = 1,048,576 bytes, not 1,000 bytes.",
            quota as f64 / (1024.0 * 1024.0),
            quota as f64 / 1024.0,
        )
    }

    fn cmd_get_usage(&self) -> String {
        let usage = self.store.usage_bytes();
        let quota = self.store.quota_bytes();
        let percent = self.store.usage_percent();
        let remaining = quota - usage;

        let mut reply = format!(
            "Current memory usage is {usage} bytes out of {quota} bytes ({percent:.6}%)."
        );

        if percent < 1.0 {
            reply.push_str(" This is extremely low usage - no cleanup needed.");
        } else if percent < 50.0 {
            reply.push_str(" This is low usage - memory management is not necessary.");
        } else if percent < DELETION_THRESHOLD_PERCENT {
            reply.push_str(" This is moderate usage - regular operation can continue.");
        } else {
            reply.push_str(" This is high usage - consider removing unnecessary keys.");
        }

        // ~100 bytes per typical key/value pair.
        reply.push_str(&format!(
            " You have approximately {} more key-value pairs of capacity remaining before reaching 90% usage.",
            remaining / 100
        ));

        if percent < DELETION_THRESHOLD_PERCENT {
            reply.push_str(&format!(
                " ONLY suggest deleting keys when usage exceeds 90% of quota (>{} bytes).",
                quota * 9 / 10
            ));
        }
        reply
    }

    fn cmd_count_keys(&self) -> String {
        let count = self.store.count();
        if count == 1 {
            "There is 1 key in memory.".to_string()
        } else {
            format!("There are {count} keys in memory.")
        }
    }

    fn cmd_list_keys(&self) -> String {
        let keys = self.store.list_keys();
        let mut reply = if keys.is_empty() {
            "There are no keys in memory.".to_string()
        } else {
            let quoted: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
            format!("Keys in memory: {}", quoted.join(", "))
        };

        if !self.store.has(PROTECTED_KEY) {
            reply.push_str(&format!(
                "\n\nWARNING: The required '{PROTECTED_KEY}' key is missing. Memory integrity may be compromised. Use {{\"memory_command\": \"restore_memory_instructions\"}} to restore it."
            ));
        }
        reply
    }

    fn cmd_get_memory_summary(&self) -> String {
        let quota = self.store.quota_bytes();
        let usage = self.store.usage_bytes();
        let keys = self.store.list_keys();

        let mut reply = String::from("Memory Summary:\n");
        reply.push_str(&format!(
            "- Quota: {quota} bytes ({})\n",
            super::store::format_bytes(quota)
        ));
        reply.push_str(&format!(
            "- Usage: {usage} bytes ({:.6}%)\n",
            self.store.usage_percent()
        ));
        reply.push_str(&format!("- Keys: {}\n", self.store.count()));
        reply.push_str(&format!("- Status: {}\n", self.fullness_assessment()));

        if !self.store.instructions_valid() {
            reply.push_str(&format!(
                "- WARNING: The required '{PROTECTED_KEY}' key is missing or corrupted. Memory integrity may be compromised.\n  Use {{\"memory_command\": \"restore_memory_instructions\"}} to restore it.\n"
            ));
        }

        if !keys.is_empty() {
            let quoted: Vec<String> = keys.iter().map(|k| format!("\"{k}\"")).collect();
            reply.push_str(&format!("- Stored keys: {}", quoted.join(", ")));
        }
        reply
    }

    fn cmd_verify_memory_integrity(&self) -> String {
        if self.store.instructions_valid() {
            "Memory integrity verified. The memory instruction summary is intact.".to_string()
        } else if self.store.has(PROTECTED_KEY) {
            "CRITICAL ERROR: Memory instructions are corrupted! Use {\"memory_command\": \"restore_memory_instructions\"} to restore them.".to_string()
        } else {
            "CRITICAL ERROR: Memory instructions are missing! Use {\"memory_command\": \"restore_memory_instructions\"} to restore them.".to_string()
        }
    }

    fn cmd_restore_memory_instructions(&mut self) -> String {
        let size = self.store.restore_instructions();
        debug!(size, "memory instructions restored");
        "Memory instructions have been restored to their default state.".to_string()
    }

    fn cmd_refresh_memory_rules(&self) -> String {
        let usage = self.store.usage_bytes();
        let quota = self.store.quota_bytes();

        let mut reply = String::from("Memory Rules Refreshed:\n");
        reply.push_str("1. Memory is SESSION-ONLY and resets when the conversation ends\n");
        reply.push_str(&format!(
            "2. Current usage: {usage} bytes out of {quota} bytes ({:.6}%)\n",
            self.store.usage_percent()
        ));
        reply.push_str(&format!("3. Memory status: {}\n", self.fullness_assessment()));
        reply.push_str("4. CRITICAL: Only suggest deleting keys when usage exceeds 90% of quota\n");
        reply.push_str(&format!(
            "5. Small memory items (few KB) are negligible with a {} MB quota\n",
            quota / (1024 * 1024)
        ));
        reply.push_str("6. Each key-value pair typically uses less than 100 bytes\n");
        reply.push_str("7. BYTE CONVERSION: 16 MB = 16 * 1,048,576 = 16,777,216 bytes (NOT 16,384)\n");

        if let Some(warning) = self.integrity_warning() {
            reply.push_str(&format!("8. {warning}\n"));
        }
        reply
    }

    fn cmd_get_deletion_recommendation(&self) -> String {
        let percent = self.store.usage_percent();
        if percent >= DELETION_THRESHOLD_PERCENT {
            format!(
                "Memory usage is high ({percent:.2}% of quota). It would be good to delete some unnecessary keys."
            )
        } else {
            format!(
                "Memory usage is low ({percent:.6}% of quota). There is NO need to delete any keys. You have plenty of space left ({} bytes remaining).",
                self.store.quota_bytes() - self.store.usage_bytes()
            )
        }
    }

    fn cmd_get_memory_facts(&self) -> String {
        let usage = self.store.usage_bytes();
        let quota = self.store.quota_bytes();

        let mut reply = String::from("MEMORY FACTS:\n");
        reply.push_str("1. Total memory quota: 16,777,216 bytes (16 MB exactly)\n");
        reply.push_str(&format!(
            "2. Current usage: {usage} bytes ({:.6}% of quota)\n",
            self.store.usage_percent()
        ));
        reply.push_str("3. Keys only need deletion when usage exceeds 90% (>15,099,494 bytes)\n");
        reply.push_str("4. Each key-value pair typically uses less than 100 bytes\n");
        reply.push_str(&format!(
            "5. You could store approximately {} more key-value pairs before reaching 90% capacity\n",
            (quota * 9 / 10).saturating_sub(usage) / 100
        ));
        reply.push_str("6. BYTE CONVERSION: 1 KB = 1,024 bytes; 1 MB = 1,024 KB = 1,048,576 bytes\n");
        reply.push_str("7. 16 MB = 16 * 1,048,576 = 16,777,216 bytes (NOT 16,384 bytes, which would be only 16 KB)\n");

        if let Some(warning) = self.integrity_warning() {
            reply.push_str(&format!("8. {warning}\n"));
        }
        reply
    }

    // ── Parameterized commands ──────────────────────────────────────────

    fn cmd_check_key(&self, key: &str) -> String {
        if self.store.has(key) {
            format!("Yes, the key \"{key}\" exists in memory.")
        } else {
            format!("No, the key \"{key}\" does not exist in memory.")
        }
    }

    fn cmd_get_key(&self, key: &str) -> String {
        match self.store.get(key) {
            Some(value) => format!("The value of key \"{key}\" is: \"{value}\""),
            None => format!("The key \"{key}\" does not exist in memory."),
        }
    }

    fn cmd_set_key(&mut self, key: &str, value: &str) -> String {
        match self.store.set(key, value) {
            WriteOutcome::Created => format!("Created new key \"{key}\" with value: \"{value}\""),
            WriteOutcome::Updated => format!("Updated key \"{key}\" with value: \"{value}\""),
            WriteOutcome::Denied => format!(
                "ERROR: Cannot modify the protected key \"{key}\". This key is essential for memory system operation."
            ),
        }
    }

    fn cmd_del_key(&mut self, key: &str) -> String {
        match self.store.delete(key) {
            DeleteOutcome::Deleted => format!("Deleted key \"{key}\" from memory."),
            DeleteOutcome::Missing => {
                format!("Key \"{key}\" did not exist, so no action was needed.")
            }
            DeleteOutcome::Denied => format!(
                "ERROR: Cannot delete the protected key \"{key}\". This key is essential for memory system operation."
            ),
        }
    }

    fn execute_named(&mut self, name: &str) -> String {
        match name {
            "get_quota" => self.cmd_get_quota(),
            "get_usage" => self.cmd_get_usage(),
            "count_keys" => self.cmd_count_keys(),
            "list_keys" => self.cmd_list_keys(),
            "get_memory_summary" => self.cmd_get_memory_summary(),
            "refresh_memory_rules" => self.cmd_refresh_memory_rules(),
            "get_deletion_recommendation" => self.cmd_get_deletion_recommendation(),
            "get_memory_facts" => self.cmd_get_memory_facts(),
            "verify_memory_integrity" => self.cmd_verify_memory_integrity(),
            "restore_memory_instructions" => self.cmd_restore_memory_instructions(),
            other => {
                warn!(command = other, "unknown memory command");
                format!("Unknown command: {other}")
            }
        }
    }

    fn execute_op(&mut self, command: &serde_json::Map<String, Value>) -> String {
        let Some(op) = command.get("op").and_then(Value::as_str) else {
            return "Command missing 'op' field".to_string();
        };
        let key = command.get("key").and_then(Value::as_str);

        match op {
            "check_key" => match key {
                Some(key) => self.cmd_check_key(key),
                None => "check_key command missing 'key' parameter".to_string(),
            },
            "get_key" => match key {
                Some(key) => self.cmd_get_key(key),
                None => "get_key command missing 'key' parameter".to_string(),
            },
            "set_key" => {
                let value = command.get("value").and_then(Value::as_str);
                match (key, value) {
                    (Some(key), Some(value)) => self.cmd_set_key(key, value),
                    _ => "set_key command missing 'key' or 'value' parameter".to_string(),
                }
            }
            "del_key" => match key {
                Some(key) => self.cmd_del_key(key),
                None => "del_key command missing 'key' parameter".to_string(),
            },
            other => {
                warn!(op = other, "unknown memory operation");
                format!("Unknown operation: {other}")
            }
        }
    }
}

impl Default for MemoryHook {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHook for MemoryHook {
    fn id(&self) -> String {
        "memory".to_string()
    }

    fn command_key(&self) -> &'static str {
        "memory_command"
    }

    fn injection_prompt(&self) -> String {
        format!("[MEMORY SYSTEM INSTRUCTIONS]\n\n{DEFAULT_INSTRUCTIONS}")
    }

    fn execute_command(&mut self, command: &Value) -> String {
        let Some(cmd) = command.get("memory_command") else {
            // Not ours; let other handlers inspect the block.
            return String::new();
        };

        if !self.store.instructions_valid() {
            warn!("memory instruction summary missing or corrupted");
        }

        match cmd {
            Value::String(name) => self.execute_named(name),
            Value::Object(map) => self.execute_op(map),
            _ => "Invalid command format".to_string(),
        }
    }
}
