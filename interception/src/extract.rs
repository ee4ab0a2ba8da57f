//! Embedded-command extraction from free-form model output.
//!
//! Commands arrive as small JSON objects buried inside natural-language
//! text. Extraction is a bounded regex scan, not a full JSON tokenizer:
//! candidate blocks handle at most one level of nested braces, so deeply
//! nested embedded commands are out of contract.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::hooks::ResponseHook;

/// Candidate JSON blocks: balanced braces with at most one nested level.
static BLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*(\{[^{}]*\}[^{}]*)*\}").unwrap());

/// Scanner for one command key (`memory_command`, `hook_command`, ...).
///
/// The scanner owns the loose sanity pattern compiled for its key; the
/// shared candidate-block pattern above is compiled once per process.
pub struct CommandExtractor {
    key: &'static str,
    sanity: Regex,
}

impl CommandExtractor {
    /// Build a scanner for the given command key.
    pub fn new(key: &'static str) -> Self {
        let sanity = Regex::new(&format!(r#"\{{"{}":[^}}]+\}}"#, regex::escape(key)))
            .expect("escaped command key always forms a valid pattern");
        Self { key, sanity }
    }

    /// The command key this scanner looks for.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Scan `text` for candidate command blocks, executing each parsed
    /// command against `hook` until one produces a non-empty reply.
    ///
    /// Returns `None` when no candidate yields a reply. Malformed JSON in a
    /// candidate is logged and skipped; it never aborts the scan.
    pub fn extract_and_execute(
        &self,
        text: &str,
        hook: &mut dyn ResponseHook,
    ) -> Option<String> {
        // Fast reject before any regex work.
        if !text.contains(self.key) || !text.contains('{') {
            return None;
        }

        // Loose shape check. A miss here is advisory only: the pattern does
        // not cover every valid spelling, so extraction continues regardless.
        if !self.sanity.is_match(text) {
            warn!(key = self.key, "command-like text without canonical JSON shape");
        }

        for candidate in BLOCK_PATTERN.find_iter(text) {
            let block = candidate.as_str();
            if !block.contains(self.key) {
                continue;
            }

            let command: Value = match serde_json::from_str(block) {
                Ok(value) => value,
                Err(e) => {
                    debug!(key = self.key, error = %e, "skipping unparseable candidate block");
                    continue;
                }
            };

            let reply = hook.execute_command(&command);
            if !reply.is_empty() {
                return Some(reply);
            }
        }

        None
    }
}
