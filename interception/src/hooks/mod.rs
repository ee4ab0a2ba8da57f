//! Handler capability contract and hook composition.
//!
//! A handler (memory store, governance engine) is any stateful service
//! exposing the [`ResponseHook`] trait. Handlers never fail across this
//! boundary: every failure mode becomes descriptive text returned to the
//! model-facing stream.

pub mod composite;

pub use composite::HookNode;

use serde_json::Value;

/// Capability contract every handler implements.
///
/// All methods are infallible by design. A command that cannot be executed
/// reports the problem in its returned text; an empty reply means the
/// handler did not recognize the command and the caller should keep
/// scanning.
pub trait ResponseHook {
    /// Stable identifier for this handler.
    fn id(&self) -> String;

    /// JSON key that marks this handler's embedded commands
    /// (e.g. `memory_command`, `hook_command`).
    fn command_key(&self) -> &'static str;

    /// Text appended to the model's system context so the model knows the
    /// command surface this handler offers. Empty when the handler has
    /// nothing to inject yet.
    fn injection_prompt(&self) -> String;

    /// Execute a parsed command value, returning human-readable text.
    fn execute_command(&mut self, command: &Value) -> String;

    /// Housekeeping invoked once per inference cycle. The trigger itself is
    /// opaque to this crate; only its occurrence matters.
    fn on_cycle_start(&mut self) {}

    /// Cheap check over the partially streamed buffer. Invoked periodically
    /// during streaming; must not mutate handler state. A returned warning
    /// is surfaced as an out-of-band notice, never a veto.
    fn check_streaming_partial(&self, _partial: &str) -> Option<String> {
        None
    }

    /// Inspect a completed response, either passing it through unchanged or
    /// replacing it wholesale (the only text-replacement path in the
    /// pipeline).
    fn finalize(&mut self, text: &str) -> String {
        text.to_string()
    }
}
