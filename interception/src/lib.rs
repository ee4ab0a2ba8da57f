//! Response interception and embedded-command pipeline.
//!
//! This library sits between a model-inference engine and the transport
//! layer of a streaming LLM server. It watches the text a model produces
//! (delivered as one finished payload or as incremental fragments),
//! detects a small JSON command protocol embedded in that otherwise
//! free-form text, executes matched commands against pluggable stateful
//! services, and reinjects human-readable results into the outgoing
//! stream without breaking the wire format the client expects.
//!
//! # Components
//!
//! - [`extract`]: bounded scanning for embedded JSON command blocks
//! - [`hooks`]: the handler capability contract and hook composition
//! - [`memory`]: a quota-aware session key/value memory service
//! - [`governance`]: drift tracking, rule enforcement, and integrity state
//! - [`stream`]: the streaming-vs-batch response router and wire framing
//! - [`session`]: the composition root tying one handler set to a session
//!
//! The crate introduces no concurrency of its own: every operation is a
//! synchronous call driven by whatever per-token or per-response callback
//! the hosting inference pipeline already uses.

pub mod extract;
pub mod governance;
pub mod hooks;
pub mod memory;
pub mod session;
pub mod stream;

// Re-export the extraction entry point
pub use extract::CommandExtractor;

// Re-export the handler contract and composition types
pub use hooks::{HookNode, ResponseHook};

// Re-export key memory types
pub use memory::{MemoryHook, MemoryStore, MEMORY_QUOTA_BYTES, PROTECTED_KEY};

// Re-export key governance types
pub use governance::{
    GovernanceConfig, GovernanceEngine, GovernanceEvent, GovernanceRule, GovernanceSnapshot,
    RuleCategory, RuleRegistry,
};

// Re-export the response router
pub use stream::ResponseRouter;

// Re-export session types
pub use session::{Session, SessionRegistry};
