//! Session key/value memory service.
//!
//! One store per session, with an advisory 16 MB quota and a protected
//! instruction entry that survives normal delete/overwrite paths.

pub mod hook;
pub mod store;

pub use hook::MemoryHook;
pub use store::{
    format_bytes, DeleteOutcome, MemoryStore, WriteOutcome, MEMORY_QUOTA_BYTES, PROTECTED_KEY,
};
