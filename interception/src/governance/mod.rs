//! Governance engine: rule registry, drift tracking, adversarial and
//! repetition guards, and durable integrity state.

pub mod adversarial;
pub mod engine;
pub mod mirror;
pub mod persistence;
pub mod registry;

pub use engine::{GovernanceConfig, GovernanceEngine, KERNEL_TOKEN_LIMIT};
pub use mirror::{levenshtein_similarity, Repetition, ResponseHistory};
pub use persistence::{EventKind, GovernanceEvent, GovernanceSnapshot, PersistenceError};
pub use registry::{GovernanceRule, RuleBehavior, RuleCategory, RuleDescriptor, RuleRegistry};
