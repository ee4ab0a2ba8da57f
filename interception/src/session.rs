//! Session composition root.
//!
//! A session ties one handler set (memory store + governance engine) to
//! one response router. The registry is a plain value handed to the
//! composition root; there is deliberately no process-global state.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::governance::{GovernanceConfig, GovernanceEngine};
use crate::hooks::HookNode;
use crate::memory::MemoryHook;
use crate::stream::ResponseRouter;

/// One conversation's interception state.
pub struct Session {
    id: String,
    router: ResponseRouter,
    hooks: HookNode,
}

impl Session {
    /// Build a session around an explicit hook tree.
    pub fn new(id: impl Into<String>, hooks: HookNode) -> Self {
        Self {
            id: id.into(),
            router: ResponseRouter::new(),
            hooks,
        }
    }

    /// Build a session with the standard handler set: a memory store and a
    /// governance engine behind one composite.
    pub fn with_default_hooks(id: impl Into<String>, governance: GovernanceConfig) -> Self {
        let hooks = HookNode::composite(vec![
            HookNode::leaf(MemoryHook::new()),
            HookNode::leaf(GovernanceEngine::new(governance)),
        ]);
        Self::new(id, hooks)
    }

    /// The opaque session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Identifier of the attached hook tree.
    pub fn hook_id(&self) -> String {
        self.hooks.id()
    }

    /// Combined injection prompt for the model's system context.
    pub fn injection_prompt(&self) -> String {
        self.hooks.injection_prompt()
    }

    /// Per-cycle housekeeping, fanned out to every handler.
    pub fn on_cycle_start(&mut self) {
        self.hooks.on_cycle_start();
    }

    /// Route one response payload (streamed fragment or batch document)
    /// through the handler set.
    pub fn process_response(
        &mut self,
        response: &mut Value,
        is_final: bool,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        self.router.process(response, is_final, &mut self.hooks, sink);
    }

    /// Direct access to the hook tree.
    pub fn hooks_mut(&mut self) -> &mut HookNode {
        &mut self.hooks
    }
}

/// Explicitly constructed session registry: one handler set per session
/// id, owned by whoever composes the server.
pub struct SessionRegistry {
    governance: GovernanceConfig,
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    /// Registry whose sessions persist governance state under the default
    /// paths.
    pub fn new() -> Self {
        Self::with_governance_config(GovernanceConfig::default())
    }

    /// Registry whose sessions share the given persistence locations.
    pub fn with_governance_config(governance: GovernanceConfig) -> Self {
        Self {
            governance,
            sessions: HashMap::new(),
        }
    }

    /// Fetch a session, creating it with the default handler set on first
    /// use.
    pub fn get_or_create(&mut self, id: &str) -> &mut Session {
        self.sessions.entry(id.to_string()).or_insert_with(|| {
            Session::with_default_hooks(id, self.governance.clone())
        })
    }

    /// Create a session under a fresh generated id.
    pub fn create(&mut self) -> &mut Session {
        let id = Uuid::new_v4().to_string();
        self.get_or_create(&id)
    }

    /// Drop a session and its handler state.
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
