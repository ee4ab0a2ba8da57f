//! Hook tree: a handler set is either a single leaf or a composite that
//! fans operations out to its children and merges the results.

use crate::extract::CommandExtractor;

use super::ResponseHook;

/// A node in the hook tree.
///
/// Composition is explicit: a node is either `Leaf(handler)` or
/// `Composite(children)`, resolved by matching rather than by inspecting
/// concrete handler types at run time.
pub enum HookNode {
    /// A single handler, paired with the extractor compiled for its
    /// command key.
    Leaf {
        hook: Box<dyn ResponseHook>,
        extractor: CommandExtractor,
    },
    /// An ordered list of child nodes.
    Composite(Vec<HookNode>),
}

impl HookNode {
    /// Wrap a handler in a leaf node.
    pub fn leaf(hook: impl ResponseHook + 'static) -> Self {
        let extractor = CommandExtractor::new(hook.command_key());
        Self::Leaf {
            hook: Box::new(hook),
            extractor,
        }
    }

    /// Build a composite from an ordered list of children.
    pub fn composite(children: Vec<HookNode>) -> Self {
        Self::Composite(children)
    }

    /// Handler identifier. Composites concatenate child ids.
    pub fn id(&self) -> String {
        match self {
            Self::Leaf { hook, .. } => hook.id(),
            Self::Composite(children) => {
                let ids: Vec<String> = children.iter().map(|c| c.id()).collect();
                format!("composite:[{}]", ids.join(","))
            }
        }
    }

    /// Fan the cycle-start housekeeping out to every handler.
    pub fn on_cycle_start(&mut self) {
        match self {
            Self::Leaf { hook, .. } => hook.on_cycle_start(),
            Self::Composite(children) => {
                for child in children {
                    child.on_cycle_start();
                }
            }
        }
    }

    /// Concatenated injection prompts, skipping handlers with nothing to
    /// inject.
    pub fn injection_prompt(&self) -> String {
        match self {
            Self::Leaf { hook, .. } => hook.injection_prompt(),
            Self::Composite(children) => {
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| c.injection_prompt())
                    .filter(|p| !p.is_empty())
                    .collect();
                parts.join("\n")
            }
        }
    }

    /// Strict left-to-right finalize chain: each handler receives the
    /// previous handler's output, so an earlier veto is visible to and can
    /// be further transformed by a later handler.
    pub fn finalize(&mut self, text: &str) -> String {
        match self {
            Self::Leaf { hook, .. } => hook.finalize(text),
            Self::Composite(children) => {
                let mut current = text.to_string();
                for child in children {
                    current = child.finalize(&current);
                }
                current
            }
        }
    }

    /// Streaming partial check, short-circuiting at the first handler that
    /// reports an issue.
    pub fn check_streaming_partial(&self, partial: &str) -> Option<String> {
        match self {
            Self::Leaf { hook, .. } => hook.check_streaming_partial(partial),
            Self::Composite(children) => children
                .iter()
                .find_map(|c| c.check_streaming_partial(partial)),
        }
    }

    /// Run embedded-command extraction for every handler in the tree and
    /// concatenate the non-empty replies. Unlike the streaming check this
    /// never short-circuits: different handlers may legitimately respond to
    /// different commands embedded in the same text.
    pub fn run_text_commands(&mut self, text: &str) -> String {
        match self {
            Self::Leaf { hook, extractor } => extractor
                .extract_and_execute(text, hook.as_mut())
                .unwrap_or_default(),
            Self::Composite(children) => {
                let mut combined = String::new();
                for child in children {
                    let reply = child.run_text_commands(text);
                    if !reply.is_empty() {
                        if !combined.is_empty() {
                            combined.push('\n');
                        }
                        combined.push_str(&reply);
                    }
                }
                combined
            }
        }
    }
}
