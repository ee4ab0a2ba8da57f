//! Response router: the per-response streaming/batch state machine.

use serde_json::Value;
use tracing::debug;

use crate::hooks::HookNode;

use super::frames::{self, DONE_FRAME};

/// Buffered content below this length skips the streaming partial check.
const STREAM_CHECK_MIN_BUFFER: usize = 50;

/// Per-session response router.
///
/// Holds the accumulation buffer for the response currently being
/// streamed. The buffer is created at stream start, appended per
/// fragment, and cleared at stream end; it is never persisted.
pub struct ResponseRouter {
    buffer: String,
    notice_sent: bool,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            notice_sent: false,
        }
    }

    /// Content accumulated for the in-flight streamed response.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Route one payload through the hook set.
    ///
    /// Streaming fragments are accumulated and passed through; the terminal
    /// fragment drives the finalize → extract → execute → reinject sequence
    /// and emits the stream sentinel. Batch payloads run the same sequence
    /// synchronously, appending in place.
    pub fn process(
        &mut self,
        response: &mut Value,
        is_final: bool,
        hooks: &mut HookNode,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        if is_streaming_payload(response) {
            self.process_streaming(response, is_final, hooks, sink);
        } else {
            process_batch(response, hooks);
        }
    }

    fn process_streaming(
        &mut self,
        response: &Value,
        is_final: bool,
        hooks: &mut HookNode,
        sink: &mut dyn FnMut(&[u8]),
    ) {
        if let Some(delta) = delta_content(response) {
            self.buffer.push_str(delta);
        }

        if !is_final {
            // Streaming checks inform, they do not block tokens already
            // emitted. One notice per response is enough.
            if !self.notice_sent && self.buffer.len() >= STREAM_CHECK_MIN_BUFFER {
                if let Some(warning) = hooks.check_streaming_partial(&self.buffer) {
                    sink(&frames::frame(&frames::hook_chunk(&warning)));
                    self.notice_sent = true;
                }
            }
            return;
        }

        let original = std::mem::take(&mut self.buffer);
        let finalized = hooks.finalize(&original);
        if finalized != original {
            debug!("finalize replaced the streamed response");
            sink(&frames::frame(&frames::rewrite_chunk(&finalized)));
        }

        let reply = hooks.run_text_commands(&finalized);
        if !reply.is_empty() {
            sink(&frames::frame(&frames::hook_chunk(&reply)));
        }

        sink(DONE_FRAME.as_bytes());
        self.notice_sent = false;
    }
}

impl Default for ResponseRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Streamed fragments are marked `"object": "chat.completion.chunk"`,
/// either directly or on the first element of a payload array.
fn is_streaming_payload(payload: &Value) -> bool {
    let object_of = |v: &Value| {
        v.get("object")
            .and_then(Value::as_str)
            .map(|o| o == "chat.completion.chunk")
            .unwrap_or(false)
    };
    if object_of(payload) {
        return true;
    }
    payload
        .as_array()
        .and_then(|a| a.first())
        .map(object_of)
        .unwrap_or(false)
}

/// Content delta of a streamed fragment, direct-object or array-wrapped.
fn delta_content(payload: &Value) -> Option<&str> {
    fn from_choices(v: &Value) -> Option<&str> {
        v.get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str()
    }
    from_choices(payload).or_else(|| payload.as_array().and_then(|a| from_choices(a.first()?)))
}

/// Batch mode: finalize, dispatch, and append in place.
fn process_batch(response: &mut Value, hooks: &mut HookNode) {
    let Some(text) = batch_content(response) else {
        debug!("no recognizable text field in batch payload");
        return;
    };
    if text.is_empty() {
        return;
    }

    let finalized = hooks.finalize(&text);
    let reply = hooks.run_text_commands(&finalized);

    // Handler replies are appended, never substituted; only a finalize
    // veto replaces text.
    let updated = if reply.is_empty() {
        finalized
    } else {
        format!("{finalized}\n{reply}")
    };
    if updated != text {
        set_batch_content(response, &updated);
    }
}

/// Locate the model text in a batch payload: chat-completion message
/// content first, then the bare `content`/`text` fields.
fn batch_content(payload: &Value) -> Option<String> {
    if let Some(content) = payload
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    if let Some(content) = payload.get("content").and_then(Value::as_str) {
        return Some(content.to_string());
    }
    payload
        .get("text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn set_batch_content(payload: &mut Value, updated: &str) {
    if let Some(content) = payload
        .get_mut("choices")
        .and_then(|c| c.get_mut(0))
        .and_then(|c| c.get_mut("message"))
        .and_then(|m| m.get_mut("content"))
    {
        *content = Value::String(updated.to_string());
        return;
    }
    if let Some(content) = payload.get_mut("content") {
        *content = Value::String(updated.to_string());
        return;
    }
    if let Some(text) = payload.get_mut("text") {
        *text = Value::String(updated.to_string());
    }
}
