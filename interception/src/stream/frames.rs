//! Wire frames for streamed responses.
//!
//! Every outgoing fragment is serialized as `data: <json>\n\n`; the stream
//! is terminated by a literal `data: [DONE]\n\n` frame regardless of
//! whether a command was found.

use chrono::Utc;
use serde_json::{json, Value};

/// Terminal sentinel frame.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Serialize one payload as a wire frame.
pub fn frame(payload: &Value) -> Vec<u8> {
    format!("data: {payload}\n\n").into_bytes()
}

/// Chunk carrying handler output, delivered as an extra delta appended to
/// whatever the model already streamed.
pub fn hook_chunk(content: &str) -> Value {
    json!({
        "id": "hook_response",
        "object": "chat.completion.chunk",
        "created": Utc::now().timestamp(),
        "model": "hook_system",
        "choices": [{
            "index": 0,
            "delta": { "content": format!("\n\n{content}") },
            "finish_reason": null
        }]
    })
}

/// Chunk carrying a full replacement of the response text (a governance
/// finalize veto).
pub fn rewrite_chunk(content: &str) -> Value {
    json!({
        "choices": [{
            "delta": { "content": content }
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_wraps_payload() {
        let payload = json!({"a": 1});
        let bytes = frame(&payload);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_hook_chunk_shape() {
        let chunk = hook_chunk("reply text");
        assert_eq!(chunk["id"], "hook_response");
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "hook_system");
        assert_eq!(chunk["choices"][0]["delta"]["content"], "\n\nreply text");
        assert!(chunk["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn test_rewrite_chunk_shape() {
        let chunk = rewrite_chunk("replacement");
        assert_eq!(chunk["choices"][0]["delta"]["content"], "replacement");
        assert!(chunk.get("id").is_none());
    }

    #[test]
    fn test_done_frame_literal() {
        assert_eq!(DONE_FRAME, "data: [DONE]\n\n");
    }
}
