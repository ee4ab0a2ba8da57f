//! End-to-end pipeline tests: session registry, streaming and batch
//! routing, command reinjection, and wire framing.

use interception::governance::GovernanceConfig;
use interception::session::SessionRegistry;
use serde_json::{json, Value};
use tempfile::TempDir;

fn registry() -> (SessionRegistry, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let dir = tempfile::tempdir().unwrap();
    let config = GovernanceConfig {
        state_path: dir.path().join("governance_state.json"),
        event_log_path: dir.path().join("governance_log.json"),
    };
    (SessionRegistry::with_governance_config(config), dir)
}

fn chunk(content: &str) -> Value {
    json!({
        "object": "chat.completion.chunk",
        "choices": [{"delta": {"content": content}}]
    })
}

fn frames_of(bytes: &[u8]) -> Vec<String> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .split("\n\n")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Streaming mode ──────────────────────────────────────────────────────

#[test]
fn streaming_memory_command_is_executed_and_reinjected() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut out: Vec<u8> = Vec::new();
    let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);

    session.process_response(
        &mut chunk(r#"Saving that now: {"memory_command": {"op": "set_key", "#),
        false,
        &mut sink,
    );
    session.process_response(
        &mut chunk(r#""key": "name", "value": "Luna"}}"#),
        true,
        &mut sink,
    );

    let frames = frames_of(&out);
    assert_eq!(frames.len(), 2);
    assert!(frames[0].contains("hook_response"));
    assert!(frames[0].contains("Created new key"));
    assert_eq!(frames.last().unwrap(), "data: [DONE]");
}

#[test]
fn streaming_without_commands_still_terminates() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut out: Vec<u8> = Vec::new();
    let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);

    session.process_response(&mut chunk("Plain prose, "), false, &mut sink);
    session.process_response(&mut chunk("nothing embedded."), true, &mut sink);

    assert_eq!(frames_of(&out), vec!["data: [DONE]"]);
}

#[test]
fn streaming_state_resets_between_responses() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut out: Vec<u8> = Vec::new();

    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(
            &mut chunk(r#"{"memory_command": "count_keys"}"#),
            true,
            &mut sink,
        );
    }
    let first_len = out.len();
    assert!(frames_of(&out[..first_len])[0].contains("key in memory"));

    // A second response starts from an empty buffer: no stale command.
    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk("fresh start"), true, &mut sink);
    }
    let frames = frames_of(&out[first_len..]);
    assert_eq!(frames, vec!["data: [DONE]"]);
}

#[test]
fn streaming_repetition_warning_is_emitted_once() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut out: Vec<u8> = Vec::new();

    // Admit a response into governance history.
    let text = "The quota is sixteen megabytes, which is plenty for this session.";
    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk(text), true, &mut sink);
    }
    out.clear();

    // Stream the same text again: the partial check fires mid-stream.
    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk(text), false, &mut sink);
        session.process_response(&mut chunk(" more"), false, &mut sink);
    }

    let frames = frames_of(&out);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].contains("Rule 28 warning"));
}

#[test]
fn streaming_duplicate_finalize_replaces_response() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut out: Vec<u8> = Vec::new();

    let text = "Paris has been the capital of France for many centuries now.";
    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk(text), true, &mut sink);
    }
    out.clear();

    {
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk(text), true, &mut sink);
    }
    let frames = frames_of(&out);
    // Replacement delta, then the sentinel.
    assert!(frames[0].contains("Rule 28 enforcement"));
    assert_eq!(frames.last().unwrap(), "data: [DONE]");
}

// ── Batch mode ──────────────────────────────────────────────────────────

#[test]
fn batch_memory_command_appends_to_content() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut sink = |_: &[u8]| {};
    let mut payload = json!({
        "content": r#"Let me look that up. {"memory_command": "get_quota"}"#
    });
    session.process_response(&mut payload, true, &mut sink);

    let content = payload["content"].as_str().unwrap();
    assert!(content.starts_with("Let me look that up."));
    assert!(content.contains("16777216 bytes"));
}

#[test]
fn batch_governance_command_appends_to_chat_content() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut sink = |_: &[u8]| {};
    let mut payload = json!({
        "choices": [{"message": {"content": r#"{"hook_command": "governance_check"}"#}}]
    });
    session.process_response(&mut payload, true, &mut sink);

    let content = payload["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(content.contains("Governance Status Report"));
}

#[test]
fn batch_mode_matches_streaming_command_output() {
    let (mut registry, _dir) = registry();
    let text = r#"{"memory_command": "get_quota"}"#;

    let streamed = {
        let session = registry.get_or_create("streamed");
        session.on_cycle_start();
        let mut out: Vec<u8> = Vec::new();
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        session.process_response(&mut chunk(text), true, &mut sink);
        String::from_utf8(out).unwrap()
    };

    let batched = {
        let session = registry.get_or_create("batched");
        session.on_cycle_start();
        let mut sink = |_: &[u8]| {};
        let mut payload = json!({"content": text});
        session.process_response(&mut payload, true, &mut sink);
        payload["content"].as_str().unwrap().to_string()
    };

    // Same handler reply in both modes, different reinjection vehicles.
    let quota_line = "The memory quota is 16777216 bytes";
    assert!(streamed.contains(quota_line));
    assert!(batched.contains(quota_line));
}

// ── Composition ─────────────────────────────────────────────────────────

#[test]
fn injection_prompt_combines_both_handlers_after_first_cycle() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");

    // Before any cycle the governance side contributes nothing.
    let prompt = session.injection_prompt();
    assert!(prompt.contains("[MEMORY SYSTEM INSTRUCTIONS]"));
    assert!(!prompt.contains("Governance Kernel Active"));

    session.on_cycle_start();
    let prompt = session.injection_prompt();
    assert!(prompt.contains("[MEMORY SYSTEM INSTRUCTIONS]"));
    assert!(prompt.contains("Governance Kernel Active"));
}

#[test]
fn both_handlers_respond_to_commands_in_one_text() {
    let (mut registry, _dir) = registry();
    let session = registry.get_or_create("conv-1");
    session.on_cycle_start();

    let mut sink = |_: &[u8]| {};
    let mut payload = json!({
        "content": r#"Both: {"memory_command": "count_keys"} and {"hook_command": "check_memory_kernel"}"#
    });
    session.process_response(&mut payload, true, &mut sink);

    let content = payload["content"].as_str().unwrap();
    assert!(content.contains("key in memory"));
    assert!(content.contains("Memory Kernel Status"));
}

#[test]
fn command_extraction_is_idempotent_for_read_only_commands() {
    use interception::hooks::HookNode;
    use interception::memory::MemoryHook;

    let mut node = HookNode::leaf(MemoryHook::new());
    let text = r#"Checking usage: {"memory_command": "get_usage"}"#;

    let first = node.run_text_commands(text);
    let second = node.run_text_commands(text);
    assert_eq!(first, second);
    assert!(first.contains("Current memory usage"));
}
