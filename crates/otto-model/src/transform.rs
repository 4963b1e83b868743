// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cross-model history normalization.
//!
//! A conversation may contain assistant messages produced by different
//! models.  Before the history is replayed to a target model it must be
//! cleaned up: provider-private signatures are only valid on the model that
//! issued them, thinking blocks downgrade to text across models, tool-call
//! ids may violate the target's id grammar, and error/abort turns plus
//! orphaned tool calls would be rejected outright by provider APIs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::types::{
    AssistantContent, AssistantMessage, Message, ModelRef, ToolResultMessage,
};

/// Rewrites a tool-call id for the target model.  Must be deterministic and
/// collision-free within one transform run.
pub type ToolCallIdNormalizer = dyn Fn(&str, &ModelRef, &AssistantMessage) -> String + Send + Sync;

/// Synthetic result text for tool calls that never received one.
pub const NO_RESULT_TEXT: &str = "No result provided";

/// Make `messages` acceptable to `target`.
///
/// First pass (per message): same-model messages pass through with their
/// signatures; cross-model assistants have thinking downgraded to text
/// (empty thinking dropped), signatures stripped, and — when `normalize_id`
/// is supplied — tool-call ids rewritten, with matching tool results
/// re-pointed at the new ids.
///
/// Second pass: assistants that stopped with `error`/`aborted` are removed,
/// and every tool call left dangling by the history gets a synthetic
/// `is_error` result before the next user message or the next assistant
/// that calls tools.
///
/// Applying the transform twice with the same target is a no-op provided
/// the normalizer keeps already-conforming ids.
pub fn transform_for_model(
    messages: &[Message],
    target: &ModelRef,
    normalize_id: Option<&ToolCallIdNormalizer>,
) -> Vec<Message> {
    let cleaned = clean_for_target(messages, target, normalize_id);
    repair_orphans(cleaned)
}

fn clean_for_target(
    messages: &[Message],
    target: &ModelRef,
    normalize_id: Option<&ToolCallIdNormalizer>,
) -> Vec<Message> {
    // Tool calls precede their results in any well-formed history, so a
    // single forward pass sees every id mapping before the result that
    // needs it.
    let mut id_map: HashMap<String, String> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::User(_) => out.push(message.clone()),
            Message::ToolResult(tr) => {
                if let Some(mapped) = id_map.get(&tr.tool_call_id) {
                    let mut tr = tr.clone();
                    tr.tool_call_id = mapped.clone();
                    out.push(Message::ToolResult(tr));
                } else {
                    out.push(message.clone());
                }
            }
            Message::Assistant(am) => {
                let same_model = am.model == *target;
                let mut content = Vec::with_capacity(am.content.len());
                for block in &am.content {
                    match block {
                        AssistantContent::Thinking {
                            thinking,
                            signature,
                        } => {
                            if same_model && signature.is_some() {
                                content.push(block.clone());
                            } else if thinking.is_empty() {
                                // Empty thinking blocks are dropped, never
                                // preserved as empties.
                            } else if same_model {
                                content.push(block.clone());
                            } else {
                                content.push(AssistantContent::text(thinking.clone()));
                            }
                        }
                        AssistantContent::Text { text, .. } => {
                            if same_model {
                                content.push(block.clone());
                            } else {
                                content.push(AssistantContent::text(text.clone()));
                            }
                        }
                        AssistantContent::ToolCall(tc) => {
                            let mut tc = tc.clone();
                            if !same_model {
                                tc.thought_signature = None;
                                if let Some(normalize) = normalize_id {
                                    let mapped = normalize(&tc.id, target, am);
                                    if mapped != tc.id {
                                        debug!(from = %tc.id, to = %mapped, "normalized tool-call id");
                                    }
                                    id_map.insert(tc.id.clone(), mapped.clone());
                                    tc.id = mapped;
                                }
                            }
                            content.push(AssistantContent::ToolCall(tc));
                        }
                    }
                }
                let mut am = am.clone();
                am.content = content;
                out.push(Message::Assistant(am));
            }
        }
    }
    out
}

fn repair_orphans(messages: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(messages.len());
    // Unresolved (id, tool_name) pairs from the most recent retained
    // assistant that called tools.
    let mut pending: Vec<(String, String)> = Vec::new();

    for message in messages {
        match message {
            Message::Assistant(am) if am.stop_reason.is_terminal_failure() => {
                // Never replayed to any model.
            }
            Message::Assistant(am) => {
                let calls = am.tool_calls();
                if !calls.is_empty() {
                    flush_pending(&mut pending, &mut out);
                    pending = calls
                        .into_iter()
                        .map(|tc| (tc.id.clone(), tc.name.clone()))
                        .collect();
                }
                out.push(Message::Assistant(am));
            }
            Message::ToolResult(tr) => {
                pending.retain(|(id, _)| id != &tr.tool_call_id);
                out.push(Message::ToolResult(tr));
            }
            Message::User(u) => {
                flush_pending(&mut pending, &mut out);
                out.push(Message::User(u));
            }
        }
    }
    // Trailing pending calls belong to the in-flight turn; their real
    // results are appended by the loop before the next model call.
    out
}

fn flush_pending(pending: &mut Vec<(String, String)>, out: &mut Vec<Message>) {
    for (id, name) in pending.drain(..) {
        debug!(tool_call_id = %id, tool = %name, "synthesizing result for orphaned tool call");
        out.push(Message::ToolResult(ToolResultMessage::error(
            id,
            name,
            NO_RESULT_TEXT,
        )));
    }
}

// ─── Tool-call id helpers ─────────────────────────────────────────────────────

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[A-Za-z0-9_-]{1,64}$").expect("id pattern"))
}

/// Whether `id` conforms to the strictest id grammar among supported
/// providers (`^[A-Za-z0-9_-]{1,64}$`).
pub fn valid_tool_call_id(id: &str) -> bool {
    id_pattern().is_match(id)
}

/// A normalizer that keeps conforming ids and rewrites every other id to a
/// short sequential `toolu_NNNN`.  Keeping conforming ids makes repeated
/// transforms idempotent; the counter makes fresh ids collision-free within
/// one run.
pub fn sequential_id_normalizer(
) -> impl Fn(&str, &ModelRef, &AssistantMessage) -> String + Send + Sync {
    let counter = AtomicU32::new(0);
    move |id, _model, _source| {
        if valid_tool_call_id(id) {
            id.to_string()
        } else {
            let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
            format!("toolu_{n:04}")
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StopReason, ToolCall, UserContent};
    use serde_json::json;

    fn model_a() -> ModelRef {
        ModelRef::new("anthropic", "messages", "claude-opus-4-5")
    }

    fn model_b() -> ModelRef {
        ModelRef::new("openai", "chat-completions", "gpt-4o")
    }

    fn assistant(model: ModelRef, content: Vec<AssistantContent>) -> Message {
        let mut m = AssistantMessage::empty(model);
        m.content = content;
        m.stop_reason = StopReason::Stop;
        Message::Assistant(m)
    }

    fn signed_thinking(text: &str) -> AssistantContent {
        AssistantContent::Thinking {
            thinking: text.into(),
            signature: Some("sig-1".into()),
        }
    }

    // ── First pass: block cleanup ─────────────────────────────────────────────

    #[test]
    fn same_model_keeps_signed_thinking() {
        let history = vec![assistant(model_a(), vec![signed_thinking("reasoning")])];
        let out = transform_for_model(&history, &model_a(), None);
        let am = out[0].as_assistant().unwrap();
        assert!(matches!(
            &am.content[0],
            AssistantContent::Thinking { signature: Some(_), .. }
        ));
    }

    #[test]
    fn cross_model_downgrades_thinking_to_text() {
        let history = vec![assistant(model_a(), vec![signed_thinking("reasoning")])];
        let out = transform_for_model(&history, &model_b(), None);
        let am = out[0].as_assistant().unwrap();
        match &am.content[0] {
            AssistantContent::Text { text, signature } => {
                assert_eq!(text, "reasoning");
                assert!(signature.is_none());
            }
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn empty_thinking_dropped_cross_model() {
        let history = vec![assistant(
            model_a(),
            vec![
                AssistantContent::Thinking {
                    thinking: String::new(),
                    signature: None,
                },
                AssistantContent::text("answer"),
            ],
        )];
        let out = transform_for_model(&history, &model_b(), None);
        assert_eq!(out[0].as_assistant().unwrap().content.len(), 1);
    }

    #[test]
    fn empty_unsigned_thinking_dropped_even_same_model() {
        let history = vec![assistant(
            model_a(),
            vec![AssistantContent::Thinking {
                thinking: String::new(),
                signature: None,
            }],
        )];
        let out = transform_for_model(&history, &model_a(), None);
        assert!(out[0].as_assistant().unwrap().content.is_empty());
    }

    #[test]
    fn cross_model_strips_text_signature_but_keeps_empty_text() {
        let history = vec![assistant(
            model_a(),
            vec![AssistantContent::Text {
                text: String::new(),
                signature: Some("sig".into()),
            }],
        )];
        let out = transform_for_model(&history, &model_b(), None);
        // Empty text blocks are structural markers and must survive.
        match &out[0].as_assistant().unwrap().content[0] {
            AssistantContent::Text { text, signature } => {
                assert_eq!(text, "");
                assert!(signature.is_none());
            }
            other => panic!("expected text block, got {other:?}"),
        }
    }

    #[test]
    fn cross_model_strips_thought_signature_from_tool_calls() {
        let mut tc = ToolCall::new("call_1", "ls", json!({"path": "."}));
        tc.thought_signature = Some("ts".into());
        let history = vec![assistant(model_a(), vec![AssistantContent::ToolCall(tc)])];
        let out = transform_for_model(&history, &model_b(), None);
        let am = out[0].as_assistant().unwrap();
        assert!(am.tool_calls()[0].thought_signature.is_none());
    }

    // ── Id normalization ──────────────────────────────────────────────────────

    #[test]
    fn long_id_rewritten_and_tool_result_follows() {
        let long_id = "x".repeat(480);
        let history = vec![
            assistant(
                model_a(),
                vec![AssistantContent::ToolCall(ToolCall::new(
                    long_id.clone(),
                    "ls",
                    json!({}),
                ))],
            ),
            Message::ToolResult(ToolResultMessage::text(long_id, "ls", "a.txt")),
        ];
        let normalizer = sequential_id_normalizer();
        let out = transform_for_model(&history, &model_b(), Some(&normalizer));
        let am = out[0].as_assistant().unwrap();
        assert_eq!(am.tool_calls()[0].id, "toolu_0001");
        assert_eq!(out[1].as_tool_result().unwrap().tool_call_id, "toolu_0001");
    }

    #[test]
    fn same_model_preserves_ids_and_signatures() {
        let long_id = "y".repeat(480);
        let history = vec![assistant(
            model_a(),
            vec![
                signed_thinking("r"),
                AssistantContent::ToolCall(ToolCall::new(long_id.clone(), "ls", json!({}))),
            ],
        )];
        let normalizer = sequential_id_normalizer();
        let out = transform_for_model(&history, &model_a(), Some(&normalizer));
        let am = out[0].as_assistant().unwrap();
        assert_eq!(am.tool_calls()[0].id, long_id);
        assert!(matches!(
            &am.content[0],
            AssistantContent::Thinking { signature: Some(_), .. }
        ));
    }

    #[test]
    fn transform_is_idempotent() {
        let history = vec![
            Message::user("go"),
            assistant(
                model_a(),
                vec![
                    signed_thinking("deep thought"),
                    AssistantContent::ToolCall(ToolCall::new("bad id!", "ls", json!({}))),
                ],
            ),
            Message::ToolResult(ToolResultMessage::text("bad id!", "ls", "ok")),
        ];
        let normalizer = sequential_id_normalizer();
        let once = transform_for_model(&history, &model_b(), Some(&normalizer));
        let normalizer2 = sequential_id_normalizer();
        let twice = transform_for_model(&once, &model_b(), Some(&normalizer2));
        assert_eq!(once, twice);
    }

    // ── Orphan repair ─────────────────────────────────────────────────────────

    #[test]
    fn errored_assistants_are_removed() {
        let mut failed = AssistantMessage::empty(model_a());
        failed.stop_reason = StopReason::Error;
        failed.error_message = Some("boom".into());
        let mut aborted = AssistantMessage::empty(model_a());
        aborted.stop_reason = StopReason::Aborted;
        let history = vec![
            Message::user("hi"),
            Message::Assistant(failed),
            Message::Assistant(aborted),
        ];
        let out = transform_for_model(&history, &model_a(), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].role(), "user");
    }

    #[test]
    fn orphaned_call_gets_synthetic_result_before_next_user() {
        let history = vec![
            assistant(
                model_a(),
                vec![AssistantContent::ToolCall(ToolCall::new(
                    "c1",
                    "ls",
                    json!({}),
                ))],
            ),
            Message::user("never mind"),
        ];
        let out = transform_for_model(&history, &model_a(), None);
        assert_eq!(out.len(), 3);
        let tr = out[1].as_tool_result().unwrap();
        assert_eq!(tr.tool_call_id, "c1");
        assert!(tr.is_error);
        assert_eq!(tr.content, vec![UserContent::text(NO_RESULT_TEXT)]);
        assert_eq!(out[2].role(), "user");
    }

    #[test]
    fn orphaned_call_flushed_before_next_tool_calling_assistant() {
        let history = vec![
            assistant(
                model_a(),
                vec![AssistantContent::ToolCall(ToolCall::new(
                    "c1",
                    "ls",
                    json!({}),
                ))],
            ),
            assistant(
                model_a(),
                vec![AssistantContent::ToolCall(ToolCall::new(
                    "c2",
                    "grep",
                    json!({}),
                ))],
            ),
        ];
        let out = transform_for_model(&history, &model_a(), None);
        // assistant(c1), synthetic result for c1, assistant(c2)
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].as_tool_result().unwrap().tool_call_id, "c1");
        assert!(out[2].as_assistant().is_some());
    }

    #[test]
    fn resolved_calls_are_not_duplicated() {
        let history = vec![
            assistant(
                model_a(),
                vec![
                    AssistantContent::ToolCall(ToolCall::new("c1", "ls", json!({}))),
                    AssistantContent::ToolCall(ToolCall::new("c2", "grep", json!({}))),
                ],
            ),
            Message::ToolResult(ToolResultMessage::text("c1", "ls", "ok")),
            Message::user("next"),
        ];
        let out = transform_for_model(&history, &model_a(), None);
        // c2 is orphaned, c1 is not
        let synthetic: Vec<&ToolResultMessage> = out
            .iter()
            .filter_map(|m| m.as_tool_result())
            .filter(|tr| tr.is_error)
            .collect();
        assert_eq!(synthetic.len(), 1);
        assert_eq!(synthetic[0].tool_call_id, "c2");
    }

    #[test]
    fn trailing_pending_calls_are_left_open() {
        let history = vec![assistant(
            model_a(),
            vec![AssistantContent::ToolCall(ToolCall::new(
                "c1",
                "ls",
                json!({}),
            ))],
        )];
        let out = transform_for_model(&history, &model_a(), None);
        assert_eq!(out.len(), 1, "in-flight turn must not be closed");
    }

    #[test]
    fn unmatched_tool_result_passes_through() {
        let history = vec![Message::ToolResult(ToolResultMessage::text(
            "ghost", "ls", "?",
        ))];
        let out = transform_for_model(&history, &model_a(), None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_tool_result().unwrap().tool_call_id, "ghost");
    }

    // ── Id grammar ────────────────────────────────────────────────────────────

    #[test]
    fn id_grammar_accepts_and_rejects() {
        assert!(valid_tool_call_id("toolu_0001"));
        assert!(valid_tool_call_id("a-B_9"));
        assert!(!valid_tool_call_id(""));
        assert!(!valid_tool_call_id("has space"));
        assert!(!valid_tool_call_id(&"x".repeat(65)));
    }
}
