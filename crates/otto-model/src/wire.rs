// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Bandwidth-optimized event transport.
//!
//! Every direct-transport event carries a full `partial` snapshot, which is
//! wasteful over a proxy hop: the server strips it, the client rebuilds the
//! running message from the deltas alone.  The codec is stateless across
//! streams and deterministic — replaying the same stripped sequence yields a
//! message identical (content, stop reason, usage) to the server's source.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::event::AssistantMessageEvent;
use crate::partial_json::parse_partial;
use crate::types::{
    AssistantContent, AssistantMessage, ModelRef, StopReason, ToolCall, Usage,
};

/// [`AssistantMessageEvent`] minus the `partial` snapshots.
///
/// `tool_call_start` carries `id` and `tool_name` because the client has no
/// partial to introspect; `done`/`error` carry only what the client cannot
/// reconstruct locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyAssistantMessageEvent {
    Start,
    TextStart {
        content_index: usize,
    },
    TextDelta {
        content_index: usize,
        delta: String,
    },
    TextEnd {
        content_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_signature: Option<String>,
    },
    ThinkingStart {
        content_index: usize,
    },
    ThinkingDelta {
        content_index: usize,
        delta: String,
    },
    ThinkingEnd {
        content_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_signature: Option<String>,
    },
    ToolCallStart {
        content_index: usize,
        id: String,
        tool_name: String,
    },
    ToolCallDelta {
        content_index: usize,
        delta: String,
    },
    ToolCallEnd {
        content_index: usize,
    },
    Done {
        reason: StopReason,
        usage: Usage,
    },
    Error {
        reason: StopReason,
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
}

/// Server side: drop the `partial` payload from a direct-transport event.
pub fn strip(event: &AssistantMessageEvent) -> ProxyAssistantMessageEvent {
    use AssistantMessageEvent as E;
    use ProxyAssistantMessageEvent as P;
    match event {
        E::Start { .. } => P::Start,
        E::TextStart { content_index, .. } => P::TextStart {
            content_index: *content_index,
        },
        E::TextDelta {
            content_index,
            delta,
            ..
        } => P::TextDelta {
            content_index: *content_index,
            delta: delta.clone(),
        },
        E::TextEnd {
            content_index,
            partial,
            ..
        } => P::TextEnd {
            content_index: *content_index,
            content_signature: block_signature(partial, *content_index),
        },
        E::ThinkingStart { content_index, .. } => P::ThinkingStart {
            content_index: *content_index,
        },
        E::ThinkingDelta {
            content_index,
            delta,
            ..
        } => P::ThinkingDelta {
            content_index: *content_index,
            delta: delta.clone(),
        },
        E::ThinkingEnd {
            content_index,
            partial,
            ..
        } => P::ThinkingEnd {
            content_index: *content_index,
            content_signature: block_signature(partial, *content_index),
        },
        E::ToolCallStart {
            content_index,
            partial,
        } => {
            let (id, tool_name) = match partial.content.get(*content_index) {
                Some(AssistantContent::ToolCall(tc)) => (tc.id.clone(), tc.name.clone()),
                _ => (String::new(), String::new()),
            };
            P::ToolCallStart {
                content_index: *content_index,
                id,
                tool_name,
            }
        }
        E::ToolCallDelta {
            content_index,
            delta,
            ..
        } => P::ToolCallDelta {
            content_index: *content_index,
            delta: delta.clone(),
        },
        E::ToolCallEnd { content_index, .. } => P::ToolCallEnd {
            content_index: *content_index,
        },
        E::Done { reason, message } => P::Done {
            reason: *reason,
            usage: message.usage.clone(),
        },
        E::Error { reason, error } => P::Error {
            reason: *reason,
            usage: error.usage.clone(),
            error_message: error.error_message.clone(),
        },
    }
}

fn block_signature(partial: &AssistantMessage, index: usize) -> Option<String> {
    match partial.content.get(index) {
        Some(AssistantContent::Text { signature, .. })
        | Some(AssistantContent::Thinking { signature, .. }) => signature.clone(),
        _ => None,
    }
}

/// Client side: rebuild direct-transport events from stripped ones.
///
/// One reassembler serves one stream.  Content blocks are created by index
/// on `*_start` events; deltas append to the corresponding block; tool-call
/// argument fragments accumulate in a side channel and are re-parsed after
/// each delta so partial arguments stay usable, then finalized on
/// `tool_call_end`.
pub struct ProxyReassembler {
    partial: AssistantMessage,
    /// Accumulated argument fragments, keyed by content index.
    fragments: HashMap<usize, String>,
}

impl ProxyReassembler {
    /// `model` is the identity the client requested; the server's snapshots
    /// carry the same one.
    pub fn new(model: ModelRef) -> Self {
        Self {
            partial: AssistantMessage::empty(model),
            fragments: HashMap::new(),
        }
    }

    /// Apply one stripped event, returning the reconstructed full event.
    pub fn apply(&mut self, event: ProxyAssistantMessageEvent) -> AssistantMessageEvent {
        use AssistantMessageEvent as E;
        use ProxyAssistantMessageEvent as P;
        match event {
            P::Start => {
                self.partial = AssistantMessage::empty(self.partial.model.clone());
                self.fragments.clear();
                E::Start {
                    partial: self.partial.clone(),
                }
            }
            P::TextStart { content_index } => {
                self.set_block(content_index, AssistantContent::text(""));
                E::TextStart {
                    content_index,
                    partial: self.partial.clone(),
                }
            }
            P::TextDelta {
                content_index,
                delta,
            } => {
                if let Some(AssistantContent::Text { text, .. }) =
                    self.partial.content.get_mut(content_index)
                {
                    text.push_str(&delta);
                }
                E::TextDelta {
                    content_index,
                    delta,
                    partial: self.partial.clone(),
                }
            }
            P::TextEnd {
                content_index,
                content_signature,
            } => {
                let mut content = String::new();
                if let Some(AssistantContent::Text { text, signature }) =
                    self.partial.content.get_mut(content_index)
                {
                    *signature = content_signature;
                    content = text.clone();
                }
                E::TextEnd {
                    content_index,
                    content,
                    partial: self.partial.clone(),
                }
            }
            P::ThinkingStart { content_index } => {
                self.set_block(content_index, AssistantContent::thinking(""));
                E::ThinkingStart {
                    content_index,
                    partial: self.partial.clone(),
                }
            }
            P::ThinkingDelta {
                content_index,
                delta,
            } => {
                if let Some(AssistantContent::Thinking { thinking, .. }) =
                    self.partial.content.get_mut(content_index)
                {
                    thinking.push_str(&delta);
                }
                E::ThinkingDelta {
                    content_index,
                    delta,
                    partial: self.partial.clone(),
                }
            }
            P::ThinkingEnd {
                content_index,
                content_signature,
            } => {
                let mut content = String::new();
                if let Some(AssistantContent::Thinking {
                    thinking,
                    signature,
                }) = self.partial.content.get_mut(content_index)
                {
                    *signature = content_signature;
                    content = thinking.clone();
                }
                E::ThinkingEnd {
                    content_index,
                    thinking: content,
                    partial: self.partial.clone(),
                }
            }
            P::ToolCallStart {
                content_index,
                id,
                tool_name,
            } => {
                self.set_block(
                    content_index,
                    AssistantContent::ToolCall(ToolCall::new(
                        id,
                        tool_name,
                        serde_json::json!({}),
                    )),
                );
                self.fragments.insert(content_index, String::new());
                E::ToolCallStart {
                    content_index,
                    partial: self.partial.clone(),
                }
            }
            P::ToolCallDelta {
                content_index,
                delta,
            } => {
                let buffer = self.fragments.entry(content_index).or_default();
                buffer.push_str(&delta);
                let arguments = parse_partial(buffer);
                if let Some(AssistantContent::ToolCall(tc)) =
                    self.partial.content.get_mut(content_index)
                {
                    tc.arguments = arguments;
                }
                E::ToolCallDelta {
                    content_index,
                    delta,
                    partial: self.partial.clone(),
                }
            }
            P::ToolCallEnd { content_index } => {
                let arguments = self
                    .fragments
                    .remove(&content_index)
                    .map(|buf| parse_partial(&buf))
                    .unwrap_or_else(|| serde_json::json!({}));
                let mut tool_call = None;
                if let Some(AssistantContent::ToolCall(tc)) =
                    self.partial.content.get_mut(content_index)
                {
                    tc.arguments = arguments;
                    tool_call = Some(tc.clone());
                }
                E::ToolCallEnd {
                    content_index,
                    tool_call: tool_call
                        .unwrap_or_else(|| ToolCall::new("", "", serde_json::json!({}))),
                    partial: self.partial.clone(),
                }
            }
            P::Done { reason, usage } => {
                self.partial.stop_reason = reason;
                self.partial.usage = usage;
                E::Done {
                    reason,
                    message: self.partial.clone(),
                }
            }
            P::Error {
                reason,
                usage,
                error_message,
            } => {
                self.partial.stop_reason = reason;
                self.partial.usage = usage;
                self.partial.error_message = error_message;
                E::Error {
                    reason,
                    error: self.partial.clone(),
                }
            }
        }
    }

    fn set_block(&mut self, index: usize, block: AssistantContent) {
        if index < self.partial.content.len() {
            self.partial.content[index] = block;
        } else {
            while self.partial.content.len() < index {
                self.partial.content.push(AssistantContent::text(""));
            }
            self.partial.content.push(block);
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
