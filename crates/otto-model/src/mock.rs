// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::event::AssistantMessageEvent;
use crate::event_stream::EventStream;
use crate::partial_json::parse_partial;
use crate::stream::{ModelStream, StreamOptions};
use crate::types::{
    AssistantContent, AssistantMessage, Context, ModelRef, ReasoningEffort, StopReason, ToolCall,
    Usage,
};

/// One high-level step in a scripted completion.  The mock expands steps
/// into the full start/delta/end event sequence a real adapter would emit,
/// maintaining the partial snapshot along the way.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Thinking(String),
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    /// Usage attached to the terminal event of this completion.
    Usage(Usage),
    /// Explicit stop reason; when absent the mock infers `tool_use` / `stop`.
    Finish(StopReason),
    /// Terminal error event (`stop_reason = error`).
    Fail { message: String },
    /// Park until the request's cancellation token fires, then emit a
    /// terminal `aborted` error.  Lets tests abort mid-stream.
    HangUntilCancelled,
}

/// A pre-scripted stream function.  Each `stream` call pops the next script
/// from the front of the queue, so tests can specify exact multi-turn event
/// sequences — including tool calls and failures — without network access.
pub struct ScriptedStream {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    /// The last `Context` seen, so tests can inspect what was sent.
    pub last_context: Mutex<Option<Context>>,
    /// Reasoning effort after the adapter-side xhigh downgrade.
    pub last_reasoning: Mutex<Option<ReasoningEffort>>,
    /// `max_tokens` of the last request.
    pub last_max_tokens: Mutex<Option<u32>>,
    overflow_marker: Option<String>,
    supports_xhigh: bool,
}

impl ScriptedStream {
    pub fn new(scripts: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            last_context: Mutex::new(None),
            last_reasoning: Mutex::new(None),
            last_max_tokens: Mutex::new(None),
            overflow_marker: None,
            supports_xhigh: false,
        }
    }

    /// Convenience: a single text reply.
    pub fn text_reply(text: impl Into<String>) -> Self {
        Self::new(vec![vec![ScriptStep::Text(text.into())]])
    }

    /// Convenience: a tool call, then a text reply on the next call.
    pub fn tool_then_text(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Value,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            vec![ScriptStep::ToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            vec![ScriptStep::Text(final_text.into())],
        ])
    }

    /// Convenience: a terminal error on the first call.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(vec![vec![ScriptStep::Fail {
            message: message.into(),
        }]])
    }

    /// Classify errors containing `marker` as context overflows.
    pub fn with_overflow_marker(mut self, marker: impl Into<String>) -> Self {
        self.overflow_marker = Some(marker.into());
        self
    }

    /// Declare xhigh reasoning support (no downgrade).
    pub fn with_xhigh(mut self) -> Self {
        self.supports_xhigh = true;
        self
    }

    /// Append another script (e.g. for the continuation after compaction).
    pub fn push_script(&self, steps: Vec<ScriptStep>) {
        self.scripts.lock().unwrap().push_back(steps);
    }
}

#[async_trait]
impl ModelStream for ScriptedStream {
    async fn stream(
        &self,
        model: &ModelRef,
        context: &Context,
        options: &StreamOptions,
    ) -> EventStream<AssistantMessageEvent> {
        *self.last_context.lock().unwrap() = Some(context.clone());
        *self.last_reasoning.lock().unwrap() =
            Some(options.reasoning.downgrade_xhigh(self.supports_xhigh));
        *self.last_max_tokens.lock().unwrap() = options.max_tokens;

        let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![ScriptStep::Text("[no more scripts]".into())]
        });

        let stream = EventStream::new();
        let producer = stream.clone();
        let model = model.clone();
        let signal = options.signal.clone();
        tokio::spawn(async move {
            emit_script(&producer, model, steps, signal).await;
        });
        stream
    }

    fn is_context_overflow(&self, error: &str, _model: &ModelRef) -> bool {
        self.overflow_marker
            .as_deref()
            .is_some_and(|marker| error.contains(marker))
    }
}

async fn emit_script(
    stream: &EventStream<AssistantMessageEvent>,
    model: ModelRef,
    steps: Vec<ScriptStep>,
    signal: tokio_util::sync::CancellationToken,
) {
    let mut partial = AssistantMessage::empty(model);
    let mut usage = Usage {
        input: 10,
        output: 10,
        ..Default::default()
    };
    let mut finish: Option<StopReason> = None;
    let mut saw_tool_call = false;

    stream.push(AssistantMessageEvent::Start {
        partial: partial.clone(),
    });

    for step in steps {
        if signal.is_cancelled() {
            abort(stream, &mut partial, usage);
            return;
        }
        match step {
            ScriptStep::Thinking(thinking) => {
                let index = partial.content.len();
                partial.content.push(AssistantContent::thinking(""));
                stream.push(AssistantMessageEvent::ThinkingStart {
                    content_index: index,
                    partial: partial.clone(),
                });
                if let AssistantContent::Thinking { thinking: buf, .. } =
                    &mut partial.content[index]
                {
                    buf.push_str(&thinking);
                }
                stream.push(AssistantMessageEvent::ThinkingDelta {
                    content_index: index,
                    delta: thinking.clone(),
                    partial: partial.clone(),
                });
                stream.push(AssistantMessageEvent::ThinkingEnd {
                    content_index: index,
                    thinking,
                    partial: partial.clone(),
                });
            }
            ScriptStep::Text(text) => {
                let index = partial.content.len();
                partial.content.push(AssistantContent::text(""));
                stream.push(AssistantMessageEvent::TextStart {
                    content_index: index,
                    partial: partial.clone(),
                });
                if let AssistantContent::Text { text: buf, .. } = &mut partial.content[index] {
                    buf.push_str(&text);
                }
                stream.push(AssistantMessageEvent::TextDelta {
                    content_index: index,
                    delta: text.clone(),
                    partial: partial.clone(),
                });
                stream.push(AssistantMessageEvent::TextEnd {
                    content_index: index,
                    content: text,
                    partial: partial.clone(),
                });
            }
            ScriptStep::ToolCall {
                id,
                name,
                arguments,
            } => {
                saw_tool_call = true;
                let index = partial.content.len();
                partial.content.push(AssistantContent::ToolCall(ToolCall::new(
                    id.clone(),
                    name.clone(),
                    serde_json::json!({}),
                )));
                stream.push(AssistantMessageEvent::ToolCallStart {
                    content_index: index,
                    partial: partial.clone(),
                });
                // Stream the serialized arguments in two fragments, re-parsing
                // the accumulated prefix the way a real adapter does.
                let encoded = arguments.to_string();
                let mid = (0..=encoded.len() / 2)
                    .rev()
                    .find(|&i| encoded.is_char_boundary(i))
                    .unwrap_or(0);
                let mut buffer = String::new();
                for fragment in [&encoded[..mid], &encoded[mid..]] {
                    if fragment.is_empty() {
                        continue;
                    }
                    buffer.push_str(fragment);
                    if let AssistantContent::ToolCall(tc) = &mut partial.content[index] {
                        tc.arguments = parse_partial(&buffer);
                    }
                    stream.push(AssistantMessageEvent::ToolCallDelta {
                        content_index: index,
                        delta: fragment.to_string(),
                        partial: partial.clone(),
                    });
                }
                let tool_call = ToolCall::new(id, name, arguments);
                if let AssistantContent::ToolCall(tc) = &mut partial.content[index] {
                    *tc = tool_call.clone();
                }
                stream.push(AssistantMessageEvent::ToolCallEnd {
                    content_index: index,
                    tool_call,
                    partial: partial.clone(),
                });
            }
            ScriptStep::Usage(u) => usage = u,
            ScriptStep::Finish(reason) => finish = Some(reason),
            ScriptStep::Fail { message } => {
                partial.stop_reason = StopReason::Error;
                partial.error_message = Some(message);
                partial.usage = usage;
                stream.push(AssistantMessageEvent::Error {
                    reason: StopReason::Error,
                    error: partial,
                });
                return;
            }
            ScriptStep::HangUntilCancelled => {
                signal.cancelled().await;
                abort(stream, &mut partial, usage);
                return;
            }
        }
    }

    let reason = finish.unwrap_or(if saw_tool_call {
        StopReason::ToolUse
    } else {
        StopReason::Stop
    });
    partial.stop_reason = reason;
    partial.usage = usage;
    stream.push(AssistantMessageEvent::Done {
        reason,
        message: partial,
    });
}

fn abort(
    stream: &EventStream<AssistantMessageEvent>,
    partial: &mut AssistantMessage,
    usage: Usage,
) {
    partial.stop_reason = StopReason::Aborted;
    partial.usage = usage;
    stream.push(AssistantMessageEvent::Error {
        reason: StopReason::Aborted,
        error: partial.clone(),
    });
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
