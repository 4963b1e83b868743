// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::bail;

use otto_model::{
    AssistantContent, Context, Message, ModelRef, ModelStream, ReasoningEffort, StopReason,
    StreamOptions, UserContent,
};

use crate::message::AgentMessage;

/// System preamble for every summarization call.
const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a conversation summarization assistant for a software engineering \
agent. You produce dense, structured checkpoints that replace older \
conversation history, so every detail you keep must be usable to continue \
the work seamlessly.";

const INITIAL_PROMPT: &str = "\
Create a structured checkpoint of the conversation below. Use EXACTLY the
following Markdown sections — do not add or remove sections. Preserve exact
file paths, function names, and error strings; they are load-bearing.

## Goal
What the user is ultimately trying to accomplish.

## Constraints & Preferences
Every requirement, constraint, or stated preference that must be honored.

## Progress
### Done
### In Progress
### Blocked

## Key Decisions
Each significant technical decision and its rationale.

## Next Steps
What should happen next, in order.

## Critical Context
Anything else that would be lost with the original messages.

<conversation>
{conversation}
</conversation>";

const UPDATE_PROMPT: &str = "\
Below is the existing checkpoint of the earlier portion of this
conversation, followed by the messages that occurred after it. Produce an
updated checkpoint with the SAME structure (Goal, Constraints & Preferences,
Progress with Done/In Progress/Blocked, Key Decisions, Next Steps, Critical
Context): move completed items to Done, preserve decisions, remove resolved
blockers, and retain exact file paths, function names, and error strings.

<previous-summary>
{previous_summary}
</previous-summary>

<new-messages>
{conversation}
</new-messages>";

const TURN_PREFIX_PROMPT: &str = "\
The following is the beginning of a conversation turn that was truncated
during compaction. Summarize it using EXACTLY these Markdown sections:

## Original Request
What the user asked for at the start of this turn.

## Early Progress
What the assistant did in this truncated portion, including tool calls.

## Context for Suffix
What the remainder of the turn needs to know to make sense.

<partial-turn>
{conversation}
</partial-turn>";

/// Summarize `messages`, iterating on `previous_summary` when present.
/// Output budget is ⌊0.8·reserve_tokens⌋.
pub async fn summarize_history(
    stream: &dyn ModelStream,
    model: &ModelRef,
    messages: &[AgentMessage],
    previous_summary: Option<&str>,
    reserve_tokens: u64,
    api_key: Option<String>,
) -> anyhow::Result<String> {
    let conversation = serialize_for_summary(messages);
    let prompt = match previous_summary {
        Some(previous) => UPDATE_PROMPT
            .replace("{previous_summary}", previous)
            .replace("{conversation}", &conversation),
        None => INITIAL_PROMPT.replace("{conversation}", &conversation),
    };
    run_summary(stream, model, prompt, (reserve_tokens * 8 / 10) as u32, api_key).await
}

/// One-shot summary for a forked branch.  Uses the initial checkpoint
/// prompt; unlike compaction there is never a previous summary to iterate
/// on.  The caller records the result as a `branch_summary` session entry.
pub async fn summarize_branch(
    stream: &dyn ModelStream,
    model: &ModelRef,
    messages: &[AgentMessage],
    reserve_tokens: u64,
    api_key: Option<String>,
) -> anyhow::Result<String> {
    summarize_history(stream, model, messages, None, reserve_tokens, api_key).await
}

/// Summarize the truncated prefix of a split turn.
/// Output budget is ⌊0.5·reserve_tokens⌋.
pub async fn summarize_turn_prefix(
    stream: &dyn ModelStream,
    model: &ModelRef,
    messages: &[AgentMessage],
    reserve_tokens: u64,
    api_key: Option<String>,
) -> anyhow::Result<String> {
    let conversation = serialize_for_summary(messages);
    let prompt = TURN_PREFIX_PROMPT.replace("{conversation}", &conversation);
    run_summary(stream, model, prompt, (reserve_tokens / 2) as u32, api_key).await
}

async fn run_summary(
    stream: &dyn ModelStream,
    model: &ModelRef,
    prompt: String,
    max_tokens: u32,
    api_key: Option<String>,
) -> anyhow::Result<String> {
    let context = Context {
        system_prompt: SUMMARY_SYSTEM_PROMPT.to_string(),
        tools: vec![],
        messages: vec![Message::user(prompt)],
    };
    let options = StreamOptions {
        max_tokens: Some(max_tokens),
        reasoning: ReasoningEffort::High,
        api_key,
        ..Default::default()
    };

    let response = stream.stream(model, &context, &options).await;
    let message = response.result().await?;
    if message.stop_reason == StopReason::Error {
        bail!(
            "summarization failed: {}",
            message.error_message.unwrap_or_else(|| "unknown error".into())
        );
    }
    let text = message.text();
    if text.is_empty() {
        bail!("summarization returned an empty response");
    }
    Ok(text)
}

/// Render messages as plain text for a summarization prompt.  Human-readable
/// role labels keep the model from trying to continue the conversation
/// instead of summarizing it.
pub fn serialize_for_summary(messages: &[AgentMessage]) -> String {
    let mut out = String::new();
    for message in messages {
        match message {
            AgentMessage::User(m) => {
                let text = user_content_text(&m.content);
                if !text.is_empty() {
                    out.push_str("[User]: ");
                    out.push_str(&text);
                    out.push('\n');
                }
            }
            AgentMessage::Assistant(m) => {
                let mut thinking = Vec::new();
                let mut text = Vec::new();
                let mut calls = Vec::new();
                for block in &m.content {
                    match block {
                        AssistantContent::Thinking { thinking: t, .. } => {
                            thinking.push(t.as_str())
                        }
                        AssistantContent::Text { text: t, .. } => text.push(t.as_str()),
                        AssistantContent::ToolCall(tc) => {
                            calls.push(format!("{}({})", tc.name, tc.arguments));
                        }
                    }
                }
                if !thinking.is_empty() {
                    out.push_str("[Assistant thinking]: ");
                    out.push_str(&thinking.join(" "));
                    out.push('\n');
                }
                if !text.is_empty() {
                    out.push_str("[Assistant]: ");
                    out.push_str(&text.join(""));
                    out.push('\n');
                }
                if !calls.is_empty() {
                    out.push_str("[Assistant tool calls]: ");
                    out.push_str(&calls.join("; "));
                    out.push('\n');
                }
            }
            AgentMessage::ToolResult(m) => {
                let label = if m.is_error {
                    format!("[Tool error ({})]: ", m.tool_name)
                } else {
                    format!("[Tool result ({})]: ", m.tool_name)
                };
                out.push_str(&label);
                let text = user_content_text(&m.content);
                // Very long tool results dominate the prompt without adding
                // proportional signal.
                if text.len() > 2000 {
                    let cut = (0..=2000).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
                    out.push_str(&text[..cut]);
                    out.push_str("...(truncated)");
                } else {
                    out.push_str(&text);
                }
                out.push('\n');
            }
            AgentMessage::Custom(m) => {
                out.push_str(&format!("[{}]: ", m.kind));
                out.push_str(&m.content);
                out.push('\n');
            }
        }
    }
    out
}

fn user_content_text(content: &[UserContent]) -> String {
    content
        .iter()
        .map(|part| match part {
            UserContent::Text { text } => text.as_str(),
            UserContent::Image { .. } => "[image]",
        })
        .collect::<Vec<_>>()
        .join("")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
