// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

use crate::event_stream::TerminalEvent;
use crate::types::{AssistantMessage, StopReason, ToolCall};

/// Provider-normalized streaming events for one assistant completion.
///
/// Every non-terminal event carries `partial` — a copy-on-emit snapshot of
/// the full assistant message assembled so far.  `done` / `error` carry the
/// finalized message and end the stream (the error payload *is* a finalized
/// assistant message with `stop_reason` set to `aborted` or `error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantMessageEvent {
    Start {
        partial: AssistantMessage,
    },
    TextStart {
        content_index: usize,
        partial: AssistantMessage,
    },
    TextDelta {
        content_index: usize,
        delta: String,
        partial: AssistantMessage,
    },
    TextEnd {
        content_index: usize,
        content: String,
        partial: AssistantMessage,
    },
    ThinkingStart {
        content_index: usize,
        partial: AssistantMessage,
    },
    ThinkingDelta {
        content_index: usize,
        delta: String,
        partial: AssistantMessage,
    },
    ThinkingEnd {
        content_index: usize,
        thinking: String,
        partial: AssistantMessage,
    },
    ToolCallStart {
        content_index: usize,
        partial: AssistantMessage,
    },
    ToolCallDelta {
        content_index: usize,
        delta: String,
        partial: AssistantMessage,
    },
    ToolCallEnd {
        content_index: usize,
        tool_call: ToolCall,
        partial: AssistantMessage,
    },
    Done {
        reason: StopReason,
        message: AssistantMessage,
    },
    Error {
        reason: StopReason,
        error: AssistantMessage,
    },
}

impl AssistantMessageEvent {
    /// The message snapshot carried by this event, whatever its kind.
    pub fn snapshot(&self) -> &AssistantMessage {
        match self {
            Self::Start { partial }
            | Self::TextStart { partial, .. }
            | Self::TextDelta { partial, .. }
            | Self::TextEnd { partial, .. }
            | Self::ThinkingStart { partial, .. }
            | Self::ThinkingDelta { partial, .. }
            | Self::ThinkingEnd { partial, .. }
            | Self::ToolCallStart { partial, .. }
            | Self::ToolCallDelta { partial, .. }
            | Self::ToolCallEnd { partial, .. } => partial,
            Self::Done { message, .. } => message,
            Self::Error { error, .. } => error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

impl TerminalEvent for AssistantMessageEvent {
    type Result = AssistantMessage;

    fn result(&self) -> Option<AssistantMessage> {
        match self {
            Self::Done { message, .. } => Some(message.clone()),
            Self::Error { error, .. } => Some(error.clone()),
            _ => None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelRef;

    fn partial() -> AssistantMessage {
        AssistantMessage::empty(ModelRef::new("p", "a", "m"))
    }

    #[test]
    fn done_is_terminal_with_message_result() {
        let msg = partial();
        let ev = AssistantMessageEvent::Done {
            reason: StopReason::Stop,
            message: msg.clone(),
        };
        assert!(ev.is_terminal());
        assert_eq!(ev.result().unwrap().content, msg.content);
    }

    #[test]
    fn error_is_terminal() {
        let mut msg = partial();
        msg.stop_reason = StopReason::Aborted;
        let ev = AssistantMessageEvent::Error {
            reason: StopReason::Aborted,
            error: msg,
        };
        assert!(ev.is_terminal());
        assert_eq!(ev.result().unwrap().stop_reason, StopReason::Aborted);
    }

    #[test]
    fn deltas_are_not_terminal() {
        let ev = AssistantMessageEvent::TextDelta {
            content_index: 0,
            delta: "hi".into(),
            partial: partial(),
        };
        assert!(!ev.is_terminal());
        assert!(ev.result().is_none());
    }

    #[test]
    fn serializes_with_snake_case_tag() {
        let ev = AssistantMessageEvent::ToolCallStart {
            content_index: 1,
            partial: partial(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "tool_call_start");
        assert_eq!(json["content_index"], 1);
    }
}
