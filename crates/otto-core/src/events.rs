// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use otto_model::{AssistantMessage, AssistantMessageEvent, TerminalEvent, ToolResultMessage};
use otto_tools::ToolResult;

use crate::message::AgentMessage;

/// UI-facing events for one agent run.
///
/// Consumers may rely on the ordering contract: `agent_start` precedes any
/// `turn_start`; a `turn_start` precedes its `message_*` / `tool_*` events;
/// `turn_end` precedes any subsequent `turn_start` or `agent_end`;
/// `message_update` events within a message arrive in provider order.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    AgentStart,
    /// Terminal: carries every message this run produced.
    AgentEnd {
        messages: Vec<AgentMessage>,
    },
    TurnStart,
    TurnEnd {
        message: AssistantMessage,
        tool_results: Vec<ToolResultMessage>,
    },
    MessageStart {
        message: AgentMessage,
    },
    MessageUpdate {
        message: AgentMessage,
        event: AssistantMessageEvent,
    },
    MessageEnd {
        message: AgentMessage,
    },
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolExecutionUpdate {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        partial: ToolResult,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: ToolResult,
        is_error: bool,
    },
}

impl AgentEvent {
    /// Event kind tag, used by trace assertions.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentStart => "agent_start",
            Self::AgentEnd { .. } => "agent_end",
            Self::TurnStart => "turn_start",
            Self::TurnEnd { .. } => "turn_end",
            Self::MessageStart { .. } => "message_start",
            Self::MessageUpdate { .. } => "message_update",
            Self::MessageEnd { .. } => "message_end",
            Self::ToolExecutionStart { .. } => "tool_execution_start",
            Self::ToolExecutionUpdate { .. } => "tool_execution_update",
            Self::ToolExecutionEnd { .. } => "tool_execution_end",
        }
    }
}

impl TerminalEvent for AgentEvent {
    type Result = Vec<AgentMessage>;

    fn result(&self) -> Option<Vec<AgentMessage>> {
        match self {
            Self::AgentEnd { messages } => Some(messages.clone()),
            _ => None,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
