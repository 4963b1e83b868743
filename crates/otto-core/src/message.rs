// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use otto_model::{AssistantMessage, Message, ToolResultMessage, UserMessage};

/// A deployment-defined message variant.
///
/// Custom variants are visible to the UI and the session log but opaque to
/// models: a [`ConvertToLlm`] mapper decides what (if anything) each kind
/// contributes to LM context.  `kind` is the open discriminator — the
/// constants below cover the variants this crate itself produces or gives
/// meaning to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMessage {
    pub kind: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl CustomMessage {
    pub const BASH_EXECUTION: &'static str = "bash_execution";
    pub const BRANCH_SUMMARY: &'static str = "branch_summary";
    pub const COMPACTION_SUMMARY: &'static str = "compaction_summary";

    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }
}

/// A message as the agent (and its UI) sees it: the LM-facing union plus
/// custom variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum AgentMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
    ToolResult(ToolResultMessage),
    Custom(CustomMessage),
}

impl AgentMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(UserMessage::text(text))
    }

    /// Role discriminator; custom variants answer with their kind.
    pub fn role(&self) -> &str {
        match self {
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolResult(_) => "tool_result",
            Self::Custom(c) => &c.kind,
        }
    }

    pub fn as_assistant(&self) -> Option<&AssistantMessage> {
        match self {
            Self::Assistant(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultMessage> {
        match self {
            Self::ToolResult(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomMessage> {
        match self {
            Self::Custom(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Message> for AgentMessage {
    fn from(m: Message) -> Self {
        match m {
            Message::User(m) => Self::User(m),
            Message::Assistant(m) => Self::Assistant(m),
            Message::ToolResult(m) => Self::ToolResult(m),
        }
    }
}

impl From<AssistantMessage> for AgentMessage {
    fn from(m: AssistantMessage) -> Self {
        Self::Assistant(m)
    }
}

impl From<ToolResultMessage> for AgentMessage {
    fn from(m: ToolResultMessage) -> Self {
        Self::ToolResult(m)
    }
}

/// Maps an [`AgentMessage`] to its LM representation; `None` drops the
/// variant from LM context entirely.
pub type ConvertToLlm = Arc<dyn Fn(&AgentMessage) -> Option<Message> + Send + Sync>;

/// The stock mapper: plain variants pass through; branch and compaction
/// summaries render as user messages (which also keeps a freshly compacted
/// context continuable); every other custom kind is dropped.
pub fn default_convert_to_llm() -> ConvertToLlm {
    Arc::new(|message| match message {
        AgentMessage::User(m) => Some(Message::User(m.clone())),
        AgentMessage::Assistant(m) => Some(Message::Assistant(m.clone())),
        AgentMessage::ToolResult(m) => Some(Message::ToolResult(m.clone())),
        AgentMessage::Custom(c)
            if c.kind == CustomMessage::BRANCH_SUMMARY
                || c.kind == CustomMessage::COMPACTION_SUMMARY =>
        {
            Some(Message::user(c.content.clone()))
        }
        AgentMessage::Custom(_) => None,
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_of_custom_is_its_kind() {
        let m = AgentMessage::Custom(CustomMessage::new("bash_execution", "$ ls"));
        assert_eq!(m.role(), "bash_execution");
    }

    #[test]
    fn default_mapper_passes_plain_variants() {
        let mapper = default_convert_to_llm();
        let user = AgentMessage::user("hi");
        assert_eq!(mapper(&user).unwrap().role(), "user");
        let tr = AgentMessage::from(ToolResultMessage::text("c1", "ls", "out"));
        assert_eq!(mapper(&tr).unwrap().role(), "tool_result");
    }

    #[test]
    fn default_mapper_renders_summaries_as_user() {
        let mapper = default_convert_to_llm();
        let summary = AgentMessage::Custom(CustomMessage::new(
            CustomMessage::COMPACTION_SUMMARY,
            "## Goal\nship it",
        ));
        let llm = mapper(&summary).unwrap();
        assert_eq!(llm.role(), "user");
        match llm {
            Message::User(u) => assert_eq!(
                u.content,
                vec![otto_model::UserContent::text("## Goal\nship it")]
            ),
            other => panic!("expected user, got {other:?}"),
        }
    }

    #[test]
    fn default_mapper_drops_unknown_customs() {
        let mapper = default_convert_to_llm();
        let custom = AgentMessage::Custom(CustomMessage::new("bash_execution", "$ make"));
        assert!(mapper(&custom).is_none());
    }

    #[test]
    fn serializes_with_role_tag() {
        let m = AgentMessage::Custom(CustomMessage::new("label_note", "x"));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["role"], "custom");
        assert_eq!(json["kind"], "label_note");
    }
}
