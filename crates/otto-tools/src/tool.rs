// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use otto_model::UserContent;

/// The result of executing a tool.
///
/// `content` is what the model sees (as a tool-result message); `details` is
/// an opaque payload surfaced to the UI only.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Vec<UserContent>,
    pub details: Option<Value>,
}

impl ToolResult {
    /// Plain-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![UserContent::text(text)],
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Callback that relays intermediate [`ToolResult`] snapshots while a tool
/// runs.  Each snapshot becomes a `tool_execution_update` event; the final
/// result ordering is unaffected.
pub type ToolUpdateFn = Arc<dyn Fn(ToolResult) + Send + Sync>;

/// Trait every tool must implement.
///
/// `execute` receives only the call id, validated arguments, cancellation
/// token and update callback — never the conversation context.  A tool that
/// observes the token should terminate promptly; the loop records a terminal
/// result either way.  Failures should be returned as `Err` — the executor
/// converts them into `is_error` tool results rather than letting them
/// escape the loop.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable display name.
    fn label(&self) -> &str {
        self.name()
    }

    fn description(&self) -> &str;

    /// JSON Schema for the argument object.
    fn parameters_schema(&self) -> Value;

    async fn execute(
        &self,
        call_id: &str,
        arguments: Value,
        cancel: CancellationToken,
        on_update: Option<ToolUpdateFn>,
    ) -> anyhow::Result<ToolResult>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
