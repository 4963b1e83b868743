// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use otto_model::{ToolCall, ToolSchema};

use crate::tool::{Tool, ToolResult, ToolUpdateFn};
use crate::validate::validate_arguments;

/// Central registry holding all tools available to an agent.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Schemas for all registered tools, sorted by name for a stable request
    /// payload.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Run one tool call: lookup → argument validation → execution.
    ///
    /// Never panics and never propagates an error — every failure mode
    /// (unknown tool, validation failure, execution error) is converted into
    /// an `is_error` result so the agent loop can record it and move on.
    pub async fn execute_call(
        &self,
        call: &ToolCall,
        cancel: CancellationToken,
        on_update: Option<ToolUpdateFn>,
    ) -> (ToolResult, bool) {
        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "model requested an unregistered tool");
            return (
                ToolResult::text(format!("Tool {} not found", call.name)),
                true,
            );
        };

        let arguments = match validate_arguments(&tool.parameters_schema(), &call.arguments) {
            Ok(args) => args,
            Err(e) => return (ToolResult::text(e.to_string()), true),
        };

        match tool.execute(&call.id, arguments, cancel, on_update).await {
            Ok(result) => (result, false),
            Err(e) => (ToolResult::text(e.to_string()), true),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
