// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use chrono::Utc;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use otto_config::Config;
use otto_model::{
    EventStream, Message, ModelRef, ModelStream, StopReason, ToolCall, ToolResultMessage,
};
use otto_tools::{ToolRegistry, ToolResult, ToolUpdateFn};

use crate::compact::{
    compact, evaluate_trigger, prepare_compaction, CompactionHooks, CompactionSettings,
    CompactionTrigger,
};
use crate::events::AgentEvent;
use crate::message::{default_convert_to_llm, AgentMessage, ConvertToLlm};
use crate::session::Session;

/// Synthetic result text for tool calls skipped because the user queued a
/// steering message.
pub const SKIPPED_TOOL_TEXT: &str = "Skipped due to queued user message.";

/// Pause before re-entering the loop after an overflow-triggered compaction,
/// to avoid tight re-entry when the provider keeps rejecting.
const OVERFLOW_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Async source of injected messages (steering or follow-up).
pub type MessageSourceFn = Arc<dyn Fn() -> BoxFuture<'static, Vec<AgentMessage>> + Send + Sync>;

/// Rewrites the working context before each model call (UI-level view stays
/// untouched).
pub type TransformContextFn =
    Arc<dyn Fn(Vec<AgentMessage>, CancellationToken) -> BoxFuture<'static, Vec<AgentMessage>> + Send + Sync>;

/// Resolves the API key for a provider.  An `Err` is an auth failure and
/// escapes to the caller uncaught.
pub type ApiKeyFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Option<String>>> + Send + Sync>;

/// Caller-supplied extension points for one agent.
#[derive(Clone)]
pub struct AgentHooks {
    pub convert_to_llm: ConvertToLlm,
    pub transform_context: Option<TransformContextFn>,
    pub get_api_key: Option<ApiKeyFn>,
    /// Polled after every tool result and at turn boundaries; non-empty
    /// batches preempt remaining tool calls.
    pub get_steering_messages: Option<MessageSourceFn>,
    /// Polled only when the agent would otherwise stop.
    pub get_follow_up_messages: Option<MessageSourceFn>,
}

impl Default for AgentHooks {
    fn default() -> Self {
        Self {
            convert_to_llm: default_convert_to_llm(),
            transform_context: None,
            get_api_key: None,
            get_steering_messages: None,
            get_follow_up_messages: None,
        }
    }
}

/// How one pass of the scheduling loop ended.
enum LoopExit {
    /// No tool calls and nothing pending.
    Finished,
    /// Cancellation observed (clean termination).
    Aborted,
    /// The assistant stream ended with `stop_reason = error`.
    Errored,
}

/// The core agent: owns the working context and its session log, drives the
/// model ↔ tool loop, and applies the compaction policy at run boundaries.
pub struct Agent {
    pub(crate) session: Session,
    pub(crate) messages: Vec<AgentMessage>,
    pub(crate) system_prompt: String,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) model: ModelRef,
    pub(crate) stream: Arc<dyn ModelStream>,
    pub(crate) config: Arc<Config>,
    pub(crate) hooks: AgentHooks,
    pub(crate) compaction_hooks: CompactionHooks,
    pub(crate) cancel: CancellationToken,
}

impl Agent {
    pub fn new(
        stream: Arc<dyn ModelStream>,
        tools: Arc<ToolRegistry>,
        config: Arc<Config>,
        hooks: AgentHooks,
    ) -> Self {
        let model = ModelRef::new(
            config.model.provider.clone(),
            config.model.api.clone(),
            config.model.name.clone(),
        );
        let system_prompt = config.agent.system_prompt.clone().unwrap_or_default();
        Self {
            session: Session::new(),
            messages: Vec::new(),
            system_prompt,
            tools,
            model,
            stream,
            config,
            hooks,
            compaction_hooks: CompactionHooks::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_compaction_hooks(mut self, hooks: CompactionHooks) -> Self {
        self.compaction_hooks = hooks;
        self
    }

    /// Token that aborts the current (and any future) run when cancelled.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn messages(&self) -> &[AgentMessage] {
        &self.messages
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Pre-load conversation history without running; each message is
    /// mirrored into the session log.
    pub fn append_history(&mut self, messages: impl IntoIterator<Item = AgentMessage>) {
        for message in messages {
            self.push_message(message);
        }
    }

    pub(crate) fn push_message(&mut self, message: AgentMessage) {
        self.session.push_message(message.clone());
        self.messages.push(message);
    }

    /// Append `prompts` to the context and run the agent until it stops.
    /// Events stream through `events`; the same message list is both the
    /// stream's final value and the return value.
    pub async fn run(
        &mut self,
        prompts: Vec<AgentMessage>,
        events: &EventStream<AgentEvent>,
    ) -> anyhow::Result<Vec<AgentMessage>> {
        events.push(AgentEvent::AgentStart);
        events.push(AgentEvent::TurnStart);
        let mut new_messages = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            self.push_message(prompt.clone());
            events.push(AgentEvent::MessageStart {
                message: prompt.clone(),
            });
            events.push(AgentEvent::MessageEnd {
                message: prompt.clone(),
            });
            new_messages.push(prompt);
        }
        self.drive(new_messages, events).await
    }

    /// Re-enter the loop with no new prompt.  The last context message must
    /// convert to a user or tool-result message — continuing after an
    /// assistant message is a contract violation and returns `Err`.
    pub async fn continue_run(
        &mut self,
        events: &EventStream<AgentEvent>,
    ) -> anyhow::Result<Vec<AgentMessage>> {
        let Some(last) = self.messages.last() else {
            bail!("cannot continue: no messages in context");
        };
        let continuable = matches!(
            (self.hooks.convert_to_llm)(last),
            Some(Message::User(_)) | Some(Message::ToolResult(_))
        );
        if !continuable {
            bail!("cannot continue from message role: {}", last.role());
        }
        events.push(AgentEvent::AgentStart);
        events.push(AgentEvent::TurnStart);
        self.drive(Vec::new(), events).await
    }

    /// Outer driver: scheduling loop, follow-up polling, and the compaction
    /// trigger policy at the run boundary.
    async fn drive(
        &mut self,
        mut new_messages: Vec<AgentMessage>,
        events: &EventStream<AgentEvent>,
    ) -> anyhow::Result<Vec<AgentMessage>> {
        let mut first_turn = true;
        let mut pending = match &self.hooks.get_steering_messages {
            Some(get) => get().await,
            None => Vec::new(),
        };
        let settings = CompactionSettings::from_config(&self.config);

        loop {
            let exit = self
                .scheduling_loop(&mut new_messages, &mut pending, &mut first_turn, events)
                .await?;
            match exit {
                LoopExit::Finished => {
                    // Follow-ups have lower priority than steering: they are
                    // consulted only when the agent would otherwise stop.
                    if let Some(get) = &self.hooks.get_follow_up_messages {
                        let follow_up = get().await;
                        if !follow_up.is_empty() {
                            pending = follow_up;
                            continue;
                        }
                    }
                    let trigger = evaluate_trigger(&self.messages, &self.model, &settings, |e| {
                        self.stream.is_context_overflow(e, &self.model)
                    });
                    if trigger == Some(CompactionTrigger::Threshold) {
                        if let Err(e) = self.run_compaction(&settings).await {
                            warn!("threshold compaction failed; session left unchanged: {e:#}");
                        }
                    }
                    break;
                }
                LoopExit::Aborted => break,
                LoopExit::Errored => {
                    let trigger = evaluate_trigger(&self.messages, &self.model, &settings, |e| {
                        self.stream.is_context_overflow(e, &self.model)
                    });
                    if trigger != Some(CompactionTrigger::Overflow) {
                        break;
                    }
                    // Same-model context overflow: retract the failing turn,
                    // compact, and continue automatically.
                    self.retract_failed_assistant(&mut new_messages);
                    match self.run_compaction(&settings).await {
                        Ok(true) => {
                            tokio::time::sleep(OVERFLOW_RETRY_DELAY).await;
                            continue;
                        }
                        Ok(false) => {
                            warn!("context overflow but nothing left to compact");
                            break;
                        }
                        Err(e) => {
                            warn!("compaction after overflow failed: {e:#}");
                            break;
                        }
                    }
                }
            }
        }

        events.push(AgentEvent::AgentEnd {
            messages: new_messages.clone(),
        });
        Ok(new_messages)
    }

    /// The two-level scheduling core: stream one assistant response, execute
    /// its tool calls (with steering preemption), repeat while there is
    /// anything left to do.
    async fn scheduling_loop(
        &mut self,
        new_messages: &mut Vec<AgentMessage>,
        pending: &mut Vec<AgentMessage>,
        first_turn: &mut bool,
        events: &EventStream<AgentEvent>,
    ) -> anyhow::Result<LoopExit> {
        // Cancellation is polled, not preempted: the provider stream (and any
        // running tool) observes the token and yields a terminal `aborted`
        // error, which exits through the normal turn bookkeeping.
        loop {
            if *first_turn {
                *first_turn = false;
            } else {
                events.push(AgentEvent::TurnStart);
            }

            for message in pending.drain(..) {
                events.push(AgentEvent::MessageStart {
                    message: message.clone(),
                });
                events.push(AgentEvent::MessageEnd {
                    message: message.clone(),
                });
                self.push_message(message.clone());
                new_messages.push(message);
            }

            let assistant = self.stream_assistant_response(events).await?;
            new_messages.push(AgentMessage::Assistant(assistant.clone()));
            self.session
                .push_message(AgentMessage::Assistant(assistant.clone()));

            if assistant.stop_reason.is_terminal_failure() {
                events.push(AgentEvent::TurnEnd {
                    message: assistant.clone(),
                    tool_results: Vec::new(),
                });
                return Ok(if assistant.stop_reason == StopReason::Aborted {
                    LoopExit::Aborted
                } else {
                    LoopExit::Errored
                });
            }

            let tool_calls: Vec<ToolCall> =
                assistant.tool_calls().into_iter().cloned().collect();
            let had_tool_calls = !tool_calls.is_empty();
            let mut tool_results = Vec::new();
            let mut steering: Option<Vec<AgentMessage>> = None;

            for (index, call) in tool_calls.iter().enumerate() {
                events.push(AgentEvent::ToolExecutionStart {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
                let update: ToolUpdateFn = {
                    let events = events.clone();
                    let call = call.clone();
                    Arc::new(move |partial: ToolResult| {
                        events.push(AgentEvent::ToolExecutionUpdate {
                            tool_call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            arguments: call.arguments.clone(),
                            partial,
                        });
                    })
                };
                let (result, is_error) = self
                    .tools
                    .execute_call(call, self.cancel.clone(), Some(update))
                    .await;
                events.push(AgentEvent::ToolExecutionEnd {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result: result.clone(),
                    is_error,
                });
                let tool_result = ToolResultMessage {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    content: result.content,
                    is_error,
                    details: result.details,
                    timestamp: Utc::now(),
                };
                self.record_tool_result(tool_result, new_messages, &mut tool_results, events);

                // A queued user message preempts the remaining tool calls of
                // this turn.
                if let Some(get) = &self.hooks.get_steering_messages {
                    let messages = get().await;
                    if !messages.is_empty() {
                        for skipped in &tool_calls[index + 1..] {
                            self.skip_tool_call(skipped, new_messages, &mut tool_results, events);
                        }
                        steering = Some(messages);
                        break;
                    }
                }
            }

            events.push(AgentEvent::TurnEnd {
                message: assistant,
                tool_results,
            });

            *pending = match steering {
                Some(messages) => messages,
                None => match &self.hooks.get_steering_messages {
                    Some(get) => get().await,
                    None => Vec::new(),
                },
            };

            if !had_tool_calls && pending.is_empty() {
                return Ok(LoopExit::Finished);
            }
        }
    }

    fn record_tool_result(
        &mut self,
        tool_result: ToolResultMessage,
        new_messages: &mut Vec<AgentMessage>,
        tool_results: &mut Vec<ToolResultMessage>,
        events: &EventStream<AgentEvent>,
    ) {
        let message = AgentMessage::from(tool_result.clone());
        self.push_message(message.clone());
        new_messages.push(message.clone());
        tool_results.push(tool_result);
        events.push(AgentEvent::MessageStart {
            message: message.clone(),
        });
        events.push(AgentEvent::MessageEnd { message });
    }

    fn skip_tool_call(
        &mut self,
        call: &ToolCall,
        new_messages: &mut Vec<AgentMessage>,
        tool_results: &mut Vec<ToolResultMessage>,
        events: &EventStream<AgentEvent>,
    ) {
        events.push(AgentEvent::ToolExecutionStart {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
        let result = ToolResult::text(SKIPPED_TOOL_TEXT);
        events.push(AgentEvent::ToolExecutionEnd {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            is_error: true,
        });
        let tool_result =
            ToolResultMessage::error(call.id.clone(), call.name.clone(), SKIPPED_TOOL_TEXT);
        self.record_tool_result(tool_result, new_messages, tool_results, events);
    }

    /// Drop the trailing errored assistant from context, session and the
    /// run's message list (overflow recovery).
    fn retract_failed_assistant(&mut self, new_messages: &mut Vec<AgentMessage>) {
        let failing = |m: &AgentMessage| {
            m.as_assistant()
                .is_some_and(|a| a.stop_reason == StopReason::Error)
        };
        if self.messages.last().is_some_and(failing) {
            self.messages.pop();
            self.session.pop_last_message();
        }
        if new_messages.last().is_some_and(failing) {
            new_messages.pop();
        }
    }

    /// Prepare and execute one compaction; `Ok(true)` when the session
    /// gained a compaction entry and the working context was reloaded.
    async fn run_compaction(&mut self, settings: &CompactionSettings) -> anyhow::Result<bool> {
        let Some(prep) = prepare_compaction(&self.session, settings) else {
            return Ok(false);
        };
        let reloaded = compact(
            &mut self.session,
            &prep,
            self.stream.as_ref(),
            &self.model,
            settings,
            &self.compaction_hooks,
            self.config.model.api_key.clone(),
        )
        .await?;
        match reloaded {
            Some(messages) => {
                self.messages = messages;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
