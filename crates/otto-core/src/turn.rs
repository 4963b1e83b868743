// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::bail;

use otto_model::{
    AssistantMessage, AssistantMessageEvent, Context, EventStream, Message, ReasoningEffort,
    StreamOptions,
};

use crate::agent::Agent;
use crate::events::AgentEvent;
use crate::message::AgentMessage;

impl Agent {
    /// Stream one assistant response into the working context.
    ///
    /// The streaming partial is pushed as the most recent context entry on
    /// `start` and replaced on every subsequent event, so observers of the
    /// context always see the current snapshot; `message_update` events
    /// carry both the raw provider event and that snapshot.  Returns the
    /// finalized message (which may have `stop_reason` `error`/`aborted` —
    /// failures are in-band).  The only `Err` out of here is an auth failure
    /// from the `get_api_key` hook, which intentionally escapes.
    pub(crate) async fn stream_assistant_response(
        &mut self,
        events: &EventStream<AgentEvent>,
    ) -> anyhow::Result<AssistantMessage> {
        let working = match &self.hooks.transform_context {
            Some(transform) => transform(self.messages.clone(), self.cancel.clone()).await,
            None => self.messages.clone(),
        };

        let llm_messages: Vec<Message> = working
            .iter()
            .filter_map(|m| (self.hooks.convert_to_llm)(m))
            .collect();

        let api_key = match &self.hooks.get_api_key {
            Some(get) => get(self.model.provider.clone())
                .await?
                .or_else(|| self.config.model.api_key.clone()),
            None => self.config.model.api_key.clone(),
        };

        let context = Context {
            system_prompt: self.system_prompt.clone(),
            tools: self.tools.schemas(),
            messages: llm_messages,
        };
        let options = StreamOptions {
            temperature: self.config.model.temperature,
            max_tokens: self.config.model.max_tokens,
            reasoning: self
                .config
                .model
                .reasoning
                .as_deref()
                .and_then(ReasoningEffort::parse)
                .unwrap_or_default(),
            signal: self.cancel.clone(),
            api_key,
            cache_retention: self.config.model.cache_retention.clone(),
            headers: Vec::new(),
            on_payload: None,
            max_retry_delay_ms: self.config.model.max_retry_delay_ms,
        };

        let response = self.stream.stream(&self.model, &context, &options).await;

        let mut added_partial = false;
        while let Some(event) = response.next().await {
            match &event {
                AssistantMessageEvent::Start { partial } => {
                    self.messages.push(AgentMessage::Assistant(partial.clone()));
                    added_partial = true;
                    events.push(AgentEvent::MessageStart {
                        message: AgentMessage::Assistant(partial.clone()),
                    });
                }
                AssistantMessageEvent::Done { message, .. }
                | AssistantMessageEvent::Error { error: message, .. } => {
                    let final_message = message.clone();
                    let as_agent = AgentMessage::Assistant(final_message.clone());
                    if added_partial {
                        *self.messages.last_mut().expect("partial present") = as_agent.clone();
                    } else {
                        // Degenerate stream without a `start`; still record
                        // the message and bracket it properly.
                        self.messages.push(as_agent.clone());
                        events.push(AgentEvent::MessageStart {
                            message: as_agent.clone(),
                        });
                    }
                    events.push(AgentEvent::MessageEnd { message: as_agent });
                    return Ok(final_message);
                }
                _ => {
                    let as_agent = AgentMessage::Assistant(event.snapshot().clone());
                    if added_partial {
                        *self.messages.last_mut().expect("partial present") = as_agent.clone();
                    } else {
                        self.messages.push(as_agent.clone());
                        added_partial = true;
                    }
                    events.push(AgentEvent::MessageUpdate {
                        message: as_agent,
                        event: event.clone(),
                    });
                }
            }
        }

        bail!("model stream ended without a terminal event")
    }
}
