// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::event::AssistantMessageEvent;
use crate::event_stream::EventStream;
use crate::types::{Context, ModelRef, ReasoningEffort};

/// Per-request options forwarded to a stream function.
#[derive(Clone, Default)]
pub struct StreamOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning: ReasoningEffort,
    /// Cancellation token for this request.  Polled by adapters; on
    /// cancellation the stream must yield a terminal `error` event with
    /// reason `aborted`.
    pub signal: CancellationToken,
    pub api_key: Option<String>,
    /// Provider prompt-cache retention hint (e.g. "5m" / "1h").
    pub cache_retention: Option<String>,
    /// Extra headers forwarded verbatim to the provider.
    pub headers: Vec<(String, String)>,
    /// Debug hook invoked with the raw request payload before it is sent.
    pub on_payload: Option<Arc<dyn Fn(&serde_json::Value) + Send + Sync>>,
    /// Upper bound for the adapter's retry backoff.
    pub max_retry_delay_ms: Option<u64>,
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("reasoning", &self.reasoning)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("cache_retention", &self.cache_retention)
            .field("headers", &self.headers)
            .field("on_payload", &self.on_payload.is_some())
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .finish()
    }
}

/// The model abstraction the runtime is built against: one call produces one
/// streaming assistant completion.
///
/// Implementations live in provider adapter crates; this crate ships only
/// the [`ScriptedStream`](crate::ScriptedStream) test double.  Failures are
/// in-band: an adapter that cannot reach its provider ends the stream with a
/// terminal `error` event rather than returning `Err`.
#[async_trait]
pub trait ModelStream: Send + Sync {
    async fn stream(
        &self,
        model: &ModelRef,
        context: &Context,
        options: &StreamOptions,
    ) -> EventStream<AssistantMessageEvent>;

    /// Classify an assistant error message as a context-window overflow.
    ///
    /// Provider-specific (HTTP status, error code, message substring); the
    /// conservative default never classifies, so automatic compaction-and-
    /// retry stays off unless the adapter opts in.
    fn is_context_overflow(&self, _error: &str, _model: &ModelRef) -> bool {
        false
    }
}
