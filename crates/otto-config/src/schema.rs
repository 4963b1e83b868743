// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should default to enabled need a named
/// function.
fn default_true() -> bool {
    true
}

fn default_reserve_tokens() -> u64 {
    16_384
}

fn default_keep_recent_tokens() -> u64 {
    20_000
}

fn default_provider() -> String {
    "openai".into()
}

fn default_api() -> String {
    "chat-completions".into()
}

fn default_model_name() -> String {
    "gpt-4o".into()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub compaction: CompactionConfig,
}

/// Identity and request parameters for the model the agent talks to.
///
/// The `(provider, api, name)` triple identifies a model for history
/// bookkeeping: assistant messages record which model produced them so that
/// replays to a *different* model can be cleaned up first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider identifier, e.g. "openai" | "anthropic" | "google" | "mock"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Wire API family spoken by the provider adapter,
    /// e.g. "chat-completions" | "messages" | "generate"
    #[serde(default = "default_api")]
    pub api: String,
    /// Model name forwarded to the provider API
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Environment variable that holds the API key (read at load time)
    pub api_key_env: Option<String>,
    /// Explicit API key; prefer api_key_env in config files to avoid secrets
    /// in version-controlled files
    pub api_key: Option<String>,
    /// Model-advertised context window (input + output tokens)
    pub context_window: Option<u64>,
    /// Maximum tokens to request in a single completion
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
    /// Reasoning effort requested from the model:
    /// "off" | "minimal" | "low" | "medium" | "high" | "xhigh".
    /// Adapters downgrade "xhigh" to "high" for models that do not
    /// advertise it.
    pub reasoning: Option<String>,
    /// Provider prompt-cache retention hint forwarded with every request
    /// (e.g. Anthropic's "5m" / "1h" ephemeral cache windows).
    pub cache_retention: Option<String>,
    /// Upper bound for the adapter's retry backoff, in milliseconds.
    pub max_retry_delay_ms: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            api: "chat-completions".into(),
            name: "gpt-4o".into(),
            api_key_env: None,
            api_key: None,
            context_window: None,
            max_tokens: None,
            temperature: None,
            reasoning: None,
            cache_retention: None,
            max_retry_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// System prompt for the agent context.  Empty when not set; prompt
    /// assembly is the embedder's concern.
    pub system_prompt: Option<String>,
}

/// Context compaction policy.
///
/// `reserve_tokens` is the headroom subtracted from the context window when
/// deciding whether to compact, and the baseline for the summary output
/// budget.  `keep_recent_tokens` is the minimum amount of trailing
/// conversation preserved verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: u64,
    #[serde(default = "default_keep_recent_tokens")]
    pub keep_recent_tokens: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reserve_tokens: default_reserve_tokens(),
            keep_recent_tokens: default_keep_recent_tokens(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_is_openai() {
        let cfg = Config::default();
        assert_eq!(cfg.model.provider, "openai");
        assert_eq!(cfg.model.api, "chat-completions");
    }

    #[test]
    fn compaction_defaults() {
        let c = CompactionConfig::default();
        assert!(c.enabled);
        assert_eq!(c.reserve_tokens, 16_384);
        assert_eq!(c.keep_recent_tokens, 20_000);
    }

    #[test]
    fn compaction_partial_yaml_fills_defaults() {
        let c: CompactionConfig = serde_yaml::from_str("reserve_tokens: 8000").unwrap();
        assert!(c.enabled, "enabled must default to true");
        assert_eq!(c.reserve_tokens, 8000);
        assert_eq!(c.keep_recent_tokens, 20_000);
    }

    #[test]
    fn model_config_round_trips() {
        let yaml = "provider: anthropic\napi: messages\nname: claude-opus-4-5\nreasoning: high";
        let m: ModelConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(m.provider, "anthropic");
        assert_eq!(m.reasoning.as_deref(), Some("high"));
        assert!(m.api_key.is_none());
    }
}
