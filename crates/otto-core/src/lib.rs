// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod agent;
mod compact;
mod cutpoint;
mod events;
mod message;
mod session;
mod summarize;
#[cfg(test)]
mod tests;
mod turn;

pub use agent::{
    Agent, AgentHooks, ApiKeyFn, MessageSourceFn, TransformContextFn, SKIPPED_TOOL_TEXT,
};
pub use compact::{
    compact, context_tokens, evaluate_trigger, prepare_compaction, BeforeCompactOutcome,
    CompactionHooks, CompactionSettings, CompactionTrigger, Preparation, SPLIT_TURN_SEPARATOR,
};
pub use cutpoint::{
    entry_tokens, estimate_tokens, estimate_total, find_cut_point, is_valid_cut, CutPoint,
};
pub use events::AgentEvent;
pub use message::{default_convert_to_llm, AgentMessage, ConvertToLlm, CustomMessage};
pub use session::{
    entry_message, CompactionDetails, CompactionEntry, EntryKind, Session, SessionEntry,
};
pub use summarize::{
    serialize_for_summary, summarize_branch, summarize_history, summarize_turn_prefix,
};
