// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Compaction orchestration: trigger policy, pure preparation over the
//! session log, and execution (summaries → compaction entry → reload).

use std::sync::Arc;

use tracing::debug;

use otto_model::{AssistantContent, ModelRef, ModelStream};

use crate::cutpoint::{entry_tokens, estimate_tokens, find_cut_point};
use crate::message::AgentMessage;
use crate::session::{CompactionDetails, CompactionEntry, EntryKind, Session};
use crate::summarize::{summarize_history, summarize_turn_prefix};

/// Joins the history summary and the turn-prefix summary of a split turn,
/// history first.
pub const SPLIT_TURN_SEPARATOR: &str = "\n\n---\n\n**Turn Context (split turn):**\n\n";

#[derive(Debug, Clone)]
pub struct CompactionSettings {
    pub enabled: bool,
    /// Model-advertised context window; 0 disables the threshold trigger.
    pub context_window: u64,
    pub reserve_tokens: u64,
    pub keep_recent_tokens: u64,
}

impl CompactionSettings {
    pub fn from_config(config: &otto_config::Config) -> Self {
        Self {
            enabled: config.compaction.enabled,
            context_window: config.model.context_window.unwrap_or(0),
            reserve_tokens: config.compaction.reserve_tokens,
            keep_recent_tokens: config.compaction.keep_recent_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionTrigger {
    /// The model rejected the request as too large; compact and retry.
    Overflow,
    /// The context crossed `context_window - reserve_tokens`; compact, no
    /// retry.
    Threshold,
}

/// Evaluate the trigger policy at a run boundary.
///
/// Aborted runs never compact.  Errors compact only when the adapter
/// classifies them as a context overflow *and* the failing assistant came
/// from the current model (a stale cross-model overflow proves nothing
/// about this model's window).  Otherwise the token threshold decides.
pub fn evaluate_trigger(
    messages: &[AgentMessage],
    model: &ModelRef,
    settings: &CompactionSettings,
    classify_overflow: impl Fn(&str) -> bool,
) -> Option<CompactionTrigger> {
    if !settings.enabled {
        return None;
    }
    let last = messages.iter().rev().find_map(AgentMessage::as_assistant)?;
    match last.stop_reason {
        otto_model::StopReason::Aborted => None,
        otto_model::StopReason::Error => {
            let error = last.error_message.as_deref().unwrap_or("");
            if classify_overflow(error) && last.model == *model {
                Some(CompactionTrigger::Overflow)
            } else {
                None
            }
        }
        _ => {
            if settings.context_window == 0 {
                return None;
            }
            let tokens = context_tokens(messages);
            if tokens > settings.context_window.saturating_sub(settings.reserve_tokens) {
                Some(CompactionTrigger::Threshold)
            } else {
                None
            }
        }
    }
}

/// Current context size: the last good assistant's reported usage plus the
/// heuristic estimate of everything appended after it ("trailing tokens").
pub fn context_tokens(messages: &[AgentMessage]) -> u64 {
    let last_good = messages.iter().enumerate().rev().find_map(|(i, m)| {
        m.as_assistant()
            .filter(|a| !a.stop_reason.is_terminal_failure())
            .map(|a| (i, a.usage.total()))
    });
    match last_good {
        Some((i, usage)) => {
            usage
                + messages[i + 1..]
                    .iter()
                    .map(estimate_tokens)
                    .sum::<u64>()
        }
        None => messages.iter().map(estimate_tokens).sum(),
    }
}

/// Everything `compact` needs, computed without side effects.
#[derive(Debug, Clone)]
pub struct Preparation {
    pub boundary_start: usize,
    pub boundary_end: usize,
    pub first_kept_idx: usize,
    pub first_kept_entry_id: String,
    pub is_split_turn: bool,
    pub messages_to_summarize: Vec<AgentMessage>,
    pub turn_prefix_messages: Vec<AgentMessage>,
    pub previous_summary: Option<String>,
    pub read_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub tokens_before: u64,
}

/// Prepare a compaction over the session's current linear path.  Returns
/// `None` when there is nothing to summarize.
pub fn prepare_compaction(session: &Session, settings: &CompactionSettings) -> Option<Preparation> {
    let entries = session.entries();
    let boundary_end = entries.len();
    let (boundary_start, previous) = match session.last_compaction() {
        Some((idx, c)) => (idx + 1, Some(c.clone())),
        None => (0, None),
    };
    if boundary_start >= boundary_end {
        return None;
    }

    let cut = find_cut_point(
        entries,
        boundary_start,
        boundary_end,
        settings.keep_recent_tokens,
    );
    let history_end = if cut.is_split_turn {
        cut.turn_start_idx
    } else {
        cut.first_kept_idx
    };

    let messages_to_summarize = messages_in(entries, boundary_start, history_end);
    let turn_prefix_messages = if cut.is_split_turn {
        messages_in(entries, cut.turn_start_idx, cut.first_kept_idx)
    } else {
        Vec::new()
    };
    if messages_to_summarize.is_empty() && turn_prefix_messages.is_empty() {
        return None;
    }

    // File operations come from everything summarized (both ranges), unioned
    // with what the previous compaction already recorded.
    let mut read_files = previous
        .as_ref()
        .map(|c| c.details.read_files.clone())
        .unwrap_or_default();
    let mut modified_files = previous
        .as_ref()
        .map(|c| c.details.modified_files.clone())
        .unwrap_or_default();
    extract_file_operations(&messages_to_summarize, &mut read_files, &mut modified_files);
    extract_file_operations(&turn_prefix_messages, &mut read_files, &mut modified_files);

    let tokens_before: u64 = entries[boundary_start..boundary_end]
        .iter()
        .map(entry_tokens)
        .sum();

    Some(Preparation {
        boundary_start,
        boundary_end,
        first_kept_idx: cut.first_kept_idx,
        first_kept_entry_id: entries[cut.first_kept_idx].id.clone(),
        is_split_turn: cut.is_split_turn,
        messages_to_summarize,
        turn_prefix_messages,
        previous_summary: previous.map(|c| c.summary),
        read_files,
        modified_files,
        tokens_before,
    })
}

fn messages_in(
    entries: &[crate::session::SessionEntry],
    start: usize,
    end: usize,
) -> Vec<AgentMessage> {
    entries[start.min(entries.len())..end.min(entries.len())]
        .iter()
        .filter_map(crate::session::entry_message)
        .collect()
}

// ─── File-operation tracking ──────────────────────────────────────────────────

/// Tools whose calls read files.
const READ_TOOLS: &[&str] = &["read", "read_file", "grep", "glob", "list", "list_dir"];
/// Tools whose calls modify files.
const WRITE_TOOLS: &[&str] = &["write", "write_file", "edit", "edit_file", "apply_patch"];

fn extract_file_operations(
    messages: &[AgentMessage],
    read_files: &mut Vec<String>,
    modified_files: &mut Vec<String>,
) {
    for message in messages {
        let Some(assistant) = message.as_assistant() else {
            continue;
        };
        for block in &assistant.content {
            let AssistantContent::ToolCall(tc) = block else {
                continue;
            };
            let name = tc.name.as_str();
            let target = if READ_TOOLS.contains(&name) {
                &mut *read_files
            } else if WRITE_TOOLS.contains(&name) {
                &mut *modified_files
            } else {
                continue;
            };
            for key in ["path", "file_path"] {
                if let Some(path) = tc.arguments.get(key).and_then(|v| v.as_str()) {
                    if !target.contains(&path.to_string()) {
                        target.push(path.to_string());
                    }
                }
            }
        }
    }
}

fn format_file_operations(read_files: &[String], modified_files: &[String]) -> String {
    if read_files.is_empty() && modified_files.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n**File Operations:**\n");
    if !read_files.is_empty() {
        out.push_str("- Read: ");
        out.push_str(&read_files.join(", "));
        out.push('\n');
    }
    if !modified_files.is_empty() {
        out.push_str("- Modified: ");
        out.push_str(&modified_files.join(", "));
        out.push('\n');
    }
    out
}

// ─── Hooks ────────────────────────────────────────────────────────────────────

/// Verdict of the before-compaction hook.
pub enum BeforeCompactOutcome {
    Proceed,
    Cancel,
    /// Skip the model calls and write this summary instead.
    Replace {
        summary: String,
        details: Option<CompactionDetails>,
    },
}

/// Extension points around a compaction write.  The before hook may cancel
/// or substitute the summary; the after hook observes the written entry.
#[derive(Clone, Default)]
pub struct CompactionHooks {
    pub before: Option<Arc<dyn Fn(&Preparation) -> BeforeCompactOutcome + Send + Sync>>,
    pub after: Option<Arc<dyn Fn(&CompactionEntry) + Send + Sync>>,
}

// ─── Execution ────────────────────────────────────────────────────────────────

/// Run a prepared compaction: generate the summaries (concurrently when the
/// turn is split), write the `compaction` entry, and return the reloaded
/// working messages.  `Ok(None)` means the before hook canceled.  On error
/// the session is left unchanged.
pub async fn compact(
    session: &mut Session,
    prep: &Preparation,
    stream: &dyn ModelStream,
    model: &ModelRef,
    settings: &CompactionSettings,
    hooks: &CompactionHooks,
    api_key: Option<String>,
) -> anyhow::Result<Option<Vec<AgentMessage>>> {
    let mut read_files = prep.read_files.clone();
    let mut modified_files = prep.modified_files.clone();

    let summary = match hooks.before.as_ref().map(|f| f(prep)) {
        Some(BeforeCompactOutcome::Cancel) => {
            debug!("compaction canceled by before hook");
            return Ok(None);
        }
        Some(BeforeCompactOutcome::Replace { summary, details }) => {
            if let Some(details) = details {
                read_files = details.read_files;
                modified_files = details.modified_files;
            }
            summary
        }
        Some(BeforeCompactOutcome::Proceed) | None => {
            let base = if prep.is_split_turn {
                // History first, then turn prefix; the two calls run in
                // parallel.
                let (history, prefix) = tokio::join!(
                    summarize_history(
                        stream,
                        model,
                        &prep.messages_to_summarize,
                        prep.previous_summary.as_deref(),
                        settings.reserve_tokens,
                        api_key.clone(),
                    ),
                    summarize_turn_prefix(
                        stream,
                        model,
                        &prep.turn_prefix_messages,
                        settings.reserve_tokens,
                        api_key.clone(),
                    ),
                );
                format!("{}{}{}", history?, SPLIT_TURN_SEPARATOR, prefix?)
            } else {
                summarize_history(
                    stream,
                    model,
                    &prep.messages_to_summarize,
                    prep.previous_summary.as_deref(),
                    settings.reserve_tokens,
                    api_key,
                )
                .await?
            };
            format!(
                "{base}{}",
                format_file_operations(&read_files, &modified_files)
            )
        }
    };

    let entry = CompactionEntry {
        summary,
        first_kept_entry_id: prep.first_kept_entry_id.clone(),
        tokens_before: prep.tokens_before,
        details: CompactionDetails {
            read_files,
            modified_files,
        },
    };
    session.push(EntryKind::Compaction(entry.clone()));
    if let Some(after) = &hooks.after {
        after(&entry);
    }
    debug!(
        tokens_before = prep.tokens_before,
        first_kept = %prep.first_kept_entry_id,
        split = prep.is_split_turn,
        "wrote compaction entry"
    );
    Ok(Some(session.reload_messages()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
