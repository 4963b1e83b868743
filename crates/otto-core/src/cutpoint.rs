// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Cut-point selection for compaction.
//!
//! The retained tail must begin at an entry that does not leave a tool
//! result dangling, keep at least `keep_recent_tokens` of trailing
//! conversation, absorb the metadata entries that annotate it, and report
//! whether the cut falls inside a turn (which then needs a separate
//! turn-prefix summary).

use otto_model::{AssistantContent, UserContent};

use crate::message::{AgentMessage, CustomMessage};
use crate::session::{EntryKind, SessionEntry};

/// Fixed token charge per embedded image.
const IMAGE_TOKENS: u64 = 1_200;

/// Result of cut-point selection over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutPoint {
    /// First entry of the retained tail.
    pub first_kept_idx: usize,
    /// Start of the turn the cut falls into; equals `first_kept_idx` when
    /// the cut lands on a turn boundary.
    pub turn_start_idx: usize,
    pub is_split_turn: bool,
}

/// Token estimate for one message: chars/4 over the textual fields plus a
/// fixed charge per image.  Intentionally conservative (over-estimates) so
/// compaction triggers early; used only for cut-point selection and the
/// trigger threshold — never replace it with exact tokenization.
pub fn estimate_tokens(message: &AgentMessage) -> u64 {
    let mut chars = 0usize;
    let mut images = 0u64;
    match message {
        AgentMessage::User(m) => tally_user_content(&m.content, &mut chars, &mut images),
        AgentMessage::ToolResult(m) => tally_user_content(&m.content, &mut chars, &mut images),
        AgentMessage::Assistant(m) => {
            for block in &m.content {
                match block {
                    AssistantContent::Text { text, .. } => chars += text.len(),
                    AssistantContent::Thinking { thinking, .. } => chars += thinking.len(),
                    AssistantContent::ToolCall(tc) => {
                        chars += tc.name.len() + tc.arguments.to_string().len();
                    }
                }
            }
        }
        AgentMessage::Custom(m) => chars += m.content.len(),
    }
    (chars as u64).div_ceil(4) + images * IMAGE_TOKENS
}

fn tally_user_content(content: &[UserContent], chars: &mut usize, images: &mut u64) {
    for part in content {
        match part {
            UserContent::Text { text } => *chars += text.len(),
            UserContent::Image { .. } => *images += 1,
        }
    }
}

pub fn estimate_total(messages: &[AgentMessage]) -> u64 {
    messages.iter().map(estimate_tokens).sum()
}

/// Token weight of a session entry; metadata entries weigh zero.
pub fn entry_tokens(entry: &SessionEntry) -> u64 {
    match &entry.kind {
        EntryKind::Message { message } => estimate_tokens(message),
        EntryKind::CustomMessage { message } => (message.content.len() as u64).div_ceil(4),
        EntryKind::BranchSummary { summary } => (summary.len() as u64).div_ceil(4),
        EntryKind::Compaction(_)
        | EntryKind::ThinkingLevelChange { .. }
        | EntryKind::ModelChange { .. }
        | EntryKind::Label { .. } => 0,
    }
}

/// Whether the retained tail may legally begin at this entry.  Never at a
/// tool result: its call would be summarized away, leaving a dangling
/// reference the target API rejects.
pub fn is_valid_cut(entry: &SessionEntry) -> bool {
    match &entry.kind {
        EntryKind::Message { message } => !matches!(message, AgentMessage::ToolResult(_)),
        EntryKind::BranchSummary { .. } | EntryKind::CustomMessage { .. } => true,
        EntryKind::Compaction(_)
        | EntryKind::ThinkingLevelChange { .. }
        | EntryKind::ModelChange { .. }
        | EntryKind::Label { .. } => false,
    }
}

/// Find the cut point for `entries[start..end)` honoring
/// `keep_recent_tokens`.
pub fn find_cut_point(
    entries: &[SessionEntry],
    start: usize,
    end: usize,
    keep_recent_tokens: u64,
) -> CutPoint {
    let end = end.min(entries.len());
    let no_cut = CutPoint {
        first_kept_idx: start,
        turn_start_idx: start,
        is_split_turn: false,
    };
    if start >= end {
        return no_cut;
    }

    let valid: Vec<usize> = (start..end).filter(|&i| is_valid_cut(&entries[i])).collect();
    if valid.is_empty() {
        return no_cut;
    }

    // Walk backward accumulating message tokens until the keep-recent budget
    // is covered, then take the closest valid cut at or after that point.
    let mut accumulated = 0u64;
    let mut threshold_idx = None;
    for i in (start..end).rev() {
        accumulated += entry_tokens(&entries[i]);
        if accumulated >= keep_recent_tokens {
            threshold_idx = Some(i);
            break;
        }
    }

    let mut first_kept = match threshold_idx {
        Some(i) => match valid.iter().find(|&&v| v >= i) {
            Some(&v) => v,
            // No valid cut at or after the threshold: keep nothing extra,
            // cut at the boundary start.
            None => return no_cut,
        },
        // Everything fits in the keep-recent budget.
        None => valid[0],
    };

    // Metadata entries annotate the entry they precede; pull them into the
    // tail, stopping at a compaction boundary or any message entry.
    while first_kept > start && entries[first_kept - 1].kind.is_metadata() {
        first_kept -= 1;
    }

    // A cut on a user message is a turn boundary.  Anything else splits the
    // turn that contains it: find the turn's opening user (or bash
    // execution) within the boundary.  Absorbed metadata does not decide
    // this — anchor on the first message entry of the tail.
    let anchor = (first_kept..end)
        .find(|&i| !entries[i].kind.is_metadata())
        .unwrap_or(first_kept);
    if is_user_or_bash(&entries[anchor]) {
        return CutPoint {
            first_kept_idx: first_kept,
            turn_start_idx: first_kept,
            is_split_turn: false,
        };
    }
    for i in (start..first_kept).rev() {
        if is_user_or_bash(&entries[i]) {
            return CutPoint {
                first_kept_idx: first_kept,
                turn_start_idx: i,
                is_split_turn: true,
            };
        }
    }
    CutPoint {
        first_kept_idx: first_kept,
        turn_start_idx: first_kept,
        is_split_turn: false,
    }
}

fn is_user_or_bash(entry: &SessionEntry) -> bool {
    match &entry.kind {
        EntryKind::Message {
            message: AgentMessage::User(_),
        } => true,
        EntryKind::Message {
            message: AgentMessage::Custom(c),
        } => c.kind == CustomMessage::BASH_EXECUTION,
        _ => false,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
