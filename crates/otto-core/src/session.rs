// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use otto_model::ModelRef;

use crate::message::{AgentMessage, CustomMessage};

/// File paths touched by the summarized portion of a session, recorded on
/// the compaction entry so later compactions can union them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionDetails {
    pub read_files: Vec<String>,
    pub modified_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionEntry {
    pub summary: String,
    /// Id of the first session entry retained verbatim after this compaction.
    pub first_kept_entry_id: String,
    pub tokens_before: u64,
    pub details: CompactionDetails,
}

/// Payload of one session log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    Message { message: AgentMessage },
    CustomMessage { message: CustomMessage },
    BranchSummary { summary: String },
    Compaction(CompactionEntry),
    ThinkingLevelChange { level: String },
    ModelChange { model: ModelRef },
    Label { label: String },
}

impl EntryKind {
    /// Metadata entries carry no conversation content; they weigh zero for
    /// token accounting and belong to the tail they precede when a cut is
    /// expanded leftward.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Self::ThinkingLevelChange { .. } | Self::ModelChange { .. } | Self::Label { .. }
        )
    }
}

/// One record in the session log.  Ids are stable; `parent` links entries
/// into a tree (a linear chain in this crate — branching is the embedder's
/// concern).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// The persistent-shaped log of one conversation.  The agent mirrors every
/// working-context message into it; compaction reads and extends it.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    entries: Vec<SessionEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry, assigning a fresh id chained to the previous entry.
    /// Returns the new entry's id.
    pub fn push(&mut self, kind: EntryKind) -> String {
        let id = Uuid::new_v4().to_string();
        let parent = self.entries.last().map(|e| e.id.clone());
        self.entries.push(SessionEntry {
            id: id.clone(),
            parent,
            kind,
        });
        id
    }

    pub fn push_message(&mut self, message: AgentMessage) -> String {
        self.push(EntryKind::Message { message })
    }

    /// Remove the most recent entry when it is a message entry (used to
    /// retract an assistant turn that failed with a context overflow).
    pub fn pop_last_message(&mut self) -> Option<AgentMessage> {
        match self.entries.last() {
            Some(SessionEntry {
                kind: EntryKind::Message { .. },
                ..
            }) => match self.entries.pop() {
                Some(SessionEntry {
                    kind: EntryKind::Message { message },
                    ..
                }) => Some(message),
                _ => None,
            },
            _ => None,
        }
    }

    /// The most recent compaction entry, with its index.
    pub fn last_compaction(&self) -> Option<(usize, &CompactionEntry)> {
        self.entries.iter().enumerate().rev().find_map(|(i, e)| {
            match &e.kind {
                EntryKind::Compaction(c) => Some((i, c)),
                _ => None,
            }
        })
    }

    /// Index of the entry with the given id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Rebuild the working message list from the log.
    ///
    /// Without a compaction entry this is simply every message-bearing entry
    /// in order.  With one, the list starts with the compaction summary
    /// (as a `compaction_summary` custom message), followed by the retained
    /// tail from `first_kept_entry_id` onwards — skipping the compaction
    /// entry itself — plus anything appended after it.
    pub fn reload_messages(&self) -> Vec<AgentMessage> {
        let (start, summary) = match self.last_compaction() {
            Some((idx, c)) => {
                let first_kept = self.index_of(&c.first_kept_entry_id).unwrap_or(idx + 1);
                (first_kept, Some(c.summary.clone()))
            }
            None => (0, None),
        };

        let mut messages = Vec::new();
        if let Some(summary) = summary {
            messages.push(AgentMessage::Custom(CustomMessage::new(
                CustomMessage::COMPACTION_SUMMARY,
                summary,
            )));
        }
        for entry in &self.entries[start..] {
            if let Some(m) = entry_message(entry) {
                messages.push(m);
            }
        }
        messages
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The message an entry contributes to the working context, if any.
pub fn entry_message(entry: &SessionEntry) -> Option<AgentMessage> {
    match &entry.kind {
        EntryKind::Message { message } => Some(message.clone()),
        EntryKind::CustomMessage { message } => Some(AgentMessage::Custom(message.clone())),
        EntryKind::BranchSummary { summary } => Some(AgentMessage::Custom(CustomMessage::new(
            CustomMessage::BRANCH_SUMMARY,
            summary.clone(),
        ))),
        EntryKind::Compaction(_)
        | EntryKind::ThinkingLevelChange { .. }
        | EntryKind::ModelChange { .. }
        | EntryKind::Label { .. } => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
