//! Transcript reconstruction engine
//!
//! Merges a flat, time-ordered sequence of [`LogEntry`] values into
//! turn-level [`ConversationMessage`]s in a single left-to-right pass.
//!
//! The pass carries one mutable "open assistant accumulator" plus a global
//! set of already-seen sub-agent ids. A user entry or a fresh assistant
//! entry flushes the open accumulator; tool and progress entries attach to
//! it, opening one defensively if none exists. Usage accumulation is
//! additive across every contributing entry in the accumulator's lifetime.
//!
//! `reconstruct` is a pure function of its input: no state survives across
//! calls, output is deterministic, and cost is O(n) in the entry count.

use crate::types::{ContentBlock, ConversationMessage, EntryPayload, LogEntry, Role, TokenUsage};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Prefixes marking CLI-internal bookkeeping text inside user entries.
///
/// Matches the skip list the capture hooks use when deriving session titles.
const INTERNAL_PREFIXES: &[&str] = &[
    "<local-command",
    "<command-name>",
    "<system-",
    "<user-prompt-",
];

/// The one internal marker that is preserved: a cleared-session boundary.
const CLEAR_COMMAND_MARKER: &str = "<command-name>/clear</command-name>";

/// Whether user text is the preserved clear-session marker.
pub fn is_clear_marker_text(text: &str) -> bool {
    text.contains(CLEAR_COMMAND_MARKER)
}

/// Classification of a user entry's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserTextClass {
    /// A real prompt from the human
    Normal,
    /// CLI-internal bookkeeping, dropped from the reconstruction
    Internal,
    /// The cleared-session marker, preserved so viewers can render a boundary
    ClearMarker,
}

pub(crate) fn classify_user_text(text: &str) -> UserTextClass {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return UserTextClass::Internal;
    }
    if is_clear_marker_text(trimmed) {
        return UserTextClass::ClearMarker;
    }
    if INTERNAL_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return UserTextClass::Internal;
    }
    UserTextClass::Normal
}

/// The in-progress assistant turn.
struct OpenMessage {
    id: String,
    timestamp: DateTime<Utc>,
    content: Vec<ContentBlock>,
    tokens: TokenUsage,
    model: Option<String>,
    duration_ms: i64,
    cost_usd: f64,
}

impl OpenMessage {
    fn empty(id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            timestamp,
            content: Vec::new(),
            tokens: TokenUsage::default(),
            model: None,
            duration_ms: 0,
            cost_usd: 0.0,
        }
    }

    fn close(self) -> ConversationMessage {
        ConversationMessage {
            id: self.id,
            role: Role::Assistant,
            timestamp: self.timestamp,
            content: self.content,
            tokens: self.tokens,
            model: self.model,
            duration_ms: self.duration_ms,
            cost_usd: self.cost_usd,
        }
    }
}

/// Fold state: `(open accumulator, seen agent ids, output)`.
struct ReconstructState {
    open: Option<OpenMessage>,
    seen_agents: HashSet<String>,
    out: Vec<ConversationMessage>,
}

impl ReconstructState {
    fn new() -> Self {
        Self {
            open: None,
            seen_agents: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// Flush the open accumulator, if any, into the output.
    fn flush(&mut self) {
        if let Some(open) = self.open.take() {
            self.out.push(open.close());
        }
    }

    /// Attach point shared by the tool/progress/search branches: returns the
    /// open accumulator, opening an empty one keyed to the triggering entry
    /// if none exists. Tool and progress entries must never be lost even
    /// when no preceding assistant entry was observed.
    fn ensure_open(&mut self, entry: &LogEntry) -> &mut OpenMessage {
        if self.open.is_none() {
            self.open = Some(OpenMessage::empty(&entry.id, entry.timestamp));
        }
        self.open.as_mut().expect("accumulator opened above")
    }
}

/// Reconstruct turn-level messages from an ordered entry sequence.
pub fn reconstruct(entries: &[LogEntry]) -> Vec<ConversationMessage> {
    let mut state = ReconstructState::new();

    for entry in entries {
        match &entry.payload {
            EntryPayload::UserMessage { text } => {
                state.flush();
                match classify_user_text(text) {
                    UserTextClass::Internal => {
                        tracing::debug!(entry_id = %entry.id, "dropping internal user marker");
                    }
                    UserTextClass::Normal | UserTextClass::ClearMarker => {
                        state.out.push(ConversationMessage {
                            id: entry.id.clone(),
                            role: Role::User,
                            timestamp: entry.timestamp,
                            content: vec![ContentBlock::Text { text: text.clone() }],
                            tokens: TokenUsage::default(),
                            model: None,
                            duration_ms: 0,
                            cost_usd: 0.0,
                        });
                    }
                }
            }

            EntryPayload::AssistantMessage {
                thinking,
                text,
                usage,
                model,
                duration_ms,
                cost_usd,
            } => {
                // A new assistant turn always starts a fresh accumulator,
                // even back to back with a prior one (e.g. after an
                // internal compaction).
                state.flush();
                let mut open = OpenMessage::empty(&entry.id, entry.timestamp);
                if let Some(thinking) = thinking.as_deref().filter(|t| !t.is_empty()) {
                    open.content.push(ContentBlock::Thinking {
                        thinking: thinking.to_string(),
                    });
                }
                if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                    open.content.push(ContentBlock::Text {
                        text: text.to_string(),
                    });
                }
                if let Some(usage) = usage {
                    open.tokens = *usage;
                }
                open.model = model.clone();
                open.duration_ms = duration_ms.unwrap_or(0);
                open.cost_usd = cost_usd.unwrap_or(0.0);
                state.open = Some(open);
            }

            EntryPayload::ToolCall {
                name,
                input,
                usage,
                model,
                duration_ms,
                cost_usd,
            } => {
                let open = state.ensure_open(entry);
                open.content.push(ContentBlock::ToolUse {
                    id: entry.id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                // Incremental usage from the tool round-trip adds into the
                // running totals, never overwrites them.
                if let Some(usage) = usage {
                    open.tokens.add(usage);
                }
                if let Some(ms) = duration_ms {
                    open.duration_ms += ms;
                }
                if let Some(cost) = cost_usd {
                    open.cost_usd += cost;
                }
                if open.model.is_none() {
                    open.model = model.clone();
                }
            }

            EntryPayload::ToolResult {
                call_id,
                content,
                is_error,
            } => {
                match state.open.as_mut() {
                    Some(open) => {
                        open.content.push(ContentBlock::ToolResult {
                            tool_use_id: call_id.clone(),
                            content: content.clone(),
                            is_error: *is_error,
                        });
                    }
                    None => {
                        // Orphan result with no open accumulator, usually a
                        // log-interleaving artifact. Dropped, not recovered.
                        tracing::debug!(entry_id = %entry.id, call_id = %call_id, "dropping orphan tool result");
                    }
                }
            }

            EntryPayload::AgentProgress {
                agent_id,
                prompt,
                agent_type,
                description,
            } => {
                // One block per agent id for the whole stream: the block is
                // a handle to the sub-agent run, whose full transcript is
                // fetched on demand elsewhere.
                if !state.seen_agents.insert(agent_id.clone()) {
                    continue;
                }
                let open = state.ensure_open(entry);
                open.content.push(ContentBlock::AgentProgress {
                    agent_id: agent_id.clone(),
                    prompt: prompt.clone(),
                    agent_type: agent_type.clone(),
                    description: description.clone(),
                });
            }

            EntryPayload::BashProgress {
                output,
                full_output,
                elapsed_secs,
                total_lines,
            } => {
                let open = state.ensure_open(entry);
                open.content.push(ContentBlock::BashProgress {
                    output: output.clone(),
                    full_output: full_output.clone(),
                    elapsed_secs: *elapsed_secs,
                    total_lines: *total_lines,
                });
            }

            EntryPayload::McpProgress {
                status,
                server,
                tool,
            } => {
                let open = state.ensure_open(entry);
                open.content.push(ContentBlock::McpProgress {
                    status: status.clone(),
                    server: server.clone(),
                    tool: tool.clone(),
                });
            }

            EntryPayload::WebSearch {
                search_kind,
                query,
                result_count,
                urls,
            } => {
                let open = state.ensure_open(entry);
                open.content.push(ContentBlock::WebSearch {
                    search_kind: search_kind.clone(),
                    query: query.clone(),
                    result_count: *result_count,
                    urls: urls.clone(),
                });
            }
        }
    }

    state.flush();
    state.out
}
