//! Core domain types for jacques
//!
//! These types represent the normalized model of one captured assistant
//! session: the raw entry stream on one side, the reconstructed
//! conversation and its persisted manifest on the other.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Entry** | One raw, timestamped record from a session transcript |
//! | **Accumulator** | The in-progress assistant turn being built from one or more entries |
//! | **Flush** | Closing the open accumulator and appending it to the output |
//! | **Manifest** | A persisted summary record for one archived session |
//! | **Sub-agent** | A nested assistant run whose progress is reported inline but whose full transcript is fetched on demand |

use crate::filter::FilterPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================
// Token usage
// ============================================

/// Token counts reported by the assistant API.
///
/// Accumulation across entries is additive: the accumulator sums the
/// seeding assistant entry's usage plus every subsequent tool call's
/// incremental usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    /// Input tokens consumed
    pub input: i64,
    /// Output tokens generated
    pub output: i64,
    /// Cache-creation input tokens
    pub cache_creation: i64,
    /// Cache-read input tokens
    pub cache_read: i64,
}

impl TokenUsage {
    /// Add another usage record into this one, field by field.
    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.cache_creation += other.cache_creation;
        self.cache_read += other.cache_read;
    }

    /// Total tokens (in + out), ignoring cache counters.
    pub fn total(&self) -> i64 {
        self.input + self.output
    }
}

// ============================================
// Log entries (raw transcript records)
// ============================================

/// One immutable, timestamped record from the source stream.
///
/// Entries for a single session arrive in non-decreasing timestamp order;
/// nothing in this crate re-sorts them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Stable unique identifier
    pub id: String,
    /// Monotonic within a session
    pub timestamp: DateTime<Utc>,
    /// Kind-specific payload
    #[serde(flatten)]
    pub payload: EntryPayload,
}

/// The seven entry kinds and their payloads.
///
/// Every consumer must match all variants explicitly; a "kind not
/// recognized" fallback is a defect, not a default path. Internal command
/// markers embedded in `UserMessage` text are data, classified by the
/// reconstruction engine, not a separate kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryPayload {
    /// Free text from the human
    UserMessage { text: String },
    /// One assistant turn, possibly with thinking and usage
    AssistantMessage {
        #[serde(default)]
        thinking: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        usage: Option<TokenUsage>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        duration_ms: Option<i64>,
        #[serde(default)]
        cost_usd: Option<f64>,
    },
    /// A tool invocation; the entry `id` doubles as the call id.
    ///
    /// A tool round-trip may itself report incremental usage.
    ToolCall {
        name: String,
        input: serde_json::Value,
        #[serde(default)]
        usage: Option<TokenUsage>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        duration_ms: Option<i64>,
        #[serde(default)]
        cost_usd: Option<f64>,
    },
    /// Result of a tool invocation
    ToolResult {
        /// `LogEntry.id` of the originating call
        call_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Progress report from a spawned sub-agent
    AgentProgress {
        agent_id: String,
        prompt: String,
        agent_type: String,
        #[serde(default)]
        description: Option<String>,
    },
    /// Incremental output from a long-running shell command
    BashProgress {
        output: String,
        #[serde(default)]
        full_output: Option<String>,
        #[serde(default)]
        elapsed_secs: u64,
        #[serde(default)]
        total_lines: u64,
    },
    /// Status report from an MCP server tool
    McpProgress {
        status: String,
        server: String,
        tool: String,
    },
    /// A web search performed by the assistant
    WebSearch {
        search_kind: String,
        query: String,
        #[serde(default)]
        result_count: u64,
        #[serde(default)]
        urls: Option<Vec<String>>,
    },
}

impl EntryPayload {
    /// Kind tag, matching the serde wire name.
    pub fn kind(&self) -> &'static str {
        match self {
            EntryPayload::UserMessage { .. } => "user_message",
            EntryPayload::AssistantMessage { .. } => "assistant_message",
            EntryPayload::ToolCall { .. } => "tool_call",
            EntryPayload::ToolResult { .. } => "tool_result",
            EntryPayload::AgentProgress { .. } => "agent_progress",
            EntryPayload::BashProgress { .. } => "bash_progress",
            EntryPayload::McpProgress { .. } => "mcp_progress",
            EntryPayload::WebSearch { .. } => "web_search",
        }
    }
}

// ============================================
// Reconstructed conversation
// ============================================

/// Role of a reconstructed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// One block of content within a reconstructed message.
///
/// Order within a message is insertion order, never grouped by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Handle to a sub-agent run, not a transcript of its progress.
    /// Exactly one per `agent_id` survives reconstruction.
    AgentProgress {
        agent_id: String,
        prompt: String,
        agent_type: String,
        #[serde(default)]
        description: Option<String>,
    },
    BashProgress {
        output: String,
        #[serde(default)]
        full_output: Option<String>,
        #[serde(default)]
        elapsed_secs: u64,
        #[serde(default)]
        total_lines: u64,
    },
    McpProgress {
        status: String,
        server: String,
        tool: String,
    },
    WebSearch {
        search_kind: String,
        query: String,
        #[serde(default)]
        result_count: u64,
        #[serde(default)]
        urls: Option<Vec<String>>,
    },
}

/// The reconstructed output unit: one turn-level message.
///
/// An assistant message may aggregate content and usage from multiple
/// contiguous non-user entries (its seeding assistant entry plus trailing
/// tool/progress entries) until the next user entry or end of stream.
/// A user message never aggregates trailing entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Id of the first contributing entry
    pub id: String,
    pub role: Role,
    /// Timestamp of the first contributing entry
    pub timestamp: DateTime<Utc>,
    /// Content blocks in insertion order
    pub content: Vec<ContentBlock>,
    /// Accumulated usage (assistant messages; zero for user messages)
    #[serde(default)]
    pub tokens: TokenUsage,
    #[serde(default)]
    pub model: Option<String>,
    /// Accumulated duration in milliseconds
    #[serde(default)]
    pub duration_ms: i64,
    /// Accumulated cost in USD
    #[serde(default)]
    pub cost_usd: f64,
}

impl ConversationMessage {
    /// Whether this message is the preserved clear-session boundary marker.
    pub fn is_clear_marker(&self) -> bool {
        self.role == Role::User
            && self.content.len() == 1
            && matches!(
                &self.content[0],
                ContentBlock::Text { text } if crate::reconstruct::is_clear_marker_text(text)
            )
    }

    /// Concatenated plain text of all `Text` blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }
}

// ============================================
// Manifests (persisted session summaries)
// ============================================

/// Session metadata supplied by the caller alongside the reconstructed
/// conversation when building a manifest.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Session id (catalog key)
    pub session_id: String,
    /// Path to the transcript file
    pub path: PathBuf,
    /// Owning project slug
    pub project_slug: String,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// When the session ended
    pub ended_at: DateTime<Utc>,
}

/// A derived, persisted summary of one archived session.
///
/// Created once per archived session and never mutated afterwards, except
/// by a forced re-extraction that fully replaces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationManifest {
    /// Session id (catalog key)
    pub id: String,
    /// Display title, derived from the first real user message
    pub title: String,
    /// Owning project slug
    pub project_slug: String,
    /// When the session ended
    pub ended_at: DateTime<Utc>,
    /// Wall-clock duration from first to last timestamp
    pub duration_minutes: i64,
    /// Reconstructed message count
    pub message_count: i64,
    /// Tool-use block count across all messages
    pub tool_call_count: i64,
    /// Token totals summed across assistant messages
    pub tokens: TokenUsage,
    /// Whether the session shows the internal-compaction signature
    pub had_auto_compact: bool,
    /// Plan-exit tool invocations
    pub plan_count: i64,
    /// Sub-agent handoffs (one per deduplicated agent run)
    pub handoff_count: i64,
    /// Dominant backing model, normalized
    pub model: Option<String>,
    /// Policy the archive was written under
    pub filter_policy: FilterPolicy,
    /// When this manifest was written
    pub archived_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_add() {
        let mut a = TokenUsage {
            input: 5,
            output: 2,
            cache_creation: 1,
            cache_read: 0,
        };
        a.add(&TokenUsage {
            input: 3,
            output: 1,
            cache_creation: 0,
            cache_read: 7,
        });
        assert_eq!(a.input, 8);
        assert_eq!(a.output, 3);
        assert_eq!(a.cache_creation, 1);
        assert_eq!(a.cache_read, 7);
        assert_eq!(a.total(), 11);
    }

    #[test]
    fn test_entry_payload_roundtrip() {
        let json = r#"{
            "id": "e1",
            "timestamp": "2026-01-15T10:00:00Z",
            "type": "assistant_message",
            "text": "hello",
            "usage": {"input": 10, "output": 5}
        }"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, "e1");
        match &entry.payload {
            EntryPayload::AssistantMessage { text, usage, .. } => {
                assert_eq!(text.as_deref(), Some("hello"));
                assert_eq!(usage.unwrap().input, 10);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(entry.payload.kind(), "assistant_message");
    }

    #[test]
    fn test_unknown_entry_kind_is_an_error() {
        let json = r#"{"id":"x","timestamp":"2026-01-15T10:00:00Z","type":"telemetry"}"#;
        assert!(serde_json::from_str::<LogEntry>(json).is_err());
    }
}
