//! Content-filtering policies
//!
//! Three named policies reduce how much of a reconstructed conversation is
//! kept, either before persistence (to shrink the archive) or before
//! display (to preview the savings). Filtering runs as a post-reconstruction
//! pass over message content; messages left with no blocks are dropped.
//!
//! Archives record the policy that produced them, so a later re-extraction
//! can tell "never archived" apart from "archived under a narrower policy".

use crate::types::{ContentBlock, ConversationMessage, Role};
use serde::{Deserialize, Serialize};

/// A named content-reduction rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterPolicy {
    /// Identity: nothing removed
    #[default]
    Everything,
    /// Drops tool_use/tool_result/bash_progress/mcp_progress blocks
    WithoutTools,
    /// Keeps only plain user text and assistant text blocks
    MessagesOnly,
}

impl FilterPolicy {
    /// Human-readable label for selection UIs.
    pub fn label(&self) -> &'static str {
        match self {
            FilterPolicy::Everything => "Everything",
            FilterPolicy::WithoutTools => "Without tools",
            FilterPolicy::MessagesOnly => "Messages only",
        }
    }

    /// Identifier used in catalog storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterPolicy::Everything => "everything",
            FilterPolicy::WithoutTools => "without_tools",
            FilterPolicy::MessagesOnly => "messages_only",
        }
    }

    /// Whether a block survives this policy in a message of the given role.
    fn retains(&self, role: Role, block: &ContentBlock) -> bool {
        match self {
            FilterPolicy::Everything => true,
            FilterPolicy::WithoutTools => match block {
                ContentBlock::ToolUse { .. }
                | ContentBlock::ToolResult { .. }
                | ContentBlock::BashProgress { .. }
                | ContentBlock::McpProgress { .. } => false,
                ContentBlock::Text { .. }
                | ContentBlock::Thinking { .. }
                | ContentBlock::AgentProgress { .. }
                | ContentBlock::WebSearch { .. } => true,
            },
            FilterPolicy::MessagesOnly => match block {
                ContentBlock::Text { .. } => {
                    matches!(role, Role::User | Role::Assistant)
                }
                ContentBlock::Thinking { .. }
                | ContentBlock::ToolUse { .. }
                | ContentBlock::ToolResult { .. }
                | ContentBlock::AgentProgress { .. }
                | ContentBlock::BashProgress { .. }
                | ContentBlock::McpProgress { .. }
                | ContentBlock::WebSearch { .. } => false,
            },
        }
    }
}

impl std::str::FromStr for FilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "everything" => Ok(FilterPolicy::Everything),
            "without_tools" => Ok(FilterPolicy::WithoutTools),
            "messages_only" => Ok(FilterPolicy::MessagesOnly),
            _ => Err(format!("unknown filter policy: {}", s)),
        }
    }
}

/// Apply a policy to a reconstructed conversation.
///
/// Same shape out as in: an ordered message sequence, with per-message
/// content reduced. Messages whose content empties out are dropped, the
/// message-level analogue of dropping entries that produce only filtered
/// blocks.
pub fn apply(policy: FilterPolicy, messages: &[ConversationMessage]) -> Vec<ConversationMessage> {
    if policy == FilterPolicy::Everything {
        return messages.to_vec();
    }

    messages
        .iter()
        .filter_map(|message| {
            let content: Vec<ContentBlock> = message
                .content
                .iter()
                .filter(|block| policy.retains(message.role, block))
                .cloned()
                .collect();
            if content.is_empty() {
                return None;
            }
            let mut reduced = message.clone();
            reduced.content = content;
            Some(reduced)
        })
        .collect()
}

// ============================================
// Savings estimation
// ============================================

/// Estimated token reduction for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSavings {
    /// Token estimate for the unfiltered conversation
    pub current: usize,
    /// Token estimate after applying the policy
    pub filtered: usize,
    /// `current - filtered`
    pub savings: usize,
    /// Savings as a whole percentage of `current`
    pub savings_percent: u8,
}

/// Estimate the savings a policy would yield, using the caller's token
/// estimator (a black box returning a non-negative count proportional to
/// content size; see [`estimate_tokens`] for the built-in heuristic).
pub fn estimate_savings<F>(
    policy: FilterPolicy,
    messages: &[ConversationMessage],
    estimate: F,
) -> FilterSavings
where
    F: Fn(&str) -> usize,
{
    let current = conversation_tokens(messages, &estimate);
    let reduced = apply(policy, messages);
    let filtered = conversation_tokens(&reduced, &estimate);
    let savings = current.saturating_sub(filtered);
    let savings_percent = if current == 0 {
        0
    } else {
        ((savings * 100) / current) as u8
    };

    FilterSavings {
        current,
        filtered,
        savings,
        savings_percent,
    }
}

fn conversation_tokens<F>(messages: &[ConversationMessage], estimate: &F) -> usize
where
    F: Fn(&str) -> usize,
{
    messages
        .iter()
        .flat_map(|m| m.content.iter())
        .map(|block| estimate(&block_text(block)))
        .sum()
}

/// Flatten a content block to the text a tokenizer would see.
fn block_text(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Text { text } => text.clone(),
        ContentBlock::Thinking { thinking } => thinking.clone(),
        ContentBlock::ToolUse { name, input, .. } => format!("{} {}", name, input),
        ContentBlock::ToolResult { content, .. } => match content {
            serde_json::Value::String(s) => s.clone(),
            v => v.to_string(),
        },
        ContentBlock::AgentProgress {
            prompt,
            agent_type,
            description,
            ..
        } => format!(
            "{} {} {}",
            agent_type,
            description.as_deref().unwrap_or(""),
            prompt
        ),
        ContentBlock::BashProgress {
            output,
            full_output,
            ..
        } => full_output.clone().unwrap_or_else(|| output.clone()),
        ContentBlock::McpProgress {
            status,
            server,
            tool,
        } => format!("{} {} {}", server, tool, status),
        ContentBlock::WebSearch { query, urls, .. } => {
            let mut text = query.clone();
            if let Some(urls) = urls {
                for url in urls {
                    text.push('\n');
                    text.push_str(url);
                }
            }
            text
        }
    }
}

/// Built-in token heuristic: roughly four characters per token.
///
/// Matches the capture hooks' fallback when no real tokenizer is available.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}
