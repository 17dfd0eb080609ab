//! Manifest construction
//!
//! Derives a [`ConversationManifest`] from a reconstructed (optionally
//! filtered) conversation plus caller-supplied session metadata. Counts and
//! token totals come from one scan over the message sequence.

use crate::filter::FilterPolicy;
use crate::stats::normalize_model;
use crate::types::{ContentBlock, ConversationMessage, ConversationManifest, Role, SessionMeta, TokenUsage};
use chrono::Utc;
use std::collections::HashMap;

/// Maximum title length before truncation, matching the capture hooks.
const TITLE_MAX_CHARS: usize = 80;

/// Tool whose invocation marks a plan being finalized by the host CLI.
const PLAN_EXIT_TOOL: &str = "ExitPlanMode";

/// Build the persisted summary record for one session.
pub fn build_manifest(
    messages: &[ConversationMessage],
    meta: &SessionMeta,
    policy: FilterPolicy,
) -> ConversationManifest {
    let mut tokens = TokenUsage::default();
    let mut tool_call_count = 0i64;
    let mut plan_count = 0i64;
    let mut handoff_count = 0i64;
    let mut model_counts: HashMap<String, usize> = HashMap::new();
    let mut had_auto_compact = false;
    let mut prev_role: Option<Role> = None;

    for message in messages {
        if message.role == Role::Assistant {
            tokens.add(&message.tokens);
            if let Some(model) = &message.model {
                *model_counts.entry(normalize_model(model)).or_insert(0) += 1;
            }
            // Two adjacent assistant turns are the signature of an
            // internal compaction boundary.
            if prev_role == Some(Role::Assistant) {
                had_auto_compact = true;
            }
        }
        prev_role = Some(message.role);

        for block in &message.content {
            match block {
                ContentBlock::ToolUse { name, .. } => {
                    tool_call_count += 1;
                    if name == PLAN_EXIT_TOOL {
                        plan_count += 1;
                    }
                }
                ContentBlock::AgentProgress { .. } => handoff_count += 1,
                ContentBlock::Text { .. }
                | ContentBlock::Thinking { .. }
                | ContentBlock::ToolResult { .. }
                | ContentBlock::BashProgress { .. }
                | ContentBlock::McpProgress { .. }
                | ContentBlock::WebSearch { .. } => {}
            }
        }
    }

    let model = model_counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(model, _)| model);

    ConversationManifest {
        id: meta.session_id.clone(),
        title: derive_title(messages, &meta.project_slug),
        project_slug: meta.project_slug.clone(),
        ended_at: meta.ended_at,
        duration_minutes: (meta.ended_at - meta.started_at).num_minutes().max(0),
        message_count: messages.len() as i64,
        tool_call_count,
        tokens,
        had_auto_compact,
        plan_count,
        handoff_count,
        model,
        filter_policy: policy,
        archived_at: Utc::now(),
    }
}

/// Title from the first real user message, truncated; the clear-session
/// marker and internal text never become titles. Falls back to the project
/// slug for sessions with no usable prompt.
fn derive_title(messages: &[ConversationMessage], project_slug: &str) -> String {
    for message in messages {
        if message.role != Role::User || message.is_clear_marker() {
            continue;
        }
        let text = message.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        return truncate_title(trimmed);
    }
    project_slug.to_string()
}

fn truncate_title(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str("...");
    title
}
