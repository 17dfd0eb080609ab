//! Cross-session statistics
//!
//! Aggregates a project's archived manifests into display-ready totals,
//! including a per-model usage histogram keyed by the normalized model name.

use crate::types::{ConversationManifest, TokenUsage};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Aggregate statistics for one project's archived sessions.
#[derive(Debug, Clone, Default)]
pub struct ProjectStats {
    /// Project slug these stats cover
    pub project_slug: String,
    /// Number of archived sessions
    pub session_count: i64,
    /// Messages across all sessions
    pub message_count: i64,
    /// Tool calls across all sessions
    pub tool_call_count: i64,
    /// Token totals across all sessions
    pub tokens: TokenUsage,
    /// Plans finalized across all sessions
    pub plan_count: i64,
    /// Sub-agent handoffs across all sessions
    pub handoff_count: i64,
    /// Sessions that hit an internal compaction boundary
    pub auto_compact_sessions: i64,
    /// Summed wall-clock duration in minutes
    pub total_duration_minutes: i64,
    /// Most recent session end
    pub last_ended_at: Option<DateTime<Utc>>,
    /// Total tokens per normalized model, sorted descending
    pub usage_by_model: Vec<(String, i64)>,
}

impl ProjectStats {
    /// Aggregate a set of manifests belonging to one project.
    pub fn from_manifests(project_slug: &str, manifests: &[ConversationManifest]) -> Self {
        let mut stats = ProjectStats {
            project_slug: project_slug.to_string(),
            session_count: manifests.len() as i64,
            ..Default::default()
        };
        let mut by_model: HashMap<String, i64> = HashMap::new();

        for manifest in manifests {
            stats.message_count += manifest.message_count;
            stats.tool_call_count += manifest.tool_call_count;
            stats.tokens.add(&manifest.tokens);
            stats.plan_count += manifest.plan_count;
            stats.handoff_count += manifest.handoff_count;
            stats.total_duration_minutes += manifest.duration_minutes;
            if manifest.had_auto_compact {
                stats.auto_compact_sessions += 1;
            }
            if stats
                .last_ended_at
                .map(|prev| manifest.ended_at > prev)
                .unwrap_or(true)
            {
                stats.last_ended_at = Some(manifest.ended_at);
            }
            if let Some(model) = &manifest.model {
                *by_model.entry(normalize_model(model)).or_insert(0) += manifest.tokens.total();
            }
        }

        let mut usage_by_model: Vec<(String, i64)> = by_model.into_iter().collect();
        usage_by_model.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        stats.usage_by_model = usage_by_model;
        stats
    }

    /// Total tokens (in + out) across the project.
    pub fn total_tokens(&self) -> i64 {
        self.tokens.total()
    }

    /// Formatted total duration, e.g. "47h 23m".
    pub fn formatted_duration(&self) -> String {
        let minutes = self.total_duration_minutes.max(0);
        let hours = minutes / 60;
        let remainder = minutes % 60;
        if hours > 0 {
            format!("{}h {}m", hours, remainder)
        } else {
            format!("{}m", remainder)
        }
    }
}

/// Normalize a model identifier for grouping.
///
/// Lowercases, strips a `provider:` prefix, drops a trailing date stamp,
/// and joins a trailing major-minor pair, so
/// `anthropic:Claude-Opus-4-5-20251101` and `claude-opus-4-5` both group
/// as `claude-opus-4.5`.
pub fn normalize_model(model: &str) -> String {
    let lower = model.to_lowercase();
    let name = lower.rsplit(':').next().unwrap_or(&lower);

    let mut segments: Vec<&str> = name.split('-').filter(|s| !s.is_empty()).collect();

    // Trailing 8-digit date stamp
    if let Some(last) = segments.last() {
        if last.len() == 8 && last.chars().all(|c| c.is_ascii_digit()) {
            segments.pop();
        }
    }

    // "…-4-5" → "…-4.5"
    if segments.len() >= 2 {
        let minor_is_version = segments[segments.len() - 1]
            .chars()
            .all(|c| c.is_ascii_digit())
            && segments[segments.len() - 1].len() <= 2;
        let major_is_version = segments[segments.len() - 2]
            .chars()
            .all(|c| c.is_ascii_digit())
            && segments[segments.len() - 2].len() <= 2;
        if minor_is_version && major_is_version {
            let minor = segments.pop().unwrap_or_default();
            let major = segments.pop().unwrap_or_default();
            let joined = format!("{}.{}", major, minor);
            let mut out = segments.join("-");
            if !out.is_empty() {
                out.push('-');
            }
            out.push_str(&joined);
            return out;
        }
    }

    segments.join("-")
}
