//! Integration tests for the jacques reconstruction and archival pipeline
//!
//! These tests use fixture files in `tests/fixtures/` to verify the
//! end-to-end flow: transcript read → reconstruction → filtering →
//! manifest catalog.

use jacques_core::archive::{
    discover_sessions, ArchiveCoordinator, ArchiveOptions, ArchivePhase, SessionCandidate,
};
use jacques_core::catalog::Catalog;
use jacques_core::config::LoggingConfig;
use jacques_core::filter::{apply, estimate_savings, estimate_tokens};
use jacques_core::reconstruct::reconstruct;
use jacques_core::transcript::read_transcript;
use jacques_core::types::{ContentBlock, Role};
use jacques_core::FilterPolicy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Get the path to a fixture file
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn open_catalog(dir: &TempDir) -> Catalog {
    let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
    catalog.migrate().unwrap();
    catalog
}

// ============================================
// Reconstruction from real transcripts
// ============================================

#[test]
fn test_reconstruct_full_session() {
    let read = read_transcript(&fixture_path("sessions/myproject/session-alpha.jsonl")).unwrap();
    assert!(read.warnings.is_empty());
    assert_eq!(read.entries.len(), 12);

    let messages = reconstruct(&read.entries);

    // user, assistant turn, clear marker, user, assistant
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].text(), "add retry logic to the uploader");

    // The assistant turn absorbs everything up to the next user entry,
    // with the duplicate agent_progress dropped.
    let turn = &messages[1];
    assert_eq!(turn.role, Role::Assistant);
    assert_eq!(turn.content.len(), 7);
    assert!(matches!(turn.content[0], ContentBlock::Thinking { .. }));
    assert!(matches!(turn.content[1], ContentBlock::Text { .. }));
    let agent_blocks = turn
        .content
        .iter()
        .filter(|b| matches!(b, ContentBlock::AgentProgress { .. }))
        .count();
    assert_eq!(agent_blocks, 1);

    // Usage accumulates the seeding entry plus each tool call
    assert_eq!(turn.tokens.input, 1540);
    assert_eq!(turn.tokens.output, 106);
    assert_eq!(turn.tokens.cache_creation, 30);
    assert_eq!(turn.tokens.cache_read, 10);
    assert_eq!(turn.duration_ms, 4900);
    assert!((turn.cost_usd - 0.015).abs() < 1e-9);
    assert_eq!(turn.model.as_deref(), Some("anthropic:Claude-Opus-4-5-20251101"));

    // The clear marker survives as a user message; the local-command
    // echo right after it does not.
    assert!(messages[2].is_clear_marker());
    assert_eq!(messages[3].text(), "now add tests for the retry path");
    assert_eq!(messages[4].role, Role::Assistant);
}

#[test]
fn test_malformed_lines_become_warnings() {
    let read = read_transcript(&fixture_path("malformed.jsonl")).unwrap();

    // The valid line and the id-less line are kept; the rest warn.
    assert_eq!(read.entries.len(), 2);
    assert_eq!(read.entries[0].id, "u1");
    assert!(!read.entries[1].id.is_empty());

    assert_eq!(read.warnings.len(), 2);
    assert!(read.warnings[0].starts_with("line 2:"));
    assert!(read.warnings[1].starts_with("line 3:"));
}

#[test]
fn test_missing_transcript_is_an_error() {
    assert!(read_transcript(&fixture_path("does-not-exist.jsonl")).is_err());
}

// ============================================
// Filtering
// ============================================

#[test]
fn test_filter_policies_reduce_monotonically() {
    let read = read_transcript(&fixture_path("sessions/myproject/session-alpha.jsonl")).unwrap();
    let messages = reconstruct(&read.entries);

    let everything = estimate_savings(FilterPolicy::Everything, &messages, estimate_tokens);
    let without_tools = estimate_savings(FilterPolicy::WithoutTools, &messages, estimate_tokens);
    let messages_only = estimate_savings(FilterPolicy::MessagesOnly, &messages, estimate_tokens);

    assert_eq!(everything.savings, 0);
    assert!(without_tools.savings > 0);
    assert!(messages_only.filtered <= without_tools.filtered);
    assert!(messages_only.savings_percent >= without_tools.savings_percent);

    // WithoutTools strips the tool traffic but keeps thinking and the
    // sub-agent handoff.
    let reduced = apply(FilterPolicy::WithoutTools, &messages);
    assert_eq!(reduced.len(), 5);
    let turn = &reduced[1];
    assert!(turn
        .content
        .iter()
        .all(|b| !matches!(b, ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. })));
    assert!(turn
        .content
        .iter()
        .any(|b| matches!(b, ContentBlock::Thinking { .. })));
}

// ============================================
// Batch archival
// ============================================

#[test]
fn test_archive_root_end_to_end() {
    let dir = TempDir::new().unwrap();
    let coordinator = ArchiveCoordinator::new(open_catalog(&dir));

    let mut phases = Vec::new();
    let result = coordinator
        .archive_root(
            &fixture_path("sessions"),
            &ArchiveOptions::default(),
            |progress| phases.push(progress.phase),
        )
        .unwrap();

    assert_eq!(result.total_sessions, 3);
    assert_eq!(result.archived, 3);
    assert_eq!(result.skipped, 0);
    assert!(result.errors.is_empty());

    // Both phases reported, scanning first
    assert!(phases.contains(&ArchivePhase::Scanning));
    assert!(phases.contains(&ArchivePhase::Archiving));
    assert_eq!(phases[0], ArchivePhase::Scanning);

    let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
    let alpha = catalog.get_manifest("session-alpha").unwrap().unwrap();
    assert_eq!(alpha.title, "add retry logic to the uploader");
    assert_eq!(alpha.project_slug, "myproject");
    assert_eq!(alpha.message_count, 5);
    assert_eq!(alpha.tool_call_count, 2);
    assert_eq!(alpha.plan_count, 1);
    assert_eq!(alpha.handoff_count, 1);
    assert_eq!(alpha.tokens.input, 2040);
    assert_eq!(alpha.tokens.output, 166);
    assert_eq!(alpha.model.as_deref(), Some("claude-opus-4.5"));
    assert!(!alpha.had_auto_compact);
    assert_eq!(alpha.duration_minutes, 6);

    let beta = catalog.get_manifest("session-beta").unwrap().unwrap();
    assert!(beta.had_auto_compact);
    assert_eq!(beta.model.as_deref(), Some("claude-sonnet-4"));

    assert_eq!(
        catalog.list_project_slugs().unwrap(),
        vec!["myproject", "otherproj"]
    );
    let stats = catalog.project_stats("myproject").unwrap();
    assert_eq!(stats.session_count, 2);
    assert_eq!(stats.usage_by_model[0].0, "claude-opus-4.5");
}

#[test]
fn test_rearchive_skips_unless_forced() {
    let dir = TempDir::new().unwrap();
    let coordinator = ArchiveCoordinator::new(open_catalog(&dir));
    let root = fixture_path("sessions");

    let first = coordinator
        .archive_root(&root, &ArchiveOptions::default(), |_| {})
        .unwrap();
    assert_eq!(first.archived, 3);

    let second = coordinator
        .archive_root(&root, &ArchiveOptions::default(), |_| {})
        .unwrap();
    assert_eq!(second.archived, 0);
    assert_eq!(second.skipped, 3);

    let forced = coordinator
        .archive_root(
            &root,
            &ArchiveOptions {
                force: true,
                policy: FilterPolicy::MessagesOnly,
                cancel: None,
            },
            |_| {},
        )
        .unwrap();
    assert_eq!(forced.archived, 3);
    assert_eq!(forced.skipped, 0);

    // Last writer wins: the forced run's policy is what the catalog records
    let catalog = Catalog::open(&dir.path().join("catalog.db")).unwrap();
    let alpha = catalog.get_manifest("session-alpha").unwrap().unwrap();
    assert_eq!(alpha.filter_policy, FilterPolicy::MessagesOnly);
}

#[test]
fn test_batch_continues_past_failing_session() {
    let dir = TempDir::new().unwrap();
    let sessions = dir.path().join("sessions").join("proj");
    std::fs::create_dir_all(&sessions).unwrap();

    let mut candidates = Vec::new();
    for i in 0..10 {
        let session_id = format!("s{:02}", i);
        let path = sessions.join(format!("{}.jsonl", session_id));
        if i != 4 {
            // Session 4 is a candidate whose file never materialized
            std::fs::write(
                &path,
                format!(
                    "{{\"id\":\"u1\",\"timestamp\":\"2025-10-09T10:00:0{}Z\",\"type\":\"user_message\",\"text\":\"task {}\"}}\n",
                    i % 10, i
                ),
            )
            .unwrap();
        }
        candidates.push(SessionCandidate {
            session_id,
            path,
            project_slug: "proj".into(),
        });
    }

    let coordinator = ArchiveCoordinator::new(open_catalog(&dir));
    let result = coordinator
        .archive_candidates(&candidates, &ArchiveOptions::default(), |_| {})
        .unwrap();

    assert_eq!(result.total_sessions, 10);
    assert_eq!(result.archived, 9);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].0, "s04");
}

// ============================================
// Logging
// ============================================

#[test]
fn test_logging_init_writes_to_state_dir() {
    let dir = TempDir::new().unwrap();
    std::env::set_var("XDG_STATE_HOME", dir.path());

    let guard = jacques_core::logging::init(&LoggingConfig::default()).unwrap();
    tracing::info!("archival smoke entry");
    // Dropping the guard flushes the non-blocking writer
    drop(guard);

    let state_dir = dir.path().join("jacques");
    let wrote_log = std::fs::read_dir(&state_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with("jacques.log")
        });
    assert!(wrote_log);
}

#[test]
fn test_cancellation_between_sessions() {
    let dir = TempDir::new().unwrap();
    let coordinator = ArchiveCoordinator::new(open_catalog(&dir));
    let candidates = discover_sessions(&fixture_path("sessions")).unwrap();
    assert_eq!(candidates.len(), 3);

    let cancel = Arc::new(AtomicBool::new(false));
    let options = ArchiveOptions {
        cancel: Some(cancel.clone()),
        ..Default::default()
    };

    // Cancel after the first session completes
    let result = coordinator
        .archive_candidates(&candidates, &options, |progress| {
            if progress.phase == ArchivePhase::Archiving {
                cancel.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();

    assert_eq!(result.archived, 1);
    assert!(result.errors.is_empty());
}
