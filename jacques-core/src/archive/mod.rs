//! Batch archival
//!
//! Orchestrates archiving many sessions into the manifest catalog:
//!
//! ```text
//! ┌────────────────┐     ┌────────────────────┐     ┌─────────────┐
//! │ Session files  │ ──► │ ArchiveCoordinator │ ──► │   Catalog   │
//! │ (<root>/…/…)   │     │ read → reconstruct │     │ (manifests) │
//! └────────────────┘     │ → filter → summary │     └─────────────┘
//!                        └────────────────────┘
//! ```
//!
//! Archival is a two-phase process: `Scanning` enumerates candidate
//! sessions, `Archiving` reconstructs and summarizes each one. The progress
//! callback runs synchronously on the calling thread after each step; a
//! per-session failure is recorded and the batch continues. Cancellation is
//! cooperative and checked between sessions, never mid-session.

mod manifest;

pub use manifest::build_manifest;

use crate::catalog::Catalog;
use crate::error::Result;
use crate::filter::{apply, FilterPolicy};
use crate::reconstruct::reconstruct;
use crate::transcript::read_transcript;
use crate::types::SessionMeta;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One candidate session found during scanning.
#[derive(Debug, Clone)]
pub struct SessionCandidate {
    /// Session id (transcript file stem)
    pub session_id: String,
    /// Path to the transcript file
    pub path: PathBuf,
    /// Owning project slug (transcript's parent directory name)
    pub project_slug: String,
}

/// Which phase of the batch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchivePhase {
    /// Enumerating candidate sessions
    Scanning,
    /// Reconstructing and summarizing each session
    Archiving,
}

impl ArchivePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchivePhase::Scanning => "scanning",
            ArchivePhase::Archiving => "archiving",
        }
    }
}

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone)]
pub struct ArchiveProgress {
    pub phase: ArchivePhase,
    /// Sessions processed so far in this phase
    pub completed: usize,
    /// Total sessions in this phase
    pub total: usize,
    /// Identifier of the item currently being processed
    pub current: Option<String>,
    pub skipped: usize,
    pub errors: usize,
}

/// Knobs for one batch run.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Recompute and replace manifests that already exist
    pub force: bool,
    /// Policy applied to each conversation before summarizing
    pub policy: FilterPolicy,
    /// Cooperative cancellation flag, checked between sessions
    pub cancel: Option<Arc<AtomicBool>>,
}

impl ArchiveOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// Complete result of a batch run, reported even on partial failure.
#[derive(Debug, Default)]
pub struct ArchiveResult {
    /// Candidates considered
    pub total_sessions: usize,
    /// Manifests written
    pub archived: usize,
    /// Sessions skipped because a manifest already existed
    pub skipped: usize,
    /// Per-session failures (session id, reason); never aborts the batch
    pub errors: Vec<(String, String)>,
}

/// Enumerate candidate sessions under a root directory.
///
/// Layout is `<root>/<project-slug>/<session-id>.jsonl`.
pub fn discover_sessions(root: &Path) -> Result<Vec<SessionCandidate>> {
    let pattern = root.join("*/*.jsonl");
    let entries = glob::glob(&pattern.to_string_lossy()).map_err(|e| {
        crate::error::Error::Config(format!("invalid session root {}: {}", root.display(), e))
    })?;

    let mut candidates = Vec::new();
    for path in entries.flatten() {
        let session_id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => continue,
        };
        let project_slug = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        candidates.push(SessionCandidate {
            session_id,
            path,
            project_slug,
        });
    }

    tracing::info!(
        root = %root.display(),
        count = candidates.len(),
        "discovered candidate sessions"
    );
    Ok(candidates)
}

/// Coordinates batch archival into the manifest catalog.
///
/// The catalog serializes writes per session id; if two runs race on the
/// same id, the later writer's manifest fully replaces the earlier one.
pub struct ArchiveCoordinator {
    catalog: Catalog,
}

impl ArchiveCoordinator {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Scan a session root and archive everything found.
    pub fn archive_root<F>(
        &self,
        root: &Path,
        options: &ArchiveOptions,
        mut on_progress: F,
    ) -> Result<ArchiveResult>
    where
        F: FnMut(&ArchiveProgress),
    {
        let candidates = discover_sessions(root)?;
        let total = candidates.len();
        for (i, candidate) in candidates.iter().enumerate() {
            on_progress(&ArchiveProgress {
                phase: ArchivePhase::Scanning,
                completed: i + 1,
                total,
                current: Some(candidate.session_id.clone()),
                skipped: 0,
                errors: 0,
            });
        }
        self.archive_candidates(&candidates, options, on_progress)
    }

    /// Archive an externally supplied candidate list.
    pub fn archive_candidates<F>(
        &self,
        candidates: &[SessionCandidate],
        options: &ArchiveOptions,
        mut on_progress: F,
    ) -> Result<ArchiveResult>
    where
        F: FnMut(&ArchiveProgress),
    {
        let mut result = ArchiveResult {
            total_sessions: candidates.len(),
            ..Default::default()
        };

        for (i, candidate) in candidates.iter().enumerate() {
            if options.cancelled() {
                tracing::info!(
                    completed = i,
                    total = candidates.len(),
                    "archival cancelled between sessions"
                );
                break;
            }

            match self.archive_one(candidate, options) {
                Ok(true) => result.archived += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = %candidate.session_id,
                        error = %e,
                        "failed to archive session"
                    );
                    result
                        .errors
                        .push((candidate.session_id.clone(), e.to_string()));
                }
            }

            on_progress(&ArchiveProgress {
                phase: ArchivePhase::Archiving,
                completed: i + 1,
                total: candidates.len(),
                current: Some(candidate.session_id.clone()),
                skipped: result.skipped,
                errors: result.errors.len(),
            });
        }

        Ok(result)
    }

    /// Archive one session. Returns `Ok(false)` when skipped.
    fn archive_one(&self, candidate: &SessionCandidate, options: &ArchiveOptions) -> Result<bool> {
        if !options.force && self.catalog.manifest_exists(&candidate.session_id)? {
            return Ok(false);
        }

        let read = read_transcript(&candidate.path)?;
        let messages = reconstruct(&read.entries);
        let messages = apply(options.policy, &messages);

        let (started_at, ended_at) = session_bounds(&read.entries, &candidate.path);
        let meta = SessionMeta {
            session_id: candidate.session_id.clone(),
            path: candidate.path.clone(),
            project_slug: candidate.project_slug.clone(),
            started_at,
            ended_at,
        };

        let manifest = build_manifest(&messages, &meta, options.policy);
        self.catalog.upsert_manifest(&manifest)?;

        tracing::debug!(
            session_id = %candidate.session_id,
            messages = manifest.message_count,
            tokens = manifest.tokens.total(),
            "archived session"
        );
        Ok(true)
    }
}

/// First/last entry timestamps, or the file's mtime for empty transcripts.
fn session_bounds(
    entries: &[crate::types::LogEntry],
    path: &Path,
) -> (DateTime<Utc>, DateTime<Utc>) {
    match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => {
            let fallback = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map(DateTime::from)
                .unwrap_or_else(|_| Utc::now());
            (fallback, fallback)
        }
    }
}
