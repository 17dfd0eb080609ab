//! Transcript reader
//!
//! Reads a session's persisted JSONL log into typed [`LogEntry`] values,
//! preserving file order (which is timestamp order; nothing here re-sorts).
//!
//! The reader is resilient: malformed lines, unknown entry kinds, and
//! records missing required payload fields are skipped with a recorded
//! warning, never aborting the read. The policy is uniform so archive
//! counts stay reproducible. Records missing only an `id` are kept with a
//! generated one.

use crate::error::{Error, Result};
use crate::types::LogEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Result of reading one transcript file.
#[derive(Debug, Default)]
pub struct ReadResult {
    /// Entries in file order
    pub entries: Vec<LogEntry>,
    /// Non-fatal problems encountered (line number + reason)
    pub warnings: Vec<String>,
}

/// Read a transcript file into typed entries.
///
/// Only I/O failures return `Err`; per-line problems become warnings.
pub fn read_transcript(path: &Path) -> Result<ReadResult> {
    let file = File::open(path).map_err(|e| Error::Transcript {
        path: path.display().to_string(),
        message: format!("failed to open: {}", e),
    })?;

    let mut result = ReadResult::default();
    let reader = BufReader::new(file);
    let mut line_number = 0usize;

    for line_result in reader.lines() {
        line_number += 1;

        let line = match line_result {
            Ok(l) => l,
            Err(e) => {
                // Stream-level failure; stop rather than spin on it.
                result
                    .warnings
                    .push(format!("line {}: read error: {}", line_number, e));
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let mut raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                result
                    .warnings
                    .push(format!("line {}: JSON parse error: {}", line_number, e));
                continue;
            }
        };

        // An absent id is recoverable; everything else malformed is not.
        if raw.is_object() && raw.get("id").is_none() {
            raw["id"] = serde_json::Value::String(uuid::Uuid::new_v4().to_string());
        }

        match serde_json::from_value::<LogEntry>(raw) {
            Ok(entry) => result.entries.push(entry),
            Err(e) => {
                result
                    .warnings
                    .push(format!("line {}: malformed entry: {}", line_number, e));
            }
        }
    }

    if !result.warnings.is_empty() {
        tracing::warn!(
            path = %path.display(),
            warnings = result.warnings.len(),
            entries = result.entries.len(),
            "transcript read completed with warnings"
        );
    }

    Ok(result)
}
