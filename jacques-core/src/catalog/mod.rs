//! Manifest catalog
//!
//! SQLite-backed store for [`ConversationManifest`] records, keyed by
//! session id and queryable by project. Writes go through a single
//! connection behind a mutex, so concurrent upserts for the same session
//! id serialize and the last writer's manifest fully replaces the earlier
//! one — never a partial overwrite.

mod schema;

pub use schema::SCHEMA_VERSION;

use crate::error::Result;
use crate::filter::FilterPolicy;
use crate::stats::ProjectStats;
use crate::types::{ConversationManifest, TokenUsage};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// Catalog handle (single connection for now)
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open or create a catalog at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory catalog (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run any pending schema migrations
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        schema::migrate(&conn)?;
        Ok(())
    }

    /// Insert or fully replace the manifest for a session id
    pub fn upsert_manifest(&self, manifest: &ConversationManifest) -> Result<()> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        conn.execute(
            r#"
            INSERT OR REPLACE INTO manifests (
                id, title, project_slug, ended_at, duration_minutes,
                message_count, tool_call_count,
                tokens_in, tokens_out, tokens_cache_creation, tokens_cache_read,
                had_auto_compact, plan_count, handoff_count,
                model, filter_policy, archived_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                manifest.id,
                manifest.title,
                manifest.project_slug,
                manifest.ended_at.to_rfc3339(),
                manifest.duration_minutes,
                manifest.message_count,
                manifest.tool_call_count,
                manifest.tokens.input,
                manifest.tokens.output,
                manifest.tokens.cache_creation,
                manifest.tokens.cache_read,
                manifest.had_auto_compact,
                manifest.plan_count,
                manifest.handoff_count,
                manifest.model,
                manifest.filter_policy.as_str(),
                manifest.archived_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Whether a manifest already exists for the session id
    pub fn manifest_exists(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM manifests WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Fetch one manifest by session id
    pub fn get_manifest(&self, session_id: &str) -> Result<Option<ConversationManifest>> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        let manifest = conn
            .query_row(
                "SELECT * FROM manifests WHERE id = ?1",
                params![session_id],
                Self::row_to_manifest,
            )
            .optional()?;
        Ok(manifest)
    }

    /// All manifests for a project, most recent first
    pub fn list_project_manifests(&self, project_slug: &str) -> Result<Vec<ConversationManifest>> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT * FROM manifests WHERE project_slug = ?1 ORDER BY ended_at DESC",
        )?;
        let rows = stmt.query_map(params![project_slug], Self::row_to_manifest)?;
        let mut manifests = Vec::new();
        for row in rows {
            manifests.push(row?);
        }
        Ok(manifests)
    }

    /// Distinct project slugs with at least one archived session
    pub fn list_project_slugs(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("catalog mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT DISTINCT project_slug FROM manifests ORDER BY project_slug",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut slugs = Vec::new();
        for row in rows {
            slugs.push(row?);
        }
        Ok(slugs)
    }

    /// Aggregate stats for one project's archived sessions
    pub fn project_stats(&self, project_slug: &str) -> Result<ProjectStats> {
        let manifests = self.list_project_manifests(project_slug)?;
        Ok(ProjectStats::from_manifests(project_slug, &manifests))
    }

    fn row_to_manifest(row: &Row) -> rusqlite::Result<ConversationManifest> {
        let ended_at_str: String = row.get("ended_at")?;
        let archived_at_str: String = row.get("archived_at")?;
        let filter_policy_str: String = row.get("filter_policy")?;

        Ok(ConversationManifest {
            id: row.get("id")?,
            title: row.get("title")?,
            project_slug: row.get("project_slug")?,
            ended_at: parse_datetime(&ended_at_str),
            duration_minutes: row.get("duration_minutes")?,
            message_count: row.get("message_count")?,
            tool_call_count: row.get("tool_call_count")?,
            tokens: TokenUsage {
                input: row.get("tokens_in")?,
                output: row.get("tokens_out")?,
                cache_creation: row.get("tokens_cache_creation")?,
                cache_read: row.get("tokens_cache_read")?,
            },
            had_auto_compact: row.get("had_auto_compact")?,
            plan_count: row.get("plan_count")?,
            handoff_count: row.get("handoff_count")?,
            model: row.get("model")?,
            filter_policy: filter_policy_str
                .parse::<FilterPolicy>()
                .unwrap_or_default(),
            archived_at: parse_datetime(&archived_at_str),
        })
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manifest(id: &str, slug: &str) -> ConversationManifest {
        ConversationManifest {
            id: id.to_string(),
            title: "fix the widget".to_string(),
            project_slug: slug.to_string(),
            ended_at: Utc.timestamp_opt(1_760_000_000, 0).unwrap(),
            duration_minutes: 12,
            message_count: 6,
            tool_call_count: 3,
            tokens: TokenUsage {
                input: 120,
                output: 40,
                cache_creation: 8,
                cache_read: 2,
            },
            had_auto_compact: true,
            plan_count: 1,
            handoff_count: 2,
            model: Some("claude-opus-4.5".to_string()),
            filter_policy: FilterPolicy::WithoutTools,
            archived_at: Utc.timestamp_opt(1_760_000_100, 0).unwrap(),
        }
    }

    fn open_catalog() -> Catalog {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.migrate().unwrap();
        catalog
    }

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let catalog = open_catalog();
        let original = manifest("s1", "myproject");
        catalog.upsert_manifest(&original).unwrap();

        let loaded = catalog.get_manifest("s1").unwrap().unwrap();
        assert_eq!(loaded.title, original.title);
        assert_eq!(loaded.tokens, original.tokens);
        assert_eq!(loaded.filter_policy, FilterPolicy::WithoutTools);
        assert!(loaded.had_auto_compact);
        assert_eq!(loaded.ended_at, original.ended_at);
    }

    #[test]
    fn test_exists_and_missing() {
        let catalog = open_catalog();
        assert!(!catalog.manifest_exists("s1").unwrap());
        catalog.upsert_manifest(&manifest("s1", "myproject")).unwrap();
        assert!(catalog.manifest_exists("s1").unwrap());
        assert!(catalog.get_manifest("other").unwrap().is_none());
    }

    #[test]
    fn test_replace_is_total() {
        let catalog = open_catalog();
        catalog.upsert_manifest(&manifest("s1", "myproject")).unwrap();

        let mut replacement = manifest("s1", "myproject");
        replacement.title = "second extraction".to_string();
        replacement.message_count = 9;
        replacement.filter_policy = FilterPolicy::MessagesOnly;
        catalog.upsert_manifest(&replacement).unwrap();

        let loaded = catalog.get_manifest("s1").unwrap().unwrap();
        assert_eq!(loaded.title, "second extraction");
        assert_eq!(loaded.message_count, 9);
        assert_eq!(loaded.filter_policy, FilterPolicy::MessagesOnly);
    }

    #[test]
    fn test_list_by_project() {
        let catalog = open_catalog();
        catalog.upsert_manifest(&manifest("s1", "alpha")).unwrap();
        let mut later = manifest("s2", "alpha");
        later.ended_at = Utc.timestamp_opt(1_760_010_000, 0).unwrap();
        catalog.upsert_manifest(&later).unwrap();
        catalog.upsert_manifest(&manifest("s3", "beta")).unwrap();

        let alpha = catalog.list_project_manifests("alpha").unwrap();
        assert_eq!(alpha.len(), 2);
        // Most recent first
        assert_eq!(alpha[0].id, "s2");

        assert_eq!(catalog.list_project_slugs().unwrap(), vec!["alpha", "beta"]);

        let stats = catalog.project_stats("alpha").unwrap();
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.tokens.input, 240);
    }
}
