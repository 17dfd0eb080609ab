//! Catalog schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: manifests
    r#"
    CREATE TABLE IF NOT EXISTS manifests (
        id                    TEXT PRIMARY KEY,
        title                 TEXT NOT NULL,
        project_slug          TEXT NOT NULL,
        ended_at              DATETIME NOT NULL,
        duration_minutes      INTEGER NOT NULL,
        message_count         INTEGER NOT NULL,
        tool_call_count       INTEGER NOT NULL,
        tokens_in             INTEGER NOT NULL,
        tokens_out            INTEGER NOT NULL,
        tokens_cache_creation INTEGER NOT NULL,
        tokens_cache_read     INTEGER NOT NULL,
        had_auto_compact      INTEGER NOT NULL,
        plan_count            INTEGER NOT NULL,
        handoff_count         INTEGER NOT NULL,
        model                 TEXT,
        filter_policy         TEXT NOT NULL,
        archived_at           DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_manifests_project
        ON manifests(project_slug, ended_at DESC);
    "#,
];

/// Apply any pending migrations.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    let current: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current {
            conn.execute_batch(migration)?;
            conn.pragma_update(None, "user_version", version)?;
        }
    }

    debug_assert_eq!(MIGRATIONS.len() as i32, SCHEMA_VERSION);
    Ok(())
}
