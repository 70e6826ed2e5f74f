//! Table definitions and connection pragmas (spec §4.6 "Database discipline").
//!
//! A single-writer SQLite file: WAL journal mode plus a busy-timeout PRAGMA
//! so concurrent readers never see `SQLITE_BUSY` under normal load, and
//! composite indexes matching the spec's project-scoped list queries.

use rusqlite::Connection;

use crate::StoreError;

/// Opens `path`, applying the pragmas every connection in this crate needs,
/// then ensures all tables exist. Safe to call from multiple threads/processes
/// against the same file; `CREATE TABLE IF NOT EXISTS` and `journal_mode=WAL`
/// are both idempotent.
pub fn open_and_migrate(path: &std::path::Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
    apply_pragmas(&conn)?;
    migrate(&conn)?;
    Ok(conn)
}

/// Opens a connection with pragmas applied but does not migrate; used by
/// read-only handlers (e.g. serving `/screenshots/...`) that only need the
/// busy-timeout/WAL behavior, not DDL privileges.
pub fn open_reader(path: &std::path::Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(StoreError::Sqlite)?;
    // Recommended minimum per spec §4.6; generous enough that a momentary
    // writer transaction never surfaces SQLITE_BUSY to a reader.
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(StoreError::Sqlite)?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(StoreError::Sqlite)?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            id                      TEXT PRIMARY KEY,
            url                     TEXT NOT NULL,
            status                  TEXT NOT NULL,
            current_step            TEXT NOT NULL,
            modules                 TEXT NOT NULL,
            profile                 TEXT NOT NULL,
            agent_mode              INTEGER NOT NULL DEFAULT 0,
            viewport                TEXT NOT NULL,
            device_pixel_ratio      REAL NOT NULL DEFAULT 1.0,
            adaptive_steps          INTEGER NOT NULL DEFAULT 0,
            adaptive_time           INTEGER NOT NULL DEFAULT 0,
            max_total_steps         INTEGER,
            max_total_timeout_ms    INTEGER,
            creator                 TEXT,
            project_id              TEXT,
            created_at              INTEGER NOT NULL,
            updated_at              INTEGER NOT NULL,
            input_tokens            INTEGER NOT NULL DEFAULT 0,
            output_tokens           INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens   INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens       INTEGER NOT NULL DEFAULT 0,
            credits                 REAL NOT NULL DEFAULT 0.0,
            api_call_count          INTEGER NOT NULL DEFAULT 0,
            last_test_run_id        TEXT,
            result                  TEXT,
            partial_checkpoint      TEXT,
            error                   TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_analyses_project_created
            ON analyses (project_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS agent_steps (
            analysis_id             TEXT NOT NULL REFERENCES analyses(id) ON DELETE CASCADE,
            step_number             INTEGER NOT NULL,
            tool_name               TEXT NOT NULL,
            input                   TEXT NOT NULL,
            result_summary          TEXT NOT NULL,
            screenshot_path         TEXT,
            duration_ms             INTEGER NOT NULL,
            thinking_ms             INTEGER,
            error                   TEXT,
            reasoning               TEXT,
            input_tokens            INTEGER NOT NULL DEFAULT 0,
            output_tokens           INTEGER NOT NULL DEFAULT 0,
            cache_creation_tokens   INTEGER NOT NULL DEFAULT 0,
            cache_read_tokens       INTEGER NOT NULL DEFAULT 0,
            credits                 REAL NOT NULL DEFAULT 0.0,
            created_at              INTEGER NOT NULL,
            PRIMARY KEY (analysis_id, step_number)
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_steps_analysis_step
            ON agent_steps (analysis_id, step_number);

        CREATE TABLE IF NOT EXISTS test_runs (
            id                      TEXT PRIMARY KEY,
            plan_id                 TEXT,
            analysis_id             TEXT REFERENCES analyses(id) ON DELETE SET NULL,
            mode                    TEXT NOT NULL,
            scenario_results        TEXT NOT NULL,
            success_rate            REAL NOT NULL DEFAULT 0.0,
            input_tokens            INTEGER NOT NULL DEFAULT 0,
            output_tokens           INTEGER NOT NULL DEFAULT 0,
            credits                 REAL NOT NULL DEFAULT 0.0,
            created_at              INTEGER NOT NULL,
            project_id              TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_test_runs_project_created
            ON test_runs (project_id, created_at DESC);
        "#,
    )
    .map_err(StoreError::Sqlite)
}
