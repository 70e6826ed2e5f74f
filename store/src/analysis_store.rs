//! CRUD for the `analyses` table plus the crash-recovery sweep (spec §3:
//! "On process crash, orphaned `running` records are swept to `failed` at
//! startup").

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use crate::models::{Analysis, AnalysisStatus, Module};
use crate::schema;
use crate::StoreError;

#[derive(Clone)]
pub struct AnalysisStore {
    db_path: PathBuf,
}

fn row_to_analysis(row: &rusqlite::Row) -> rusqlite::Result<Analysis> {
    let modules_str: String = row.get("modules")?;
    let result_str: Option<String> = row.get("result")?;
    let checkpoint_str: Option<String> = row.get("partial_checkpoint")?;
    Ok(Analysis {
        id: row.get("id")?,
        url: row.get("url")?,
        status: AnalysisStatus::parse(&row.get::<_, String>("status")?),
        current_step: row.get("current_step")?,
        modules: Module::split(&modules_str),
        profile: row.get("profile")?,
        agent_mode: row.get::<_, i64>("agent_mode")? != 0,
        viewport: row.get("viewport")?,
        device_pixel_ratio: row.get("device_pixel_ratio")?,
        adaptive_steps: row.get::<_, i64>("adaptive_steps")? != 0,
        adaptive_time: row.get::<_, i64>("adaptive_time")? != 0,
        max_total_steps: row.get::<_, Option<i64>>("max_total_steps")?.map(|v| v as u32),
        max_total_timeout_ms: row.get("max_total_timeout_ms")?,
        creator: row.get("creator")?,
        project_id: row.get("project_id")?,
        created_at_unix_ms: row.get("created_at")?,
        updated_at_unix_ms: row.get("updated_at")?,
        input_tokens: row.get::<_, i64>("input_tokens")? as u64,
        output_tokens: row.get::<_, i64>("output_tokens")? as u64,
        cache_creation_tokens: row.get::<_, i64>("cache_creation_tokens")? as u64,
        cache_read_tokens: row.get::<_, i64>("cache_read_tokens")? as u64,
        credits: row.get("credits")?,
        api_call_count: row.get::<_, i64>("api_call_count")? as u32,
        last_test_run_id: row.get("last_test_run_id")?,
        result: result_str.and_then(|s| serde_json::from_str(&s).ok()),
        partial_checkpoint: checkpoint_str.and_then(|s| serde_json::from_str(&s).ok()),
        error: row.get("error")?,
    })
}

impl AnalysisStore {
    /// Opens (creating if needed) the database at `db_path` and runs
    /// migrations. Call once per process; subsequent operations each open
    /// their own short-lived connection via `spawn_blocking`.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        schema::open_and_migrate(&db_path)?;
        Ok(Self { db_path })
    }

    pub async fn insert(&self, analysis: Analysis) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                r#"
                INSERT INTO analyses (
                    id, url, status, current_step, modules, profile, agent_mode,
                    viewport, device_pixel_ratio, adaptive_steps, adaptive_time,
                    max_total_steps, max_total_timeout_ms, creator, project_id,
                    created_at, updated_at, input_tokens, output_tokens,
                    cache_creation_tokens, cache_read_tokens, credits, api_call_count,
                    last_test_run_id, result, partial_checkpoint, error
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
                )
                "#,
                params![
                    analysis.id,
                    analysis.url,
                    analysis.status.as_str(),
                    analysis.current_step,
                    Module::join(&analysis.modules),
                    analysis.profile,
                    analysis.agent_mode as i64,
                    analysis.viewport,
                    analysis.device_pixel_ratio,
                    analysis.adaptive_steps as i64,
                    analysis.adaptive_time as i64,
                    analysis.max_total_steps.map(|v| v as i64),
                    analysis.max_total_timeout_ms,
                    analysis.creator,
                    analysis.project_id,
                    analysis.created_at_unix_ms,
                    analysis.updated_at_unix_ms,
                    analysis.input_tokens as i64,
                    analysis.output_tokens as i64,
                    analysis.cache_creation_tokens as i64,
                    analysis.cache_read_tokens as i64,
                    analysis.credits,
                    analysis.api_call_count as i64,
                    analysis.last_test_run_id,
                    analysis.result.map(|v| v.to_string()),
                    analysis.partial_checkpoint.map(|v| v.to_string()),
                    analysis.error,
                ],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get(&self, id: &str) -> Result<Option<Analysis>, StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_reader(&db_path)?;
            conn.query_row(
                "SELECT * FROM analyses WHERE id = ?1",
                params![id],
                row_to_analysis,
            )
            .optional()
            .map_err(StoreError::Sqlite)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Moves an analysis from `queued` to `running` and sets its first step
    /// label, on admission semaphore acquisition (spec §4.1).
    pub async fn mark_running(&self, id: &str, step: &str, now_unix_ms: i64) -> Result<(), StoreError> {
        self.set_status_and_step(id, AnalysisStatus::Running, step, now_unix_ms).await
    }

    pub async fn set_status_and_step(
        &self,
        id: &str,
        status: AnalysisStatus,
        step: &str,
        now_unix_ms: i64,
    ) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        let step = step.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                "UPDATE analyses SET status = ?1, current_step = ?2, updated_at = ?3 WHERE id = ?4",
                params![status.as_str(), step, now_unix_ms, id],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn set_current_step(&self, id: &str, step: &str, now_unix_ms: i64) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        let step = step.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                "UPDATE analyses SET current_step = ?1, updated_at = ?2 WHERE id = ?3",
                params![step, now_unix_ms, id],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Accumulates token/credit counters (spec §3 invariant: cumulative
    /// totals equal the sum over steps plus synthesis/generation calls).
    pub async fn accumulate_usage(
        &self,
        id: &str,
        input: u64,
        output: u64,
        cache_creation: u64,
        cache_read: u64,
        credits: f64,
        api_calls: u32,
        now_unix_ms: i64,
    ) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                r#"
                UPDATE analyses SET
                    input_tokens = input_tokens + ?1,
                    output_tokens = output_tokens + ?2,
                    cache_creation_tokens = cache_creation_tokens + ?3,
                    cache_read_tokens = cache_read_tokens + ?4,
                    credits = credits + ?5,
                    api_call_count = api_call_count + ?6,
                    updated_at = ?7
                WHERE id = ?8
                "#,
                params![
                    input as i64,
                    output as i64,
                    cache_creation as i64,
                    cache_read as i64,
                    credits,
                    api_calls,
                    now_unix_ms,
                    id,
                ],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn complete(&self, id: &str, result: serde_json::Value, now_unix_ms: i64) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                "UPDATE analyses SET status = 'completed', current_step = 'completed', result = ?1, error = NULL, updated_at = ?2 WHERE id = ?3",
                params![result.to_string(), now_unix_ms, id],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn fail(
        &self,
        id: &str,
        error: &str,
        partial_checkpoint: Option<serde_json::Value>,
        now_unix_ms: i64,
    ) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        let error = error.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                "UPDATE analyses SET status = 'failed', current_step = 'failed', error = ?1, partial_checkpoint = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    error,
                    partial_checkpoint.map(|v| v.to_string()),
                    now_unix_ms,
                    id
                ],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Startup sweep: any analysis still `running` when this process starts
    /// was orphaned by a crash of a previous instance, since exactly one
    /// process owns the admission semaphore slot that would keep it running
    /// (spec §3).
    pub async fn sweep_orphaned_running(&self, now_unix_ms: i64) -> Result<u64, StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            let n = conn
                .execute(
                    "UPDATE analyses SET status = 'failed', current_step = 'failed', \
                     error = 'process crashed before completion', updated_at = ?1 \
                     WHERE status = 'running'",
                    params![now_unix_ms],
                )
                .map_err(StoreError::Sqlite)?;
            Ok(n as u64)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Deletes an analysis and (via `ON DELETE CASCADE`) its steps; the
    /// caller is responsible for removing the on-disk screenshot directory
    /// (spec §3 Agent Step lifecycle).
    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute("DELETE FROM analyses WHERE id = ?1", params![id])
                .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list_for_project(&self, project_id: &str, limit: u32) -> Result<Vec<Analysis>, StoreError> {
        let db_path = self.db_path.clone();
        let project_id = project_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_reader(&db_path)?;
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM analyses WHERE project_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                )
                .map_err(StoreError::Sqlite)?;
            let rows = stmt
                .query_map(params![project_id, limit], row_to_analysis)
                .map_err(StoreError::Sqlite)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Sqlite)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_analysis(id: &str) -> Analysis {
        Analysis::new_queued(
            id,
            "https://example.com/game",
            vec![Module::UiUx, Module::TestFlows],
            "balanced",
            false,
            "desktop",
            1.0,
            false,
            false,
            Some("user-1".into()),
            Some("proj-1".into()),
            1_000,
        )
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::open(dir.path().join("db.sqlite")).unwrap();
        store.insert(test_analysis("a1")).await.unwrap();
        let loaded = store.get("a1").await.unwrap().unwrap();
        assert_eq!(loaded.url, "https://example.com/game");
        assert_eq!(loaded.modules, vec![Module::UiUx, Module::TestFlows]);
        assert_eq!(loaded.status, AnalysisStatus::Queued);
    }

    #[tokio::test]
    async fn sweep_orphaned_running_fails_running_rows_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::open(dir.path().join("db.sqlite")).unwrap();
        store.insert(test_analysis("running-one")).await.unwrap();
        store
            .set_status_and_step("running-one", AnalysisStatus::Running, "scouting", 1_000)
            .await
            .unwrap();
        store.insert(test_analysis("still-queued")).await.unwrap();

        let swept = store.sweep_orphaned_running(2_000).await.unwrap();
        assert_eq!(swept, 1);

        let a = store.get("running-one").await.unwrap().unwrap();
        assert_eq!(a.status, AnalysisStatus::Failed);
        assert!(a.error.is_some());

        let b = store.get("still-queued").await.unwrap().unwrap();
        assert_eq!(b.status, AnalysisStatus::Queued);
    }

    #[tokio::test]
    async fn complete_requires_non_null_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = AnalysisStore::open(dir.path().join("db.sqlite")).unwrap();
        store.insert(test_analysis("a1")).await.unwrap();
        store
            .complete("a1", serde_json::json!({"gameInfo": {}}), 2_000)
            .await
            .unwrap();
        let a = store.get("a1").await.unwrap().unwrap();
        assert_eq!(a.status, AnalysisStatus::Completed);
        assert!(a.result.is_some());
        assert!(a.error.is_none());
    }
}
