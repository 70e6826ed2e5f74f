//! Append-only `agent_steps` table (spec §3 Agent Step): one row per tool
//! invocation, dense strictly-increasing step numbers enforced by the
//! `(analysis_id, step_number)` primary key.

use std::path::{Path, PathBuf};

use rusqlite::params;

use crate::models::AgentStepRow;
use crate::schema;
use crate::StoreError;

#[derive(Clone)]
pub struct StepStore {
    db_path: PathBuf,
    screenshots_root: PathBuf,
}

fn row_to_step(row: &rusqlite::Row) -> rusqlite::Result<AgentStepRow> {
    let input_str: String = row.get("input")?;
    Ok(AgentStepRow {
        analysis_id: row.get("analysis_id")?,
        step_number: row.get::<_, i64>("step_number")? as u32,
        tool_name: row.get("tool_name")?,
        input: serde_json::from_str(&input_str).unwrap_or(serde_json::Value::Null),
        result_summary: row.get("result_summary")?,
        screenshot_path: row.get("screenshot_path")?,
        duration_ms: row.get::<_, i64>("duration_ms")? as u64,
        thinking_ms: row.get::<_, Option<i64>>("thinking_ms")?.map(|v| v as u64),
        error: row.get("error")?,
        reasoning: row.get("reasoning")?,
        input_tokens: row.get::<_, i64>("input_tokens")? as u64,
        output_tokens: row.get::<_, i64>("output_tokens")? as u64,
        cache_creation_tokens: row.get::<_, i64>("cache_creation_tokens")? as u64,
        cache_read_tokens: row.get::<_, i64>("cache_read_tokens")? as u64,
        credits: row.get("credits")?,
        created_at_unix_ms: row.get("created_at")?,
    })
}

impl StepStore {
    pub fn open(db_path: impl Into<PathBuf>, screenshots_root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        schema::open_and_migrate(&db_path)?;
        Ok(Self {
            db_path,
            screenshots_root: screenshots_root.into(),
        })
    }

    /// `{screenshots_root}/{analysisID}/step-{n}.webp` (spec §6 on-disk layout).
    pub fn screenshot_path(&self, analysis_id: &str, step_number: u32) -> PathBuf {
        self.screenshots_root.join(analysis_id).join(format!("step-{step_number}.webp"))
    }

    /// Writes the screenshot bytes to disk under the analysis's directory,
    /// `O_CREATE|O_EXCL` (spec §5 shared-resource policy: the writer is the
    /// agent loop, never overwriting a step's screenshot once written), then
    /// returns the path. Call this and let it complete *before* broadcasting
    /// the corresponding `agent_screenshot` event (spec §4.6 persist-first).
    pub async fn write_screenshot(
        &self,
        analysis_id: &str,
        step_number: u32,
        webp_bytes: Vec<u8>,
    ) -> Result<PathBuf, StoreError> {
        let path = self.screenshot_path(analysis_id, step_number);
        let dir = path.parent().unwrap().to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            std::fs::create_dir_all(&dir).map_err(StoreError::Io)?;
            let mut file = std::fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&path)
                .map_err(StoreError::Io)?;
            use std::io::Write;
            file.write_all(&webp_bytes).map_err(StoreError::Io)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;
        Ok(self.screenshot_path(analysis_id, step_number))
    }

    pub async fn append(&self, step: AgentStepRow) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                r#"
                INSERT INTO agent_steps (
                    analysis_id, step_number, tool_name, input, result_summary,
                    screenshot_path, duration_ms, thinking_ms, error, reasoning,
                    input_tokens, output_tokens, cache_creation_tokens,
                    cache_read_tokens, credits, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                "#,
                params![
                    step.analysis_id,
                    step.step_number,
                    step.tool_name,
                    step.input.to_string(),
                    step.result_summary,
                    step.screenshot_path.as_ref().map(|p| p.to_string()),
                    step.duration_ms as i64,
                    step.thinking_ms.map(|v| v as i64),
                    step.error,
                    step.reasoning,
                    step.input_tokens as i64,
                    step.output_tokens as i64,
                    step.cache_creation_tokens as i64,
                    step.cache_read_tokens as i64,
                    step.credits,
                    step.created_at_unix_ms,
                ],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn list(&self, analysis_id: &str) -> Result<Vec<AgentStepRow>, StoreError> {
        let db_path = self.db_path.clone();
        let analysis_id = analysis_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_reader(&db_path)?;
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM agent_steps WHERE analysis_id = ?1 ORDER BY step_number ASC",
                )
                .map_err(StoreError::Sqlite)?;
            let rows = stmt
                .query_map(params![analysis_id], row_to_step)
                .map_err(StoreError::Sqlite)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::Sqlite)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Removes the on-disk screenshot directory for an analysis. Paired with
    /// `AnalysisStore::delete`'s cascading row delete (spec §3).
    pub async fn remove_screenshot_dir(&self, analysis_id: &str) -> Result<(), StoreError> {
        let dir = self.screenshots_root.join(analysis_id);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(StoreError::Io)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_step(analysis_id: &str, n: u32) -> AgentStepRow {
        AgentStepRow {
            analysis_id: analysis_id.to_string(),
            step_number: n,
            tool_name: "screenshot".into(),
            input: serde_json::json!({}),
            result_summary: "captured".into(),
            screenshot_path: None,
            duration_ms: 120,
            thinking_ms: Some(900),
            error: None,
            reasoning: Some("let's look around".into()),
            input_tokens: 100,
            output_tokens: 20,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            credits: 0.01,
            created_at_unix_ms: 1_000 + n as i64,
        }
    }

    #[tokio::test]
    async fn steps_are_listed_in_step_number_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = StepStore::open(dir.path().join("db.sqlite"), dir.path().join("screenshots")).unwrap();
        store.append(sample_step("a1", 2)).await.unwrap();
        store.append(sample_step("a1", 1)).await.unwrap();
        let steps = store.list("a1").await.unwrap();
        assert_eq!(steps.iter().map(|s| s.step_number).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_step_number_for_same_analysis_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = StepStore::open(dir.path().join("db.sqlite"), dir.path().join("screenshots")).unwrap();
        store.append(sample_step("a1", 1)).await.unwrap();
        let err = store.append(sample_step("a1", 1)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn write_screenshot_then_path_resolves_to_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StepStore::open(dir.path().join("db.sqlite"), dir.path().join("screenshots")).unwrap();
        let path = store.write_screenshot("a1", 3, vec![1, 2, 3, 4]).await.unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn remove_screenshot_dir_deletes_everything_for_the_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let store = StepStore::open(dir.path().join("db.sqlite"), dir.path().join("screenshots")).unwrap();
        store.write_screenshot("a1", 1, vec![9]).await.unwrap();
        store.remove_screenshot_dir("a1").await.unwrap();
        assert!(!store.screenshot_path("a1", 1).exists());
    }
}
