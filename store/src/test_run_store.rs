//! Persistence for [`TestRun`] rows (spec §3 Test Run): scenario
//! pass/fail outcomes and token/credit totals for a `RunTests` execution.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use crate::models::{ScenarioOutcome, TestRun, TestRunMode};
use crate::schema;
use crate::StoreError;

#[derive(Clone)]
pub struct TestRunStore {
    db_path: PathBuf,
}

fn row_to_test_run(row: &rusqlite::Row) -> rusqlite::Result<TestRun> {
    let scenarios_str: String = row.get("scenario_results")?;
    Ok(TestRun {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        analysis_id: row.get("analysis_id")?,
        mode: TestRunMode::parse(&row.get::<_, String>("mode")?),
        scenario_results: serde_json::from_str::<Vec<ScenarioOutcome>>(&scenarios_str).unwrap_or_default(),
        success_rate: row.get("success_rate")?,
        input_tokens: row.get::<_, i64>("input_tokens")? as u64,
        output_tokens: row.get::<_, i64>("output_tokens")? as u64,
        credits: row.get("credits")?,
        created_at_unix_ms: row.get("created_at")?,
        project_id: row.get("project_id")?,
    })
}

impl TestRunStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = db_path.into();
        schema::open_and_migrate(&db_path)?;
        Ok(Self { db_path })
    }

    pub async fn insert(&self, run: TestRun) -> Result<(), StoreError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_and_migrate(&db_path)?;
            conn.execute(
                r#"
                INSERT INTO test_runs (
                    id, plan_id, analysis_id, mode, scenario_results, success_rate,
                    input_tokens, output_tokens, credits, created_at, project_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    run.id,
                    run.plan_id,
                    run.analysis_id,
                    run.mode.as_str(),
                    serde_json::to_string(&run.scenario_results).unwrap_or_default(),
                    run.success_rate,
                    run.input_tokens as i64,
                    run.output_tokens as i64,
                    run.credits,
                    run.created_at_unix_ms,
                    run.project_id,
                ],
            )
            .map_err(StoreError::Sqlite)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    pub async fn get(&self, id: &str) -> Result<Option<TestRun>, StoreError> {
        let db_path = self.db_path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = schema::open_reader(&db_path)?;
            conn.query_row("SELECT * FROM test_runs WHERE id = ?1", params![id], row_to_test_run)
                .optional()
                .map_err(StoreError::Sqlite)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_get_round_trips_scenario_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = TestRunStore::open(dir.path().join("db.sqlite")).unwrap();
        let results = vec![
            ScenarioOutcome {
                name: "start game".into(),
                passed: true,
                duration_ms: 500,
                reasoning: Some("reached the menu".into()),
                step_refs: vec![1, 2],
            },
            ScenarioOutcome {
                name: "lose condition".into(),
                passed: false,
                duration_ms: 900,
                reasoning: Some("never triggered".into()),
                step_refs: vec![3],
            },
        ];
        let run = TestRun {
            id: "tr-1".into(),
            plan_id: None,
            analysis_id: Some("a1".into()),
            mode: TestRunMode::Agent,
            success_rate: TestRun::success_rate_of(&results),
            scenario_results: results,
            input_tokens: 500,
            output_tokens: 100,
            credits: 0.2,
            created_at_unix_ms: 1_000,
            project_id: None,
        };
        store.insert(run).await.unwrap();
        let loaded = store.get("tr-1").await.unwrap().unwrap();
        assert_eq!(loaded.scenario_results.len(), 2);
        assert_eq!(loaded.success_rate, 0.5);
    }
}
