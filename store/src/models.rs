//! Row types for the three persisted tables (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an [`Analysis`]. Transitions: `Queued -> Running ->
/// {Completed, Failed}`, never re-used (spec §3 Lifecycle).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Queued => "queued",
            AnalysisStatus::Running => "running",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "running" => AnalysisStatus::Running,
            "completed" => AnalysisStatus::Completed,
            "failed" => AnalysisStatus::Failed,
            _ => AnalysisStatus::Queued,
        }
    }
}

/// One of the module toggles a `StartAnalysisRequest` may enable (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    UiUx,
    Wording,
    GameDesign,
    TestFlows,
    Gli,
    RunTests,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::UiUx => "ui_ux",
            Module::Wording => "wording",
            Module::GameDesign => "game_design",
            Module::TestFlows => "test_flows",
            Module::Gli => "gli",
            Module::RunTests => "run_tests",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "ui_ux" => Module::UiUx,
            "wording" => Module::Wording,
            "game_design" => Module::GameDesign,
            "test_flows" => Module::TestFlows,
            "gli" => Module::Gli,
            "run_tests" => Module::RunTests,
            _ => return None,
        })
    }

    /// Serializes a module set the way it's stored in the `modules` column:
    /// comma-joined wire names, order-preserving.
    pub fn join(modules: &[Module]) -> String {
        modules.iter().map(Module::as_str).collect::<Vec<_>>().join(",")
    }

    /// Parses the `modules` column; unknown tokens are dropped rather than
    /// erroring, matching the admission layer's "module toggles are
    /// silently clamped" rule (spec §4.1).
    pub fn split(s: &str) -> Vec<Module> {
        s.split(',').filter(|t| !t.is_empty()).filter_map(Module::parse).collect()
    }
}

/// Viewport preset name, stored verbatim; unknown names fall back to a
/// default at admission time rather than here (spec §4.1).
pub type ViewportName = String;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub url: String,
    pub status: AnalysisStatus,
    pub current_step: String,
    pub modules: Vec<Module>,
    pub profile: String,
    pub agent_mode: bool,
    pub viewport: ViewportName,
    pub device_pixel_ratio: f64,
    pub adaptive_steps: bool,
    pub adaptive_time: bool,
    pub max_total_steps: Option<u32>,
    pub max_total_timeout_ms: Option<i64>,
    pub creator: Option<String>,
    pub project_id: Option<String>,
    pub created_at_unix_ms: i64,
    pub updated_at_unix_ms: i64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub credits: f64,
    pub api_call_count: u32,
    pub last_test_run_id: Option<String>,
    pub result: Option<Value>,
    pub partial_checkpoint: Option<Value>,
    pub error: Option<String>,
}

impl Analysis {
    /// A freshly admitted analysis: `queued`, step `queued`, zeroed counters
    /// (spec §4.1).
    #[allow(clippy::too_many_arguments)]
    pub fn new_queued(
        id: impl Into<String>,
        url: impl Into<String>,
        modules: Vec<Module>,
        profile: impl Into<String>,
        agent_mode: bool,
        viewport: impl Into<String>,
        device_pixel_ratio: f64,
        adaptive_steps: bool,
        adaptive_time: bool,
        creator: Option<String>,
        project_id: Option<String>,
        now_unix_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            status: AnalysisStatus::Queued,
            current_step: "queued".to_string(),
            modules,
            profile: profile.into(),
            agent_mode,
            viewport: viewport.into(),
            device_pixel_ratio,
            adaptive_steps,
            adaptive_time,
            max_total_steps: None,
            max_total_timeout_ms: None,
            creator,
            project_id,
            created_at_unix_ms: now_unix_ms,
            updated_at_unix_ms: now_unix_ms,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            credits: 0.0,
            api_call_count: 0,
            last_test_run_id: None,
            result: None,
            partial_checkpoint: None,
            error: None,
        }
    }
}

/// Persisted form of `qa_core::agent::explore::ExplorationStep`, plus the
/// `analysis_id` foreign key (spec §3 Agent Step).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentStepRow {
    pub analysis_id: String,
    pub step_number: u32,
    pub tool_name: String,
    pub input: Value,
    pub result_summary: String,
    pub screenshot_path: Option<String>,
    pub duration_ms: u64,
    pub thinking_ms: Option<u64>,
    pub error: Option<String>,
    pub reasoning: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub credits: f64,
    pub created_at_unix_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestRunMode {
    Agent,
    Browser,
    Maestro,
}

impl TestRunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestRunMode::Agent => "agent",
            TestRunMode::Browser => "browser",
            TestRunMode::Maestro => "maestro",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "browser" => TestRunMode::Browser,
            "maestro" => TestRunMode::Maestro,
            _ => TestRunMode::Agent,
        }
    }
}

/// One scenario's outcome within a [`TestRun`] (spec §3 Test Run).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub passed: bool,
    pub duration_ms: u64,
    pub reasoning: Option<String>,
    /// Step numbers (within the test run's own agent-step sequence) that
    /// evidence this scenario's outcome.
    pub step_refs: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub plan_id: Option<String>,
    pub analysis_id: Option<String>,
    pub mode: TestRunMode,
    pub scenario_results: Vec<ScenarioOutcome>,
    pub success_rate: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub credits: f64,
    pub created_at_unix_ms: i64,
    pub project_id: Option<String>,
}

impl TestRun {
    pub fn success_rate_of(results: &[ScenarioOutcome]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        let passed = results.iter().filter(|r| r.passed).count();
        passed as f64 / results.len() as f64
    }
}
