//! Progress-event kinds and payloads (spec §4.2 step 3, §6).
//!
//! The wire envelope is flat — `{ type, analysisId, step, data }` — rather
//! than an internally-tagged enum with inline fields, so `data` is typed
//! per kind and attached separately (see `envelope::ProgressEvent`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of event kinds a supervisor emits, plus the two open
/// families (`flows_*`, `test_plan_*`) whose suffix names a flow/test-plan
/// lifecycle stage the test executor defines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Scouting,
    AgentStep,
    AgentStepDetail,
    AgentReasoning,
    AgentScreenshot,
    AgentAdaptive,
    AgentTimeoutExtend,
    Synthesis,
    SynthesisRetry,
    CostEstimate,
    AnalysisFailed,
    /// `flows_<suffix>`, e.g. `flows_generated`, `flows_failed`.
    Flows(String),
    /// `test_plan_<suffix>`, e.g. `test_plan_started`, `test_plan_completed`.
    TestPlan(String),
}

impl EventKind {
    fn as_wire_str(&self) -> String {
        match self {
            EventKind::Scouting => "scouting".to_string(),
            EventKind::AgentStep => "agent_step".to_string(),
            EventKind::AgentStepDetail => "agent_step_detail".to_string(),
            EventKind::AgentReasoning => "agent_reasoning".to_string(),
            EventKind::AgentScreenshot => "agent_screenshot".to_string(),
            EventKind::AgentAdaptive => "agent_adaptive".to_string(),
            EventKind::AgentTimeoutExtend => "agent_timeout_extend".to_string(),
            EventKind::Synthesis => "synthesis".to_string(),
            EventKind::SynthesisRetry => "synthesis_retry".to_string(),
            EventKind::CostEstimate => "cost_estimate".to_string(),
            EventKind::AnalysisFailed => "analysis_failed".to_string(),
            EventKind::Flows(suffix) => format!("flows_{suffix}"),
            EventKind::TestPlan(suffix) => format!("test_plan_{suffix}"),
        }
    }

    fn from_wire_str(s: &str) -> Self {
        match s {
            "scouting" => EventKind::Scouting,
            "agent_step" => EventKind::AgentStep,
            "agent_step_detail" => EventKind::AgentStepDetail,
            "agent_reasoning" => EventKind::AgentReasoning,
            "agent_screenshot" => EventKind::AgentScreenshot,
            "agent_adaptive" => EventKind::AgentAdaptive,
            "agent_timeout_extend" => EventKind::AgentTimeoutExtend,
            "synthesis" => EventKind::Synthesis,
            "synthesis_retry" => EventKind::SynthesisRetry,
            "cost_estimate" => EventKind::CostEstimate,
            "analysis_failed" => EventKind::AnalysisFailed,
            other => {
                if let Some(suffix) = other.strip_prefix("flows_") {
                    EventKind::Flows(suffix.to_string())
                } else if let Some(suffix) = other.strip_prefix("test_plan_") {
                    EventKind::TestPlan(suffix.to_string())
                } else {
                    EventKind::TestPlan(other.to_string())
                }
            }
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_wire_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::from_wire_str(&s))
    }
}

/// `cost_estimate` payload (spec §6): token totals plus the derived credit
/// and USD figures, emitted once on termination.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimateData {
    pub input: u64,
    pub output: u64,
    pub cache_creation: u64,
    pub cache_read: u64,
    pub api_calls: u32,
    pub credits: f64,
    pub usd: f64,
}

/// `agent_screenshot` payload: the screenshot is already on disk by the
/// time this is broadcast, so only its URL travels on the wire.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentScreenshotData {
    pub step: u32,
    pub url: String,
}

/// `analysis_failed` payload: a user-facing message plus whatever
/// checkpoint-derived partial result survived (spec §4.2, test scenario 2).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisFailedData {
    pub message: String,
    pub partial_result: Option<Value>,
}

/// `agent_adaptive` / `agent_timeout_extend` payload: what was granted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveGrantData {
    pub granted_steps: Option<u32>,
    pub granted_time_ms: Option<i64>,
    pub new_step_ceiling: u32,
    pub new_deadline_unix_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds_round_trip_through_json() {
        for kind in [
            EventKind::Scouting,
            EventKind::AgentStepDetail,
            EventKind::CostEstimate,
            EventKind::Flows("generated".to_string()),
            EventKind::TestPlan("started".to_string()),
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            let back: EventKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn flows_family_uses_the_suffix_as_the_wire_tag() {
        let kind = EventKind::Flows("failed".to_string());
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"flows_failed\"");
    }
}
