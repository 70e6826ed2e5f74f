//! Scenario generation (spec §4.5): conditional on the `TestFlows` module,
//! takes the synthesis result and produces an ordered, named scenario list
//! consumed later by the test executor.

use serde::{Deserialize, Serialize};

use qa_core::{AgentError, LlmClient, LlmUsage, Message};
use store::models::Module;

use crate::repair::parse_with_repair;
use crate::retry::with_backoff;
use crate::schema::scenario_prompt;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub intent: String,
    #[serde(rename = "acceptanceCriteria")]
    pub acceptance_criteria: Vec<String>,
}

pub struct ScenarioOutcome {
    pub scenarios: Vec<Scenario>,
    pub usage: LlmUsage,
}

/// Whether scenario generation should run at all for this analysis (spec
/// §4.5: "Its presence is conditional on the TestFlows module").
pub fn enabled(modules: &[Module]) -> bool {
    modules.contains(&Module::TestFlows)
}

pub async fn generate(llm: &dyn LlmClient, synthesis_result: &serde_json::Value) -> Result<ScenarioOutcome, AgentError> {
    let prompt = format!(
        "{}\n\nSynthesis result:\n{}",
        scenario_prompt(),
        serde_json::to_string(synthesis_result).unwrap_or_default()
    );
    let messages = vec![Message::user_text(prompt)];

    let response = with_backoff(|| llm.complete(scenario_prompt(), &[], &messages)).await?;

    let raw_text = response
        .reasoning_text()
        .ok_or_else(|| AgentError::LlmProtocol("scenario response contained no text content".to_string()))?;

    let (value, _repair_warning) = parse_with_repair(&raw_text)
        .map_err(|e| AgentError::LlmProtocol(format!("scenario response was not valid JSON: {e}")))?;

    let scenarios: Vec<Scenario> = serde_json::from_value(value)
        .map_err(|e| AgentError::LlmProtocol(format!("scenario response did not match the expected shape: {e}")))?;

    Ok(ScenarioOutcome {
        scenarios,
        usage: response.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_requires_the_test_flows_module() {
        assert!(!enabled(&[Module::UiUx]));
        assert!(enabled(&[Module::TestFlows, Module::UiUx]));
    }
}
