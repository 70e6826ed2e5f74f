//! The synthesis call (spec §4.5): conditional schema prompt in, structured
//! findings JSON out, with JSON repair on a `max_tokens` stop and retry with
//! backoff on transient failures.

use qa_core::{AgentError, LlmClient, LlmUsage, Message, StopReason};
use store::models::Module;

use crate::repair::parse_with_repair;
use crate::retry::with_backoff;
use crate::schema::findings_prompt;
use crate::transcript::strip_screenshots;

pub struct SynthesisOutcome {
    pub findings: serde_json::Value,
    pub usage: LlmUsage,
    pub repair_warning: Option<String>,
}

/// Runs the synthesis call against the pruned (screenshot-free) transcript,
/// retrying transient failures with backoff and repairing a truncated
/// `max_tokens` response before giving up.
pub async fn synthesize(
    llm: &dyn LlmClient,
    modules: &[Module],
    transcript: &[Message],
) -> Result<SynthesisOutcome, AgentError> {
    let system = findings_prompt(modules);
    let pruned = strip_screenshots(transcript);

    let response = with_backoff(|| llm.complete(&system, &[], &pruned)).await?;

    let raw_text = response.reasoning_text().ok_or_else(|| {
        AgentError::LlmProtocol("synthesis response contained no text content".to_string())
    })?;

    let (findings, repair_warning) = parse_with_repair(&raw_text).map_err(|e| {
        AgentError::LlmProtocol(format!("synthesis response was not valid JSON: {e}"))
    })?;

    if response.stop_reason == StopReason::MaxTokens && repair_warning.is_none() {
        tracing::warn!("synthesis response stopped at max_tokens but parsed without repair");
    }

    Ok(SynthesisOutcome {
        findings,
        usage: response.usage,
        repair_warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qa_core::tool_source::ToolSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        responses: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _system: &str,
            _tools: &[ToolSpec],
            _messages: &[Message],
        ) -> Result<qa_core::LlmResponse, AgentError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self.responses[idx.min(self.responses.len() - 1)];
            Ok(qa_core::LlmResponse {
                content: vec![qa_core::ContentBlock::text(text)],
                stop_reason: StopReason::EndTurn,
                usage: LlmUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn parses_a_well_formed_findings_response() {
        let llm = ScriptedLlm {
            responses: vec![r#"{"gameInfo": {"title": "Demo"}, "mechanics": []}"#],
            calls: AtomicUsize::new(0),
        };
        let transcript = vec![Message::user_text("explore the game")];
        let outcome = synthesize(&llm, &[], &transcript).await.unwrap();
        assert_eq!(outcome.findings["gameInfo"]["title"], "Demo");
        assert!(outcome.repair_warning.is_none());
    }

    #[tokio::test]
    async fn repairs_a_truncated_findings_response() {
        let llm = ScriptedLlm {
            responses: vec![r#"{"gameInfo": {"title": "Demo"}, "mechanics": ["jump"#],
            calls: AtomicUsize::new(0),
        };
        let transcript = vec![Message::user_text("explore the game")];
        let outcome = synthesize(&llm, &[], &transcript).await.unwrap();
        assert_eq!(outcome.findings["mechanics"][0], "jump");
        assert!(outcome.repair_warning.is_some());
    }
}
