//! Scripted [`LlmClient`] for deterministic tests: a fixed queue of
//! responses, returned in order regardless of what's asked. Exhausting the
//! queue is a test bug, not a retryable condition, so it panics rather than
//! returning an `AgentError`.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;
use crate::tool_source::ToolSpec;

use super::{LlmClient, LlmResponse, LlmUsage, StopReason};

pub struct MockLlm {
    responses: Mutex<Vec<LlmResponse>>,
    calls: Mutex<Vec<CallRecord>>,
}

pub struct CallRecord {
    pub system: String,
    pub message_count: usize,
}

impl MockLlm {
    /// Responses are popped front-to-back in call order.
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock").len()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls
            .lock()
            .expect("mock lock")
            .iter()
            .map(|c| CallRecord {
                system: c.system.clone(),
                message_count: c.message_count,
            })
            .collect()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        system: &str,
        _tools: &[ToolSpec],
        messages: &[Message],
    ) -> Result<LlmResponse, AgentError> {
        self.calls.lock().expect("mock lock").push(CallRecord {
            system: system.to_string(),
            message_count: messages.len(),
        });
        let mut queue = self.responses.lock().expect("mock lock");
        if queue.is_empty() {
            panic!("MockLlm: response queue exhausted after {} calls", {
                drop(queue);
                self.call_count()
            });
        }
        Ok(queue.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ContentBlock;

    fn text_response(text: &str) -> LlmResponse {
        LlmResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: LlmUsage::default(),
        }
    }

    #[tokio::test]
    async fn returns_responses_in_order() {
        let mock = MockLlm::new(vec![text_response("first"), text_response("second")]);
        let r1 = mock.complete("sys", &[], &[]).await.unwrap();
        let r2 = mock.complete("sys", &[], &[]).await.unwrap();
        assert_eq!(r1.reasoning_text().unwrap(), "first");
        assert_eq!(r2.reasoning_text().unwrap(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    #[should_panic(expected = "response queue exhausted")]
    async fn panics_when_queue_exhausted() {
        let mock = MockLlm::new(vec![]);
        let _ = mock.complete("sys", &[], &[]).await;
    }
}
