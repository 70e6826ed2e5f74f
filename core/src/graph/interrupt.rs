//! Human-in-the-loop interrupts: a node can raise a [`GraphInterrupt`] to pause
//! a run and hand control back to the caller before resuming from a checkpoint.

use async_trait::async_trait;
use serde_json::Value;

/// Raised by a node to pause execution. The compiled graph surfaces this to
/// whoever called `invoke`/`stream`; resuming is done by re-invoking with a
/// checkpoint and an updated `RunnableConfig`.
#[derive(Clone, Debug)]
pub struct GraphInterrupt {
    pub node_id: String,
    pub reason: String,
    pub payload: Option<Value>,
}

impl GraphInterrupt {
    pub fn new(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            reason: reason.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// What to do with a raised interrupt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// Stop the run and return the interrupt to the caller.
    Pause,
    /// Ignore the interrupt and continue as if the node had not raised it.
    Ignore,
}

/// Decides how a [`GraphInterrupt`] raised mid-run is handled.
#[async_trait]
pub trait InterruptHandler: Send + Sync {
    async fn handle(&self, interrupt: &GraphInterrupt) -> Interrupt;
}

/// Always pauses. The default when an interrupt handler is attached without
/// further configuration.
#[derive(Clone, Debug, Default)]
pub struct DefaultInterruptHandler;

#[async_trait]
impl InterruptHandler for DefaultInterruptHandler {
    async fn handle(&self, _interrupt: &GraphInterrupt) -> Interrupt {
        Interrupt::Pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_handler_always_pauses() {
        let handler = DefaultInterruptHandler;
        let interrupt = GraphInterrupt::new("act", "waiting for approval");
        assert_eq!(handler.handle(&interrupt).await, Interrupt::Pause);
    }
}
