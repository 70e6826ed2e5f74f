//! Per-run context threaded through `Node::run_with_context`: run-event
//! configuration and the `RunnableConfig` addressing the active checkpoint.

use std::collections::HashSet;
use std::fmt::Debug;

use tokio::sync::mpsc;

use crate::graph::run_event::{RunEvent, RunMode};
use crate::memory::RunnableConfig;

/// What a node needs to know about the run it's executing in, beyond its own
/// state: which run-event modes are active and where to send them.
#[derive(Clone)]
pub struct RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub stream_mode: HashSet<RunMode>,
    pub stream_tx: Option<mpsc::Sender<RunEvent<S>>>,
    pub config: RunnableConfig,
}

impl<S> RunContext<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(config: RunnableConfig) -> Self {
        Self {
            stream_mode: HashSet::new(),
            stream_tx: None,
            config,
        }
    }

    pub fn with_stream(
        mut self,
        stream_mode: HashSet<RunMode>,
        stream_tx: mpsc::Sender<RunEvent<S>>,
    ) -> Self {
        self.stream_mode = stream_mode;
        self.stream_tx = Some(stream_tx);
        self
    }

    pub fn is_streaming(&self, mode: RunMode) -> bool {
        self.stream_tx.is_some() && self.stream_mode.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_streaming_requires_both_mode_and_sender() {
        let ctx: RunContext<i32> = RunContext::new(RunnableConfig::default());
        assert!(!ctx.is_streaming(RunMode::Updated));

        let (tx, _rx) = mpsc::channel(1);
        let ctx = ctx.with_stream(HashSet::from([RunMode::Updated]), tx);
        assert!(ctx.is_streaming(RunMode::Updated));
        assert!(!ctx.is_streaming(RunMode::Values));
    }
}
