//! Compiled, executable state graph: the actual step loop.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::channels::BoxedStateUpdater;
use crate::error::AgentError;
use crate::graph::conditional::NextEntry;
use crate::graph::interrupt::InterruptHandler;
use crate::graph::logging::{log_graph_complete, log_graph_error, log_graph_start};
use crate::graph::next::Next;
use crate::graph::node::Node;
use crate::graph::node_middleware::NodeMiddleware;
use crate::graph::retry::RetryPolicy;
use crate::graph::run_context::RunContext;
use crate::graph::END;
use crate::memory::{
    Checkpoint, CheckpointError, CheckpointMetadata, CheckpointSource, Checkpointer,
    RunnableConfig,
};
use crate::graph::run_event::{RunEvent, RunMode};

/// A compiled, validated graph, ready to run. Built by `StateGraph::compile*`.
pub struct CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub(crate) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(crate) first_node_id: String,
    pub(crate) edge_order: Vec<String>,
    pub(crate) next_map: HashMap<String, NextEntry<S>>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    pub(crate) middleware: Option<Arc<dyn NodeMiddleware<S>>>,
    pub(crate) state_updater: BoxedStateUpdater<S>,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) interrupt_handler: Option<Arc<dyn InterruptHandler>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn next_node_id(&self, current: &str, state: &S, step_index: usize) -> Option<String> {
        if let Some(entry) = self.next_map.get(current) {
            let target = match entry {
                NextEntry::Unconditional(id) => id.clone(),
                NextEntry::Conditional(router) => router.resolve(state),
            };
            if target == END {
                return None;
            }
            return Some(target);
        }
        self.edge_order.get(step_index + 1).cloned()
    }

    async fn run_node(
        &self,
        node: &Arc<dyn Node<S>>,
        state: S,
        ctx: &RunContext<S>,
    ) -> Result<(S, Next), AgentError> {
        let max_attempts = self.retry_policy.max_attempts().max(1);
        let mut attempt = 1;
        loop {
            let result = match &self.middleware {
                Some(middleware) => {
                    let node = Arc::clone(node);
                    let inner: Box<
                        dyn FnOnce(S) -> Pin<Box<dyn Future<Output = Result<(S, Next), AgentError>> + Send>>
                            + Send,
                    > = Box::new(move |s| Box::pin(async move { node.run(s).await }));
                    middleware.around_run(node.id(), state.clone(), inner).await
                }
                None => node.run_with_context(state.clone(), ctx).await,
            };
            match result {
                Ok(ok) => return Ok(ok),
                Err(err) if attempt < max_attempts && err.is_retryable() => {
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn load_initial_state(
        &self,
        state: S,
        config: &RunnableConfig,
    ) -> Result<S, AgentError> {
        if config.thread_id.is_none() {
            return Ok(state);
        }
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(state);
        };
        match checkpointer.get_tuple(config).await {
            Ok(Some((checkpoint, _))) => Ok(checkpoint.channel_values),
            Ok(None) => Ok(state),
            Err(CheckpointError::ThreadIdRequired) => Ok(state),
            Err(err) => Err(AgentError::Node(format!("checkpoint load failed: {err}"))),
        }
    }

    async fn save_checkpoint(
        &self,
        config: &RunnableConfig,
        state: &S,
        step: i64,
    ) -> Result<(), AgentError> {
        let Some(checkpointer) = &self.checkpointer else {
            return Ok(());
        };
        if config.thread_id.is_none() {
            return Ok(());
        }
        let checkpoint = Checkpoint::new(
            uuid::Uuid::new_v4().to_string(),
            state.clone(),
            CheckpointMetadata {
                source: CheckpointSource::Loop,
                step,
                created_at: Some(std::time::SystemTime::now()),
                parents: HashMap::new(),
            },
        );
        checkpointer
            .put(config, &checkpoint)
            .await
            .map_err(|err| AgentError::Node(format!("checkpoint save failed: {err}")))?;
        Ok(())
    }

    /// Runs the graph to completion, state in, state out.
    pub async fn invoke(&self, state: S, config: RunnableConfig) -> Result<S, AgentError> {
        let mut rx = self.stream(state, config, HashSet::new(), 1).await;
        let mut last = None;
        while let Some(event) = rx.recv().await {
            if let RunEvent::Values(s) = event {
                last = Some(s);
            }
        }
        last.ok_or_else(|| AgentError::Node("graph produced no final state".into()))
    }

    /// Runs the graph, emitting `RunEvent`s as it goes. The final state is
    /// always emitted as `RunEvent::Values` regardless of `stream_mode`, so
    /// `invoke` can extract it.
    pub async fn stream(
        &self,
        initial_state: S,
        config: RunnableConfig,
        stream_mode: HashSet<RunMode>,
        buffer: usize,
    ) -> mpsc::Receiver<RunEvent<S>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let nodes = self.nodes.clone();
        let next_map = self.next_map.clone();
        let edge_order = self.edge_order.clone();
        let first_node_id = self.first_node_id.clone();
        let checkpointer = self.checkpointer.clone();
        let middleware = self.middleware.clone();
        let state_updater = self.state_updater.clone();
        let retry_policy = self.retry_policy.clone();
        let tx_for_task = tx.clone();

        // Clone just enough of `self` into a lightweight handle the spawned task owns.
        let handle = CompiledStateGraph {
            nodes,
            first_node_id,
            edge_order,
            next_map,
            checkpointer,
            middleware,
            state_updater,
            retry_policy,
            interrupt_handler: self.interrupt_handler.clone(),
        };

        tokio::spawn(async move {
            let ctx = RunContext::new(config.clone())
                .with_stream(stream_mode.clone(), tx_for_task.clone());
            log_graph_start(config.thread_id.as_deref());

            let mut state = match handle.load_initial_state(initial_state, &config).await {
                Ok(s) => s,
                Err(err) => {
                    log_graph_error(config.thread_id.as_deref(), "start", &err);
                    return;
                }
            };

            let mut current = handle.first_node_id.clone();
            let mut step_index = 0usize;
            let mut step: i64 = 0;

            loop {
                let Some(node) = handle.nodes.get(&current).cloned() else {
                    let err = AgentError::Node(format!("node not found: {current}"));
                    log_graph_error(config.thread_id.as_deref(), &current, &err);
                    return;
                };

                let result = handle.run_node(&node, state.clone(), &ctx).await;
                let (node_output, next) = match result {
                    Ok(ok) => ok,
                    Err(err) => {
                        log_graph_error(config.thread_id.as_deref(), &current, &err);
                        return;
                    }
                };

                let mut merged = state.clone();
                handle.state_updater.apply_update(&mut merged, &node_output);
                state = merged;

                if ctx.is_streaming(RunMode::Updated) {
                    let _ = tx_for_task
                        .send(RunEvent::Updated {
                            node_id: current.clone(),
                            state: state.clone(),
                        })
                        .await;
                }
                if ctx.is_streaming(RunMode::Values) {
                    let _ = tx_for_task.send(RunEvent::Values(state.clone())).await;
                }

                if let Err(err) = handle.save_checkpoint(&config, &state, step).await {
                    log_graph_error(config.thread_id.as_deref(), &current, &err);
                    return;
                }
                step += 1;

                let stop = matches!(next, Next::End);
                let jump = match &next {
                    Next::Node(id) => Some(id.clone()),
                    _ => None,
                };

                if stop {
                    break;
                }

                current = match jump {
                    Some(id) => id,
                    None => match handle.next_node_id(&current, &state, step_index) {
                        Some(id) => id,
                        None => break,
                    },
                };
                step_index += 1;
            }

            let _ = tx_for_task.send(RunEvent::Values(state.clone())).await;
            log_graph_complete(config.thread_id.as_deref(), step as usize);
        });

        rx
    }
}

impl<S> Clone for CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            first_node_id: self.first_node_id.clone(),
            edge_order: self.edge_order.clone(),
            next_map: self.next_map.clone(),
            checkpointer: self.checkpointer.clone(),
            middleware: self.middleware.clone(),
            state_updater: self.state_updater.clone(),
            retry_policy: self.retry_policy.clone(),
            interrupt_handler: self.interrupt_handler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::state_graph::{StateGraph, START};
    use async_trait::async_trait;

    #[derive(Clone, Debug, PartialEq)]
    struct CounterState(i32);

    struct Increment;

    #[async_trait]
    impl Node<CounterState> for Increment {
        fn id(&self) -> &str {
            "increment"
        }
        async fn run(&self, state: CounterState) -> Result<(CounterState, Next), AgentError> {
            Ok((CounterState(state.0 + 1), Next::Continue))
        }
    }

    #[tokio::test]
    async fn invoke_runs_single_node_to_end() {
        let mut graph = StateGraph::<CounterState>::new();
        graph.add_node("increment", Arc::new(Increment));
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let compiled = graph.compile().unwrap();

        let result = compiled
            .invoke(CounterState(0), RunnableConfig::default())
            .await
            .unwrap();
        assert_eq!(result, CounterState(1));
    }

    #[tokio::test]
    async fn invoke_chains_through_multiple_nodes() {
        let mut graph = StateGraph::<CounterState>::new();
        graph.add_node("a", Arc::new(Increment));
        graph.add_node("b", Arc::new(Increment));
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);
        let compiled = graph.compile().unwrap();

        let result = compiled
            .invoke(CounterState(0), RunnableConfig::default())
            .await
            .unwrap();
        assert_eq!(result, CounterState(2));
    }

    #[tokio::test]
    async fn invoke_resumes_from_checkpoint_when_thread_id_set() {
        use crate::memory::MemorySaver;

        let mut graph = StateGraph::<CounterState>::new();
        graph.add_node("increment", Arc::new(Increment));
        graph.add_edge(START, "increment");
        graph.add_edge("increment", END);
        let saver: Arc<dyn Checkpointer<CounterState>> = Arc::new(MemorySaver::new());
        let compiled = graph.compile_with_checkpointer(saver).unwrap();

        let config = RunnableConfig::new("thread-1");
        let first = compiled.invoke(CounterState(0), config.clone()).await.unwrap();
        assert_eq!(first, CounterState(1));

        // A fresh invoke against the same thread should resume from the saved
        // checkpoint (1) rather than the seed state (0), landing on 2.
        let second = compiled.invoke(CounterState(0), config).await.unwrap();
        assert_eq!(second, CounterState(2));
    }
}
