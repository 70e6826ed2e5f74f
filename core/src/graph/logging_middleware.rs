//! Node middleware that logs around each node execution.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::AgentError;
use crate::graph::logging::{log_node_complete, log_node_start};
use crate::graph::next::Next;
use crate::graph::node_middleware::NodeMiddleware;

/// Wraps every node run with start/complete tracing spans.
///
/// ```rust,ignore
/// use loom::graph::{StateGraph, LoggingNodeMiddleware};
///
/// let graph = StateGraph::<MyState>::new().with_middleware(Arc::new(LoggingNodeMiddleware));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingNodeMiddleware;

#[async_trait]
impl<S> NodeMiddleware<S> for LoggingNodeMiddleware
where
    S: Clone + Send + Sync + Debug + 'static,
{
    #[instrument(skip(self, state, inner), fields(node_id))]
    async fn around_run(
        &self,
        node_id: &str,
        state: S,
        inner: Box<
            dyn FnOnce(S) -> Pin<Box<dyn Future<Output = Result<(S, Next), AgentError>> + Send>>
                + Send,
        >,
    ) -> Result<(S, Next), AgentError> {
        log_node_start(node_id);
        let result = inner(state).await;
        match &result {
            Ok((_, next)) => log_node_complete(node_id, &format!("{next:?}")),
            Err(err) => tracing::warn!(node_id, error = %err, "node failed"),
        }
        result
    }
}
