//! Tracing helpers for graph execution, used by `CompiledStateGraph` and
//! [`LoggingNodeMiddleware`].

use std::fmt::Debug;

use tracing::{debug, error, info};

pub fn log_graph_start(thread_id: Option<&str>) {
    info!(thread_id = thread_id.unwrap_or("-"), "graph run starting");
}

pub fn log_graph_complete(thread_id: Option<&str>, steps: usize) {
    info!(
        thread_id = thread_id.unwrap_or("-"),
        steps, "graph run completed"
    );
}

pub fn log_graph_error(thread_id: Option<&str>, node_id: &str, err: &dyn std::error::Error) {
    error!(
        thread_id = thread_id.unwrap_or("-"),
        node_id,
        error = %err,
        "graph run failed"
    );
}

pub fn log_node_start(node_id: &str) {
    debug!(node_id, "node starting");
}

pub fn log_node_complete(node_id: &str, next: &str) {
    debug!(node_id, next, "node completed");
}

pub fn log_state_update<S: Debug>(node_id: &str, state: &S) {
    debug!(node_id, state = ?state, "state updated");
}
