//! `RunnableConfig`: per-invocation addressing passed to `CompiledStateGraph::invoke`.

/// Identifies which thread/checkpoint a run reads and writes.
#[derive(Clone, Debug, Default)]
pub struct RunnableConfig {
    /// Required when a checkpointer is attached. Identifies the conversation
    /// or, for the exploration loop, the analysis.
    pub thread_id: Option<String>,
    /// Namespace for subgraph checkpoints. Empty string for the top-level graph.
    pub checkpoint_ns: String,
    /// Loads a specific checkpoint instead of the latest one (time travel / branch).
    pub checkpoint_id: Option<String>,
    /// Multi-tenant / store-namespace isolation; not interpreted by the checkpointer itself.
    pub user_id: Option<String>,
}

impl RunnableConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Default::default()
        }
    }

    pub fn with_checkpoint_ns(mut self, ns: impl Into<String>) -> Self {
        self.checkpoint_ns = ns.into();
        self
    }

    pub fn with_checkpoint_id(mut self, id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_thread_id() {
        let config = RunnableConfig::default();
        assert!(config.thread_id.is_none());
        assert_eq!(config.checkpoint_ns, "");
    }

    #[test]
    fn builder_sets_fields() {
        let config = RunnableConfig::new("analysis-1")
            .with_checkpoint_ns("sub")
            .with_checkpoint_id("ckpt-3")
            .with_user_id("u1");
        assert_eq!(config.thread_id.as_deref(), Some("analysis-1"));
        assert_eq!(config.checkpoint_ns, "sub");
        assert_eq!(config.checkpoint_id.as_deref(), Some("ckpt-3"));
        assert_eq!(config.user_id.as_deref(), Some("u1"));
    }
}
