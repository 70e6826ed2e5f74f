//! Conditional edge routing: a function from state to a routing key, with an
//! optional key -> node-id map.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// `(state) -> key`. The key either names the next node directly, or is
/// looked up in the router's `path_map`.
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

#[derive(Clone)]
pub struct ConditionalRouter<S> {
    pub path: ConditionalRouterFn<S>,
    pub path_map: Option<HashMap<String, String>>,
}

impl<S> ConditionalRouter<S> {
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the routed key to a node id (or `END`), applying `path_map`
    /// when present.
    pub fn resolve(&self, state: &S) -> String {
        let key = (self.path)(state);
        match &self.path_map {
            Some(map) => map.get(&key).cloned().unwrap_or(key),
            None => key,
        }
    }
}

impl<S> Debug for ConditionalRouter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalRouter")
            .field("path_map", &self.path_map)
            .finish()
    }
}

/// Resolved edge target for a compiled node: either a single unconditional
/// next node, or a router evaluated against the post-run state.
#[derive(Clone)]
pub enum NextEntry<S> {
    Unconditional(String),
    Conditional(ConditionalRouter<S>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_uses_path_map_when_present() {
        let router = ConditionalRouter::<i32>::new(
            Arc::new(|n: &i32| if *n > 0 { "pos".to_string() } else { "neg".to_string() }),
            Some(HashMap::from([("pos".to_string(), "act".to_string())])),
        );
        assert_eq!(router.resolve(&5), "act");
        assert_eq!(router.resolve(&-5), "neg");
    }
}
