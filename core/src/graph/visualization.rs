//! Debug rendering of a compiled graph's shape: Graphviz dot and a plain-text
//! outline. Useful for logging a graph's topology once at startup.

use std::fmt::Debug;

use crate::graph::compiled::CompiledStateGraph;
use crate::graph::conditional::NextEntry;
use crate::graph::state_graph::{END, START};

/// Renders the compiled graph as a Graphviz `dot` source.
pub fn generate_dot<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut out = String::from("digraph StateGraph {\n");
    out.push_str(&format!("  \"{START}\" -> \"{}\";\n", graph.first_node_id));
    for (from, entry) in &graph.next_map {
        match entry {
            NextEntry::Unconditional(to) => {
                out.push_str(&format!("  \"{from}\" -> \"{to}\";\n"));
            }
            NextEntry::Conditional(router) => {
                if let Some(map) = &router.path_map {
                    for to in map.values() {
                        out.push_str(&format!("  \"{from}\" -> \"{to}\" [style=dashed];\n"));
                    }
                } else {
                    out.push_str(&format!("  \"{from}\" -> \"{END}\" [style=dashed];\n"));
                }
            }
        }
    }
    out.push_str("}\n");
    out
}

/// Renders the compiled graph as an indented text outline of its node chain.
pub fn generate_text<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut out = String::new();
    out.push_str(&format!("{START}\n"));
    for node_id in &graph.edge_order {
        out.push_str(&format!("  -> {node_id}\n"));
    }
    for (from, entry) in &graph.next_map {
        if matches!(entry, NextEntry::Conditional(_)) {
            out.push_str(&format!("  {from} -> (conditional)\n"));
        }
    }
    out.push_str(&format!("{END}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::graph::next::Next;
    use crate::graph::node::Node;
    use crate::graph::state_graph::StateGraph;
    use async_trait::async_trait;
    use std::sync::Arc;

    #[derive(Clone, Debug)]
    struct S(i32);

    struct N;

    #[async_trait]
    impl Node<S> for N {
        fn id(&self) -> &str {
            "n"
        }
        async fn run(&self, state: S) -> Result<(S, Next), AgentError> {
            Ok((state, Next::Continue))
        }
    }

    #[test]
    fn generate_dot_includes_start_edge() {
        let mut graph = StateGraph::<S>::new();
        graph.add_node("n", Arc::new(N));
        graph.add_edge(START, "n");
        graph.add_edge("n", END);
        let compiled = graph.compile().unwrap();
        let dot = generate_dot(&compiled);
        assert!(dot.contains("__start__"));
        assert!(dot.contains("\"n\""));
    }
}
