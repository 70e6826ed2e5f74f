//! Routing decision returned by a node's `run`.

/// What the compiled graph should do after a node finishes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Next {
    /// Follow the statically compiled edge order (or the conditional router,
    /// if this node has one).
    Continue,
    /// Jump directly to the named node, bypassing edges/conditional routing.
    Node(String),
    /// Stop the run; the current state is the final state.
    End,
}
