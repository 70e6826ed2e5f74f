//! The `Agent` trait: a single state-in, state-out step, independent of the
//! graph engine. Any `Agent` can be wrapped as a `Node` by pairing its id
//! with `Next::Continue`.

use async_trait::async_trait;

use crate::error::AgentError;

#[async_trait]
pub trait Agent: Send + Sync {
    type State: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn run(&self, state: Self::State) -> Result<Self::State, AgentError>;
}
