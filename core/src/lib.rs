//! # qa-core
//!
//! The exploration agent loop and its supporting state-graph engine: the
//! turn-by-turn tool-use conversation that drives a browser session via an
//! LLM, under token/time/payload budgets (see the platform spec, C4).
//!
//! ## Main modules
//!
//! - [`graph`]: minimal state-graph engine (nodes, linear + conditional
//!   edges, checkpointing, retry, interrupts) the exploration loop runs on.
//! - [`state`]: [`ExplorationState`] threaded through think → act → budget.
//! - [`message`]: [`Message`] / [`ContentBlock`] (text, image, tool_use,
//!   tool_result), with prompt-cache markers.
//! - [`llm`]: [`LlmClient`] trait plus the Anthropic-compatible primary tier,
//!   an OpenAI-compatible secondary tier, and [`MockLlm`] for tests.
//! - [`tools`] / [`tool_source`]: the narrow tool surface contract; concrete
//!   browser tools live in the `browser` crate.
//! - [`agent::explore`]: the think/act/budget nodes and the `explore()` entry
//!   point (spec §4.4).
//! - [`memory`]: checkpointing ([`Checkpointer`], [`MemorySaver`]); the
//!   `store` crate provides the SQLite-backed implementation.
//! - [`error`]: [`AgentError`] / [`ErrorKind`], the eight error kinds shared
//!   across the platform (spec §7).

pub mod agent;
pub mod channels;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod message;
pub mod state;
pub mod tool_source;
pub mod tools;
pub mod traits;

pub use agent::explore::{
    explore, ActNode, BudgetNode, ExploreConfig, ExplorationTranscript, StepSink, TerminationReason,
    ThinkNode,
};
pub use channels::{
    BoxedStateUpdater, ChannelError, FieldBasedUpdater, ReplaceUpdater, StateUpdater,
};
pub use error::{AgentError, ErrorKind};
pub use graph::{
    generate_dot, generate_text, CompilationError, CompiledStateGraph, DefaultInterruptHandler,
    GraphInterrupt, Interrupt, InterruptHandler, LoggingNodeMiddleware, NameNode, Next, Node,
    NodeMiddleware, RetryPolicy, RunContext, StateGraph, END, START,
};
pub use llm::{AnthropicClient, ChatOpenAI, LlmClient, LlmResponse, LlmUsage, MockLlm, StopReason};
pub use memory::{
    Checkpoint, CheckpointError, CheckpointListItem, CheckpointMetadata, CheckpointSource,
    Checkpointer, JsonSerializer, MemorySaver, RunnableConfig, Serializer,
};
pub use message::{CacheControl, CacheControlKind, ContentBlock, Message};
pub use state::{ExplorationState, ToolCall, ToolResult};
pub use tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
pub use tools::Tool;
pub use traits::Agent;
