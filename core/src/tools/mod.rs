//! Narrow tool trait plus a name-keyed registry. The exploration loop's act
//! node calls through [`ToolSource`](crate::tool_source::ToolSource), which
//! [`AggregateToolSource`] implements by dispatching into a
//! [`ToolRegistry`] — the browser crate registers its eight tools here at
//! startup (spec §4.3).

mod aggregate_source;
mod registry;
mod r#trait;

pub use aggregate_source::AggregateToolSource;
pub use r#trait::Tool;
pub use registry::ToolRegistry;
