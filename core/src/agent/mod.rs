//! Agent loops built on the graph engine.
//!
//! Currently one: [`explore`](explore::explore), the think → act → budget
//! cycle that drives the browser exploration session (spec §4.4).

pub mod explore;
