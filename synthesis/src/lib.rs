//! Synthesis & scenario generation (spec §4.5, C5): two retryable,
//! text-only LLM calls that run after the exploration loop terminates.
//! `findings::synthesize` turns the pruned transcript into structured
//! findings JSON; `scenarios::generate`, gated on the `TestFlows` module,
//! turns that findings JSON into an ordered scenario list for the test
//! executor.

pub mod budget;
pub mod findings;
pub mod repair;
pub mod schema;
pub mod scenarios;
mod retry;
mod transcript;

pub use findings::{synthesize, SynthesisOutcome};
pub use scenarios::{generate as generate_scenarios, Scenario, ScenarioOutcome};
