//! Progress-event wire protocol for the exploration platform (spec §4.2
//! step 3, §6): event kinds, typed payloads, the flat envelope, and
//! per-analysis sequencing for reconcile-on-reconnect.
//!
//! This crate defines the wire shape only; it does not depend on `qa-core`.
//! The supervisor (C2) emits these as line-delimited JSON on stdout; the
//! event bus (C6) persists then broadcasts them to live subscribers.

pub mod envelope;
pub mod event;

pub use envelope::{EnvelopeState, ProgressEvent, SequencedEvent};
pub use event::{
    AdaptiveGrantData, AgentScreenshotData, AnalysisFailedData, CostEstimateData, EventKind,
};
