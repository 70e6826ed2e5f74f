//! Progress-event envelope (spec §6) plus per-analysis sequencing for
//! reconcile-on-reconnect (spec §4.6).
//!
//! The wire envelope itself is the flat shape the spec fixes exactly:
//! `{ type, analysisId, step, data }`. Sequence numbers are not part of
//! that shape; `EnvelopeState` assigns them alongside each event so the
//! event bus can answer "replay everything after sequence N" on
//! reconnect, the same role the teacher's `event_id` counter plays for
//! its own stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::EventKind;

/// One progress event on the wire: `{ type, analysisId, step, data }`
/// (spec §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "analysisId")]
    pub analysis_id: String,
    pub step: Option<u32>,
    pub data: Value,
}

impl ProgressEvent {
    pub fn new(kind: EventKind, analysis_id: impl Into<String>, step: Option<u32>, data: Value) -> Self {
        Self {
            kind,
            analysis_id: analysis_id.into(),
            step,
            data,
        }
    }

    /// Builds an event from a typed payload, serializing it into `data`.
    pub fn with_payload<T: Serialize>(
        kind: EventKind,
        analysis_id: impl Into<String>,
        step: Option<u32>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, analysis_id, step, serde_json::to_value(payload)?))
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// One event plus the monotonic sequence number it was assigned, for
/// replay-since-N on reconnect.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

/// Assigns monotonically increasing sequence numbers to one analysis's
/// event stream. One instance lives per in-flight analysis in the event
/// bus (spec §4.6: persist-then-broadcast, reconcile-on-reconnect).
pub struct EnvelopeState {
    pub analysis_id: String,
    next_seq: u64,
}

impl EnvelopeState {
    pub fn new(analysis_id: impl Into<String>) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            next_seq: 1,
        }
    }

    /// Assigns the next sequence number to `event` and advances the counter.
    pub fn sequence(&mut self, event: ProgressEvent) -> SequencedEvent {
        let seq = self.next_seq;
        self.next_seq += 1;
        SequencedEvent { seq, event }
    }

    pub fn last_seq(&self) -> u64 {
        self.next_seq.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::CostEstimateData;

    #[test]
    fn progress_event_serializes_to_the_flat_wire_shape() {
        let event = ProgressEvent::new(
            EventKind::Scouting,
            "an-1",
            None,
            serde_json::json!({"url": "https://example.com/game"}),
        );
        let value = event.to_value().unwrap();
        assert_eq!(value["type"], "scouting");
        assert_eq!(value["analysisId"], "an-1");
        assert!(value["step"].is_null());
    }

    #[test]
    fn with_payload_serializes_typed_data() {
        let payload = CostEstimateData {
            input: 100,
            output: 50,
            cache_creation: 0,
            cache_read: 10,
            api_calls: 6,
            credits: 1.5,
            usd: 0.015,
        };
        let event =
            ProgressEvent::with_payload(EventKind::CostEstimate, "an-1", None, &payload).unwrap();
        assert_eq!(event.data["apiCalls"], 6);
    }

    #[test]
    fn sequence_numbers_are_monotonic_per_analysis() {
        let mut state = EnvelopeState::new("an-1");
        let e1 = state.sequence(ProgressEvent::new(EventKind::AgentStep, "an-1", Some(1), Value::Null));
        let e2 = state.sequence(ProgressEvent::new(EventKind::AgentStep, "an-1", Some(2), Value::Null));
        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
        assert_eq!(state.last_seq(), 2);
    }
}
