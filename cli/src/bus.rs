//! Event bus & persistence (spec §4.6, C6): implements
//! `supervisor::ProgressSink` by persisting each event's durable part first,
//! then broadcasting it to live subscribers via `tokio::sync::broadcast` —
//! a bounded channel that drops the oldest unread message under backpressure
//! rather than blocking the supervisor's stdout pump (spec §5).
//!
//! A short per-analysis replay buffer lets `SubscribeEvents` reconcile a
//! reconnecting client instead of only serving events from the moment it
//! (re)subscribes (spec §4.6 reconcile-on-reconnect).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use protocol::{EnvelopeState, EventKind, ProgressEvent, SequencedEvent};
use store::models::{AgentStepRow, AnalysisStatus};
use store::{AnalysisStore, StepStore};
use supervisor::{ProgressSink, SinkError};
use tokio::sync::broadcast;

/// Bounded so a slow or absent subscriber can never make the bus grow
/// without limit; capacity chosen generously above a single analysis's
/// realistic event rate.
const CHANNEL_CAPACITY: usize = 256;
/// How many of the most recent events per analysis are kept for replay.
const REPLAY_WINDOW: usize = 64;

struct AnalysisChannel {
    sender: broadcast::Sender<SequencedEvent>,
    envelope: EnvelopeState,
    replay: Vec<SequencedEvent>,
}

pub struct EventBus {
    analysis_store: AnalysisStore,
    step_store: StepStore,
    channels: Mutex<HashMap<String, AnalysisChannel>>,
}

impl EventBus {
    pub fn new(analysis_store: AnalysisStore, step_store: StepStore) -> Self {
        Self {
            analysis_store,
            step_store,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to one analysis's event stream, replaying whatever of the
    /// recent history (optionally since `after_seq`) is still buffered.
    pub fn subscribe(
        &self,
        analysis_id: &str,
        after_seq: Option<u64>,
    ) -> (Vec<SequencedEvent>, broadcast::Receiver<SequencedEvent>) {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(analysis_id.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            AnalysisChannel {
                sender,
                envelope: EnvelopeState::new(analysis_id),
                replay: Vec::new(),
            }
        });
        let backlog = channel
            .replay
            .iter()
            .filter(|e| after_seq.map(|s| e.seq > s).unwrap_or(true))
            .cloned()
            .collect();
        (backlog, channel.sender.subscribe())
    }

    fn push(&self, analysis_id: &str, event: ProgressEvent) -> SequencedEvent {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(analysis_id.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            AnalysisChannel {
                sender,
                envelope: EnvelopeState::new(analysis_id),
                replay: Vec::new(),
            }
        });
        let sequenced = channel.envelope.sequence(event);
        channel.replay.push(sequenced.clone());
        if channel.replay.len() > REPLAY_WINDOW {
            let excess = channel.replay.len() - REPLAY_WINDOW;
            channel.replay.drain(..excess);
        }
        let _ = channel.sender.send(sequenced.clone());
        sequenced
    }
}

#[async_trait]
impl ProgressSink for EventBus {
    async fn handle(&self, event: ProgressEvent) -> Result<(), SinkError> {
        let now = chrono::Utc::now().timestamp_millis();
        let analysis_id = event.analysis_id.clone();

        match &event.kind {
            EventKind::AgentStepDetail => {
                if let Ok(row) = serde_json::from_value::<AgentStepRow>(event.data.clone()) {
                    self.step_store
                        .append(row)
                        .await
                        .map_err(|e| SinkError::Failed(e.to_string()))?;
                }
                if let Some(step) = event.step {
                    let label = format!("step_{step}");
                    self.analysis_store
                        .set_current_step(&analysis_id, &label, now)
                        .await
                        .map_err(|e| SinkError::Failed(e.to_string()))?;
                }
            }
            EventKind::Scouting => {
                self.analysis_store
                    .set_status_and_step(&analysis_id, AnalysisStatus::Running, "scouting", now)
                    .await
                    .map_err(|e| SinkError::Failed(e.to_string()))?;
            }
            EventKind::Synthesis => {
                self.analysis_store
                    .set_current_step(&analysis_id, "synthesizing", now)
                    .await
                    .map_err(|e| SinkError::Failed(e.to_string()))?;
            }
            EventKind::CostEstimate => {
                if let Ok(totals) = serde_json::from_value::<protocol::CostEstimateData>(event.data.clone()) {
                    self.analysis_store
                        .accumulate_usage(
                            &analysis_id,
                            totals.input,
                            totals.output,
                            totals.cache_creation,
                            totals.cache_read,
                            totals.credits,
                            totals.api_calls,
                            now,
                        )
                        .await
                        .map_err(|e| SinkError::Failed(e.to_string()))?;
                }
            }
            EventKind::AnalysisFailed => {
                if let Ok(payload) = serde_json::from_value::<protocol::AnalysisFailedData>(event.data.clone()) {
                    self.analysis_store
                        .fail(&analysis_id, &payload.message, payload.partial_result, now)
                        .await
                        .map_err(|e| SinkError::Failed(e.to_string()))?;
                }
            }
            _ => {}
        }

        self.push(&analysis_id, event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_persists_step_before_broadcasting() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.sqlite");
        let analysis_store = AnalysisStore::open(&db).unwrap();
        let step_store = StepStore::open(&db, dir.path().join("screenshots")).unwrap();
        analysis_store
            .insert(store::models::Analysis::new_queued(
                "a1",
                "https://example.com/game",
                vec![],
                "balanced",
                false,
                "desktop",
                1.0,
                false,
                false,
                None,
                None,
                0,
            ))
            .await
            .unwrap();
        let bus = EventBus::new(analysis_store.clone(), step_store.clone());

        let row = AgentStepRow {
            analysis_id: "a1".into(),
            step_number: 1,
            tool_name: "screenshot".into(),
            input: serde_json::json!({}),
            result_summary: "ok".into(),
            screenshot_path: None,
            duration_ms: 5,
            thinking_ms: None,
            error: None,
            reasoning: None,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            credits: 0.0,
            created_at_unix_ms: 0,
        };
        let event = ProgressEvent::with_payload(EventKind::AgentStepDetail, "a1", Some(1), &row).unwrap();

        let (_, mut rx) = bus.subscribe("a1", None);
        bus.handle(event).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.seq, 1);

        let steps = step_store.list("a1").await.unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[tokio::test]
    async fn replay_returns_only_events_after_the_requested_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db.sqlite");
        let analysis_store = AnalysisStore::open(&db).unwrap();
        let step_store = StepStore::open(&db, dir.path().join("screenshots")).unwrap();
        let bus = EventBus::new(analysis_store, step_store);
        for i in 1..=3u32 {
            let event = ProgressEvent::new(EventKind::AgentStep, "a1", Some(i), serde_json::Value::Null);
            bus.handle(event).await.unwrap();
        }
        let (backlog, _rx) = bus.subscribe("a1", Some(1));
        assert_eq!(backlog.len(), 2);
        assert_eq!(backlog[0].seq, 2);
    }
}
