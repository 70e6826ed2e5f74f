//! In-memory checkpointer. Used in tests and for dev runs with no persistence.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::memory::checkpoint::{Checkpoint, CheckpointListItem, CheckpointMetadata};
use crate::memory::checkpointer::{CheckpointError, Checkpointer};
use crate::memory::config::RunnableConfig;

type Key = (String, String, String);

#[derive(Default)]
pub struct MemorySaver<S> {
    checkpoints: Mutex<HashMap<Key, (Checkpoint<S>, CheckpointMetadata)>>,
}

impl<S> MemorySaver<S> {
    pub fn new() -> Self {
        Self {
            checkpoints: Mutex::new(HashMap::new()),
        }
    }
}

fn thread_id_required(config: &RunnableConfig) -> Result<String, CheckpointError> {
    config
        .thread_id
        .clone()
        .ok_or(CheckpointError::ThreadIdRequired)
}

#[async_trait]
impl<S> Checkpointer<S> for MemorySaver<S>
where
    S: Clone + Send + Sync + 'static,
{
    async fn put(
        &self,
        config: &RunnableConfig,
        checkpoint: &Checkpoint<S>,
    ) -> Result<String, CheckpointError> {
        let thread_id = thread_id_required(config)?;
        let key = (thread_id, config.checkpoint_ns.clone(), checkpoint.id.clone());
        let mut guard = self.checkpoints.lock().expect("memory saver mutex poisoned");
        guard.insert(key, (checkpoint.clone(), checkpoint.metadata.clone()));
        Ok(checkpoint.id.clone())
    }

    async fn get_tuple(
        &self,
        config: &RunnableConfig,
    ) -> Result<Option<(Checkpoint<S>, CheckpointMetadata)>, CheckpointError> {
        let thread_id = thread_id_required(config)?;
        let guard = self.checkpoints.lock().expect("memory saver mutex poisoned");
        if let Some(checkpoint_id) = &config.checkpoint_id {
            let key = (thread_id, config.checkpoint_ns.clone(), checkpoint_id.clone());
            return Ok(guard.get(&key).cloned());
        }
        let latest = guard
            .iter()
            .filter(|((tid, ns, _), _)| tid == &thread_id && ns == &config.checkpoint_ns)
            .max_by_key(|(_, (cp, _))| cp.ts.clone())
            .map(|(_, v)| v.clone());
        Ok(latest)
    }

    async fn list(
        &self,
        config: &RunnableConfig,
        limit: Option<usize>,
        before: Option<&str>,
        after: Option<&str>,
    ) -> Result<Vec<CheckpointListItem>, CheckpointError> {
        let thread_id = thread_id_required(config)?;
        let guard = self.checkpoints.lock().expect("memory saver mutex poisoned");
        let mut items: Vec<(String, CheckpointListItem)> = guard
            .iter()
            .filter(|((tid, ns, _), _)| tid == &thread_id && ns == &config.checkpoint_ns)
            .map(|(_, (cp, meta))| {
                (
                    cp.ts.clone(),
                    CheckpointListItem {
                        checkpoint_id: cp.id.clone(),
                        metadata: meta.clone(),
                    },
                )
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        let mut list: Vec<CheckpointListItem> = items.into_iter().map(|(_, item)| item).collect();
        if let Some(a) = after {
            if let Some(pos) = list.iter().position(|i| i.checkpoint_id == a) {
                list = list[pos + 1..].to_vec();
            }
        }
        if let Some(b) = before {
            if let Some(pos) = list.iter().position(|i| i.checkpoint_id == b) {
                list = list[..pos].to_vec();
            }
        }
        if let Some(n) = limit {
            let len = list.len();
            if len > n {
                list = list[len - n..].to_vec();
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::checkpoint::CheckpointSource;

    fn checkpoint(id: &str) -> Checkpoint<i32> {
        Checkpoint::new(
            id,
            42,
            CheckpointMetadata {
                source: CheckpointSource::Loop,
                step: 1,
                created_at: None,
                parents: HashMap::new(),
            },
        )
    }

    #[tokio::test]
    async fn put_then_get_tuple_round_trips() {
        let saver = MemorySaver::new();
        let config = RunnableConfig::new("thread-1");
        saver.put(&config, &checkpoint("a")).await.unwrap();
        let (cp, _) = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(cp.id, "a");
        assert_eq!(cp.channel_values, 42);
    }

    #[tokio::test]
    async fn get_tuple_without_thread_id_errors() {
        let saver: MemorySaver<i32> = MemorySaver::new();
        let config = RunnableConfig::default();
        let err = saver.get_tuple(&config).await.unwrap_err();
        assert!(matches!(err, CheckpointError::ThreadIdRequired));
    }

    #[tokio::test]
    async fn list_respects_limit() {
        let saver = MemorySaver::new();
        let config = RunnableConfig::new("thread-1");
        for id in ["a", "b", "c"] {
            saver.put(&config, &checkpoint(id)).await.unwrap();
        }
        let items = saver.list(&config, Some(2), None, None).await.unwrap();
        assert_eq!(items.len(), 2);
    }
}
