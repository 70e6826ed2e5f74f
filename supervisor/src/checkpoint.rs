//! Phase checkpoint file I/O (spec §6, §9): `{tmpDir}/checkpoint-{phase}.json`
//! holding `{ phase, analysisId, payload }`, written atomically (temp file,
//! fsync, rename) so a reader never observes a half-written file. This is a
//! coarser, file-based sibling of `qa_core::memory::Checkpointer` — that one
//! checkpoints the exploration `StateGraph` turn by turn; this one
//! checkpoints whole subprocess phases (scout, explore, synthesis) so a
//! resumed child skips phases that already completed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseCheckpoint {
    pub phase: String,
    #[serde(rename = "analysisId")]
    pub analysis_id: String,
    pub payload: Value,
}

fn checkpoint_path(checkpoint_dir: &Path, phase: &str) -> PathBuf {
    checkpoint_dir.join(format!("checkpoint-{phase}.json"))
}

/// Writes a phase checkpoint atomically: serialize to a sibling temp file,
/// fsync it, then rename over the final path (spec §9 resumability note).
pub async fn write(checkpoint_dir: &Path, checkpoint: &PhaseCheckpoint) -> Result<(), std::io::Error> {
    tokio::fs::create_dir_all(checkpoint_dir).await?;
    let final_path = checkpoint_path(checkpoint_dir, &checkpoint.phase);
    let tmp_path = checkpoint_dir.join(format!(".checkpoint-{}.json.tmp", checkpoint.phase));

    let body = serde_json::to_vec_pretty(checkpoint)?;
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&body).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, &final_path).await?;
    Ok(())
}

/// Reads a specific phase's checkpoint, if present.
pub async fn read(checkpoint_dir: &Path, phase: &str) -> Option<PhaseCheckpoint> {
    let path = checkpoint_path(checkpoint_dir, phase);
    let body = tokio::fs::read(&path).await.ok()?;
    serde_json::from_slice(&body).ok()
}

/// Finds the most-recently written checkpoint file in `checkpoint_dir`,
/// used on a non-zero child exit to surface a `partial_result` (spec §4.2
/// step 4).
pub async fn read_latest(checkpoint_dir: &Path) -> Option<PhaseCheckpoint> {
    let mut entries = tokio::fs::read_dir(checkpoint_dir).await.ok()?;
    let mut latest: Option<(std::time::SystemTime, PathBuf)> = None;

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let name = path.file_name()?.to_str()?.to_string();
        if !name.starts_with("checkpoint-") || !name.ends_with(".json") {
            continue;
        }
        let modified = entry.metadata().await.ok()?.modified().ok()?;
        if latest.as_ref().map(|(t, _)| modified > *t).unwrap_or(true) {
            latest = Some((modified, path));
        }
    }

    let (_, path) = latest?;
    let body = tokio::fs::read(&path).await.ok()?;
    serde_json::from_slice(&body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_checkpoint_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = PhaseCheckpoint {
            phase: "scout".to_string(),
            analysis_id: "an-1".to_string(),
            payload: serde_json::json!({"url": "https://example.com"}),
        };
        write(dir.path(), &checkpoint).await.unwrap();
        let read_back = read(dir.path(), "scout").await.unwrap();
        assert_eq!(read_back.analysis_id, "an-1");
        assert_eq!(read_back.payload["url"], "https://example.com");
    }

    #[tokio::test]
    async fn read_latest_returns_none_for_an_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_latest(dir.path()).await.is_none());
    }

    #[tokio::test]
    async fn read_latest_finds_the_most_recently_written_phase() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            &PhaseCheckpoint {
                phase: "scout".to_string(),
                analysis_id: "an-1".to_string(),
                payload: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        write(
            dir.path(),
            &PhaseCheckpoint {
                phase: "explore".to_string(),
                analysis_id: "an-1".to_string(),
                payload: serde_json::json!({"steps": 3}),
            },
        )
        .await
        .unwrap();
        let latest = read_latest(dir.path()).await.unwrap();
        assert_eq!(latest.phase, "explore");
    }
}
