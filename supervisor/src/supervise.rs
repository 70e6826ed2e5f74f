//! The supervisor itself (spec §4.2): spawns the child, streams its
//! stdout for sentinel-prefixed progress events, enforces the computed
//! deadline, and classifies the outcome on exit.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use config::Profile;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};

use crate::capture::CaptureBuffer;
use crate::checkpoint::{self, PhaseCheckpoint};
use crate::child_args::SuperviseConfig;
use crate::error::SupervisorError;
use crate::sentinel;
use crate::sink::ProgressSink;

/// Grace period between SIGTERM and SIGKILL (spec §4.2 step 5).
const TERMINATION_GRACE: Duration = Duration::from_secs(5);

pub enum SuperviseOutcome {
    Completed {
        result: serde_json::Value,
    },
    Failed {
        message: String,
        partial_result: Option<serde_json::Value>,
    },
    Cancelled {
        partial_result: Option<serde_json::Value>,
    },
}

enum RaceOutcome {
    Exited(std::process::ExitStatus),
    DeadlineExceeded,
    Cancelled,
}

/// Supervises one child process end to end. `child_binary` is the
/// exploration-runner entrypoint (the `cli` crate's subprocess binary);
/// `step_budget` is the profile's step ceiling used to compute the deadline
/// (spec §4.2 step 1).
pub async fn supervise(
    child_binary: &Path,
    cfg: &SuperviseConfig,
    profile: &Profile,
    step_budget: u32,
    sink: Arc<dyn ProgressSink>,
    cancel_rx: oneshot::Receiver<()>,
) -> Result<SuperviseOutcome, SupervisorError> {
    let deadline = config::profiles::compute_deadline(step_budget, profile);

    let mut child = Command::new(child_binary)
        .args(cfg.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(SupervisorError::Spawn)?;

    let stdout = child.stdout.take().expect("child spawned with piped stdout");
    let stderr = child.stderr.take().expect("child spawned with piped stderr");

    let last_step: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let stdout_capture = Arc::new(Mutex::new(CaptureBuffer::new()));
    let stderr_capture = Arc::new(Mutex::new(CaptureBuffer::new()));

    let stdout_task = tokio::spawn(pump_stdout(
        stdout,
        Arc::clone(&sink),
        cfg.analysis_id.clone(),
        Arc::clone(&last_step),
        Arc::clone(&stdout_capture),
    ));
    let stderr_task = tokio::spawn(pump_stderr(stderr, Arc::clone(&stderr_capture)));

    let started = Instant::now();
    let race = race_to_completion(&mut child, deadline, cancel_rx).await?;

    match race {
        RaceOutcome::Exited(status) => {
            let _ = tokio::time::timeout(Duration::from_secs(2), stdout_task).await;
            let _ = tokio::time::timeout(Duration::from_secs(2), stderr_task).await;

            if status.success() {
                match checkpoint::read(&cfg.checkpoint_dir, "result").await {
                    Some(PhaseCheckpoint { payload, .. }) => Ok(SuperviseOutcome::Completed { result: payload }),
                    None => Ok(SuperviseOutcome::Failed {
                        message: "analysis process exited successfully but wrote no result checkpoint".to_string(),
                        partial_result: checkpoint::read_latest(&cfg.checkpoint_dir).await.map(|c| c.payload),
                    }),
                }
            } else {
                let last_step = last_step.lock().await.clone();
                let last_stderr = stderr_capture.lock().await.last_meaningful_line().map(str::to_string);
                let partial_result = checkpoint::read_latest(&cfg.checkpoint_dir).await.map(|c| c.payload);
                Ok(SuperviseOutcome::Failed {
                    message: classify_exit_failure(status.code(), last_step.as_deref(), last_stderr.as_deref()),
                    partial_result,
                })
            }
        }
        RaceOutcome::DeadlineExceeded => {
            terminate_gracefully(&mut child).await;
            let _ = tokio::time::timeout(Duration::from_secs(2), stdout_task).await;
            let _ = tokio::time::timeout(Duration::from_secs(2), stderr_task).await;
            let last_step = last_step.lock().await.clone();
            let partial_result = checkpoint::read_latest(&cfg.checkpoint_dir).await.map(|c| c.payload);
            Ok(SuperviseOutcome::Failed {
                message: classify_timeout(started.elapsed(), last_step.as_deref()),
                partial_result,
            })
        }
        RaceOutcome::Cancelled => {
            terminate_gracefully(&mut child).await;
            let _ = tokio::time::timeout(Duration::from_secs(2), stdout_task).await;
            let _ = tokio::time::timeout(Duration::from_secs(2), stderr_task).await;
            let partial_result = checkpoint::read_latest(&cfg.checkpoint_dir).await.map(|c| c.payload);
            Ok(SuperviseOutcome::Cancelled { partial_result })
        }
    }
}

async fn race_to_completion(
    child: &mut Child,
    deadline: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Result<RaceOutcome, SupervisorError> {
    tokio::select! {
        status = child.wait() => Ok(RaceOutcome::Exited(status.map_err(SupervisorError::Io)?)),
        _ = tokio::time::sleep(deadline) => Ok(RaceOutcome::DeadlineExceeded),
        _ = &mut cancel_rx => Ok(RaceOutcome::Cancelled),
    }
}

/// SIGTERM, then SIGKILL after [`TERMINATION_GRACE`] if the child hasn't
/// exited on its own (spec §4.2 step 5).
async fn terminate_gracefully(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: `pid` is this child's own process id, obtained from the
        // `Child` handle we still own; sending it SIGTERM is the standard
        // graceful-shutdown signal.
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    if tokio::time::timeout(TERMINATION_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

async fn pump_stdout(
    stdout: tokio::process::ChildStdout,
    sink: Arc<dyn ProgressSink>,
    analysis_id: String,
    last_step: Arc<Mutex<Option<String>>>,
    capture: Arc<Mutex<CaptureBuffer>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match sentinel::parse(&line) {
                Some(event) => {
                    if let Some(label) = wire_kind(&event) {
                        *last_step.lock().await = Some(label);
                    }
                    if let Err(err) = sink.handle(event).await {
                        tracing::error!(analysis_id, error = %err, "progress sink rejected an event");
                    }
                }
                None => capture.lock().await.push(line),
            },
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(analysis_id, error = %err, "error reading child stdout");
                break;
            }
        }
    }
}

async fn pump_stderr(stderr: tokio::process::ChildStderr, capture: Arc<Mutex<CaptureBuffer>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        capture.lock().await.push(line);
    }
}

fn wire_kind(event: &protocol::ProgressEvent) -> Option<String> {
    serde_json::to_value(&event.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}

fn classify_timeout(elapsed: Duration, last_step: Option<&str>) -> String {
    format!(
        "Analysis timed out after {} minutes (last step: {})",
        elapsed.as_secs() / 60,
        last_step.unwrap_or("unknown")
    )
}

fn classify_exit_failure(exit_code: Option<i32>, last_step: Option<&str>, last_stderr: Option<&str>) -> String {
    format!(
        "Analysis process exited with code {} (last step: {}): {}",
        exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
        last_step.unwrap_or("unknown"),
        last_stderr.unwrap_or("no output captured")
    )
}
