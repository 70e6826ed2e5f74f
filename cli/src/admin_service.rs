//! [`QaService`] wired to real admission, persistence, and supervision: the
//! concrete thing `qa-admin`'s subcommands call through. One instance lives
//! for the process's lifetime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use store::models::{AgentStepRow, Analysis, AnalysisStatus};
use store::{AnalysisStore, StepStore};
use supervisor::checkpoint;
use supervisor::{supervise, SuperviseConfig, SuperviseOutcome};
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::service::{QaService, ServiceError, StartAnalysisRequest};

pub struct PlatformService {
    analysis_store: AnalysisStore,
    step_store: StepStore,
    admission: admission::AdmissionGate,
    bus: Arc<EventBus>,
    runner_binary: PathBuf,
    checkpoint_root: PathBuf,
    cancels: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl PlatformService {
    pub fn new(
        analysis_store: AnalysisStore,
        step_store: StepStore,
        admission: admission::AdmissionGate,
        bus: Arc<EventBus>,
        runner_binary: PathBuf,
        checkpoint_root: PathBuf,
    ) -> Self {
        Self {
            analysis_store,
            step_store,
            admission,
            bus,
            runner_binary,
            checkpoint_root,
            cancels: Mutex::new(HashMap::new()),
        }
    }

    fn checkpoint_dir(&self, analysis_id: &str) -> PathBuf {
        self.checkpoint_root.join(analysis_id)
    }

    /// Waits for an admission slot, then supervises the child process end to
    /// end, persisting the outcome. Spawned as a detached task so
    /// `start_analysis`/`continue_analysis` return once the row is queued
    /// rather than blocking on the whole run (spec §4.1).
    fn spawn_supervised_run(self: &Arc<Self>, cfg: SuperviseConfig, step_budget: u32) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let analysis_id = cfg.analysis_id.clone();
            let permit = match this.admission.acquire().await {
                Ok(p) => p,
                Err(err) => {
                    error!(analysis_id, error = %err, "admission wait exceeded, failing analysis");
                    let now = chrono::Utc::now().timestamp_millis();
                    let _ = this
                        .analysis_store
                        .fail(&analysis_id, &format!("queued too long: {err}"), None, now)
                        .await;
                    return;
                }
            };

            let now = chrono::Utc::now().timestamp_millis();
            if let Err(err) = this.analysis_store.mark_running(&analysis_id, "starting", now).await {
                error!(analysis_id, error = %err, "failed to mark analysis running");
                drop(permit);
                return;
            }

            let profile = match config::profiles::resolve(&cfg.profile) {
                Some(p) => p,
                None => {
                    let now = chrono::Utc::now().timestamp_millis();
                    let _ = this
                        .analysis_store
                        .fail(&analysis_id, &format!("unknown profile: {}", cfg.profile), None, now)
                        .await;
                    drop(permit);
                    return;
                }
            };

            let (cancel_tx, cancel_rx) = oneshot::channel();
            this.cancels.lock().unwrap().insert(analysis_id.clone(), cancel_tx);

            let outcome = supervise(
                &this.runner_binary,
                &cfg,
                &profile,
                step_budget,
                Arc::clone(&this.bus) as Arc<dyn supervisor::ProgressSink>,
                cancel_rx,
            )
            .await;

            this.cancels.lock().unwrap().remove(&analysis_id);
            drop(permit);

            let now = chrono::Utc::now().timestamp_millis();
            match outcome {
                Ok(SuperviseOutcome::Completed { result }) => {
                    if let Err(err) = this.analysis_store.complete(&analysis_id, result, now).await {
                        error!(analysis_id, error = %err, "failed to persist completed analysis");
                    }
                }
                Ok(SuperviseOutcome::Failed { message, partial_result }) => {
                    if let Err(err) = this
                        .analysis_store
                        .fail(&analysis_id, &message, partial_result, now)
                        .await
                    {
                        error!(analysis_id, error = %err, "failed to persist failed analysis");
                    }
                }
                Ok(SuperviseOutcome::Cancelled { partial_result }) => {
                    if let Err(err) = this
                        .analysis_store
                        .fail(&analysis_id, "cancelled by user", partial_result, now)
                        .await
                    {
                        error!(analysis_id, error = %err, "failed to persist cancelled analysis");
                    }
                }
                Err(err) => {
                    warn!(analysis_id, error = %err, "supervision itself failed");
                    let _ = this.analysis_store.fail(&analysis_id, &err.to_string(), None, now).await;
                }
            }
        });
    }
}

#[async_trait]
impl QaService for Arc<PlatformService> {
    async fn start_analysis(&self, req: StartAnalysisRequest) -> Result<Analysis, ServiceError> {
        let profile = config::profiles::resolve(&req.profile)
            .ok_or_else(|| ServiceError::UnknownProfile(req.profile.clone()))?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp_millis();
        let analysis = Analysis::new_queued(
            id.clone(),
            req.url.clone(),
            req.modules.clone(),
            req.profile.clone(),
            req.agent_mode,
            req.viewport.clone(),
            1.0,
            req.adaptive_steps,
            req.adaptive_time,
            req.creator.clone(),
            req.project_id.clone(),
            now,
        );
        self.analysis_store.insert(analysis.clone()).await?;

        let cfg = SuperviseConfig {
            analysis_id: id.clone(),
            url: req.url,
            profile: req.profile,
            modules: req.modules,
            viewport: req.viewport,
            agent_mode: req.agent_mode,
            adaptive_steps: req.adaptive_steps,
            adaptive_time: req.adaptive_time,
            checkpoint_dir: self.checkpoint_dir(&id),
            resume_from: None,
        };
        info!(analysis_id = %id, "analysis queued");
        self.spawn_supervised_run(cfg, profile.agent_steps);

        Ok(analysis)
    }

    async fn get_analysis(&self, id: &str) -> Result<Option<Analysis>, ServiceError> {
        Ok(self.analysis_store.get(id).await?)
    }

    async fn list_steps(&self, id: &str) -> Result<Vec<AgentStepRow>, ServiceError> {
        Ok(self.step_store.list(id).await?)
    }

    async fn cancel_analysis(&self, id: &str) -> Result<(), ServiceError> {
        let sender = self.cancels.lock().unwrap().remove(id);
        match sender {
            Some(tx) => {
                let _ = tx.send(());
                Ok(())
            }
            None => Err(ServiceError::NotFound(id.to_string())),
        }
    }

    async fn continue_analysis(&self, id: &str) -> Result<Analysis, ServiceError> {
        let analysis = self
            .analysis_store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        if analysis.status != AnalysisStatus::Failed {
            return Err(ServiceError::Admission(format!(
                "analysis {id} is not in a resumable state ({:?})",
                analysis.status
            )));
        }

        let profile =
            config::profiles::resolve(&analysis.profile).ok_or_else(|| ServiceError::UnknownProfile(analysis.profile.clone()))?;

        let checkpoint_dir = self.checkpoint_dir(id);
        let latest = checkpoint::read_latest(&checkpoint_dir)
            .await
            .ok_or_else(|| ServiceError::Admission(format!("no checkpoint to resume analysis {id} from")))?;
        let resume_path = checkpoint_dir.join(format!("checkpoint-{}.json", latest.phase));

        let now = chrono::Utc::now().timestamp_millis();
        self.analysis_store
            .set_status_and_step(id, AnalysisStatus::Queued, "resuming", now)
            .await?;

        let cfg = SuperviseConfig {
            analysis_id: id.to_string(),
            url: analysis.url.clone(),
            profile: analysis.profile.clone(),
            modules: analysis.modules.clone(),
            viewport: analysis.viewport.clone(),
            agent_mode: analysis.agent_mode,
            adaptive_steps: analysis.adaptive_steps,
            adaptive_time: analysis.adaptive_time,
            checkpoint_dir,
            resume_from: Some((latest.phase, resume_path)),
        };
        self.spawn_supervised_run(cfg, profile.agent_steps);

        self.analysis_store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn subscribe_events(
        &self,
        id: &str,
        after_seq: Option<u64>,
    ) -> Result<(Vec<protocol::SequencedEvent>, broadcast::Receiver<protocol::SequencedEvent>), ServiceError> {
        Ok(self.bus.subscribe(id, after_seq))
    }
}
