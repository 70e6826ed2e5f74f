//! The exploration-runner child process (spec §4.2, §4.4): one analysis
//! per invocation, launched by `supervisor::supervise` with argv built from
//! `SuperviseConfig::to_args`. Everything observable crosses the process
//! boundary as sentinel-prefixed stdout lines (`supervisor::sentinel`);
//! everything durable (steps, screenshots, phase checkpoints) is written
//! straight to the same SQLite database and screenshot tree the admin
//! process reads, derived from `--checkpoint-dir`'s parent (Open Question
//! resolution #5, see `DESIGN.md`) rather than over some extra IPC channel.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use clap::Parser;
use tracing::{error, info, warn};

use qa_core::agent::explore::{explore, pseudo_tools, BudgetPolicy, ExploreConfig, ExplorationStep, StepSink};
use qa_core::{AgentError, AnthropicClient, ChatOpenAI, LlmClient, LlmUsage, Message, RunnableConfig, TerminationReason};
use store::{AgentStepRow, Module, StepStore};
use supervisor::checkpoint::{self, PhaseCheckpoint};

/// A subprocess phase boundary (spec §4.2, §9): `--resume-from` names the
/// last phase that finished before the prior attempt died, so a resumed run
/// skips it and everything before it rather than redoing work a checkpoint
/// already captured.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Scout,
    Explore,
    Synthesis,
    Result,
}

impl Phase {
    fn parse(s: &str) -> Option<Phase> {
        match s {
            "scout" => Some(Phase::Scout),
            "explore" => Some(Phase::Explore),
            "synthesis" => Some(Phase::Synthesis),
            "result" => Some(Phase::Result),
            _ => None,
        }
    }
}

/// What the explore-or-later phases converge on before the shared scenario
/// generation / cost estimate / result-checkpoint tail.
struct RunOutcome {
    findings: serde_json::Value,
    total_usage: LlmUsage,
    step_count: u32,
    turn_count: u32,
    termination_reason: TerminationReason,
}

#[derive(Parser, Debug)]
#[command(name = "qa-runner")]
struct Args {
    #[arg(long = "analysis-id")]
    analysis_id: String,
    #[arg(long)]
    url: String,
    #[arg(long)]
    profile: String,
    #[arg(long)]
    viewport: String,
    #[arg(long = "checkpoint-dir")]
    checkpoint_dir: PathBuf,
    #[arg(long, value_delimiter = ',', default_value = "")]
    modules: Vec<String>,
    #[arg(long = "agent-mode")]
    agent_mode: bool,
    #[arg(long = "adaptive-steps")]
    adaptive_steps: bool,
    #[arg(long = "adaptive-time")]
    adaptive_time: bool,
    #[arg(long = "resume-from")]
    resume_from: Option<String>,
    #[arg(long = "resume-data")]
    resume_data: Option<PathBuf>,
}

/// Loads a phase checkpoint, preferring the exact file `--resume-data`
/// pointed at (what `PlatformService::continue_analysis` resolved) and
/// falling back to the checkpoint dir's own `checkpoint-{phase}.json`
/// convention when no explicit path was given.
async fn read_phase_checkpoint(
    checkpoint_dir: &std::path::Path,
    phase: &str,
    explicit_path: Option<&std::path::Path>,
) -> Option<PhaseCheckpoint> {
    if let Some(path) = explicit_path {
        let body = tokio::fs::read(path).await.ok()?;
        return serde_json::from_slice(&body).ok();
    }
    checkpoint::read(checkpoint_dir, phase).await
}

/// Sibling store under the checkpoint root shared with the admin process
/// (`{checkpoint_root}/qa.sqlite`, `{checkpoint_root}/screenshots`); the
/// checkpoint dir itself is `{checkpoint_root}/{analysisID}`.
fn store_paths(checkpoint_dir: &std::path::Path) -> (PathBuf, PathBuf) {
    let root = checkpoint_dir.parent().unwrap_or(checkpoint_dir);
    (root.join("qa.sqlite"), root.join("screenshots"))
}

fn emit(event: protocol::ProgressEvent) {
    match supervisor::sentinel::format(&event) {
        Ok(line) => println!("{line}"),
        Err(err) => error!(error = %err, "failed to serialize a progress event"),
    }
}

/// Persists each step's screenshot and row directly (shared filesystem with
/// the admin process), then emits the sentinel line the supervisor forwards
/// to the event bus for broadcast.
struct PersistingStepSink {
    analysis_id: String,
    step_store: StepStore,
    rate: (f64, f64),
}

#[async_trait::async_trait]
impl StepSink for PersistingStepSink {
    async fn record_step(&self, step: ExplorationStep) -> Result<(), AgentError> {
        let screenshot_path = match &step.screenshot_base64 {
            Some(b64) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(b64)
                    .map_err(|e| AgentError::ToolExec(format!("screenshot was not valid base64: {e}")))?;
                let path = self
                    .step_store
                    .write_screenshot(self.analysis_id.as_str(), step.step_number, bytes)
                    .await
                    .map_err(|e| AgentError::ToolExec(e.to_string()))?;
                Some(path.to_string_lossy().into_owned())
            }
            None => None,
        };

        let usage = step.usage.unwrap_or_default();
        let now = chrono::Utc::now().timestamp_millis();
        let row = AgentStepRow {
            analysis_id: self.analysis_id.clone(),
            step_number: step.step_number,
            tool_name: step.tool_name.clone(),
            input: step.input.clone(),
            result_summary: step.result_summary.clone(),
            screenshot_path: screenshot_path.clone(),
            duration_ms: step.duration_ms,
            thinking_ms: step.thinking_ms,
            error: step.error.clone(),
            reasoning: step.reasoning.clone(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_creation_tokens: usage.cache_creation_input_tokens,
            cache_read_tokens: usage.cache_read_input_tokens,
            credits: usage.credits(self.rate.0, self.rate.1),
            created_at_unix_ms: now,
        };

        emit(
            protocol::ProgressEvent::with_payload(
                protocol::EventKind::AgentStepDetail,
                self.analysis_id.as_str(),
                Some(step.step_number),
                &row,
            )
            .map_err(|e| AgentError::ToolExec(e.to_string()))?,
        );

        if let Some(reasoning) = &step.reasoning {
            emit(protocol::ProgressEvent::new(
                protocol::EventKind::AgentReasoning,
                self.analysis_id.as_str(),
                Some(step.step_number),
                serde_json::json!({"reasoning": reasoning}),
            ));
        }

        if let Some(path) = screenshot_path {
            emit(protocol::ProgressEvent::with_payload(
                protocol::EventKind::AgentScreenshot,
                self.analysis_id.as_str(),
                Some(step.step_number),
                &protocol::AgentScreenshotData {
                    step: step.step_number,
                    url: path,
                },
            )
            .map_err(|e| AgentError::ToolExec(e.to_string()))?);
        }

        Ok(())
    }
}

fn build_system_prompt(modules: &[Module], agent_mode: bool) -> String {
    let mut prompt = String::from(
        "You are exploring a browser-based game or interactive web experience. \
         Use the provided tools to navigate, click, type, scroll, and observe the page. \
         Take a screenshot whenever you need to see the current state; most tools attach \
         one automatically. Explore broadly: try the main menu, core gameplay loop, and any \
         settings or help screens you find. When you have seen enough to describe the game's \
         mechanics, UI, and any edge cases, stop calling tools and summarize what you found.",
    );
    if agent_mode {
        prompt.push_str(
            "\n\nPlay to make real progress: pursue win conditions and level transitions rather \
             than only surveying screens.",
        );
    }
    if !modules.is_empty() {
        prompt.push_str("\n\nPay particular attention to: ");
        prompt.push_str(&Module::join(modules).replace(',', ", "));
    }
    prompt
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let analysis_id = args.analysis_id.clone();
    let modules: Vec<Module> = args.modules.iter().filter_map(|s| Module::parse(s)).collect();

    let profile = config::profiles::resolve(&args.profile)
        .ok_or_else(|| anyhow::anyhow!("unknown profile: {}", args.profile))?;

    let (db_path, screenshots_root) = store_paths(&args.checkpoint_dir);
    let step_store = StepStore::open(db_path, screenshots_root)?;
    let rate = config::profiles::model_rate_usd_per_million(profile.model);

    let resume_phase = args.resume_from.as_deref().and_then(Phase::parse);
    if resume_phase == Some(Phase::Result) {
        info!(analysis_id, "result already checkpointed, nothing left to resume");
        return Ok(());
    }

    let cancel_flag = Arc::new(AtomicBool::new(false));
    {
        let cancel_flag = Arc::clone(&cancel_flag);
        tokio::spawn(async move {
            if let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                sigterm.recv().await;
                warn!("received SIGTERM, signalling cancellation to the exploration loop");
                cancel_flag.store(true, Ordering::SeqCst);
            }
        });
    }

    let anthropic_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY is required"))?;
    let llm: Arc<dyn LlmClient> = Arc::new(
        AnthropicClient::new(anthropic_key, profile.model, profile.max_tokens).with_temperature(profile.temperature),
    );

    let openai_key = std::env::var("OPENAI_API_KEY").ok();
    let synthesis_max_tokens = synthesis::budget::synthesis_max_tokens(profile.synthesis_max_tokens, &modules);
    let synthesis_llm: Arc<dyn LlmClient> = match openai_key {
        Some(key) => Arc::new(ChatOpenAI::new(key, "gpt-4o-mini", synthesis_max_tokens)),
        None => Arc::clone(&llm),
    };

    let mut session: Option<Arc<browser::BrowserSession>> = None;

    let outcome: RunOutcome = match resume_phase {
        Some(Phase::Synthesis) => {
            let checkpoint = read_phase_checkpoint(&args.checkpoint_dir, "synthesis", args.resume_data.as_deref())
                .await
                .ok_or_else(|| anyhow::anyhow!("no synthesis checkpoint to resume from"))?;
            RunOutcome {
                findings: checkpoint.payload["findings"].clone(),
                total_usage: serde_json::from_value(checkpoint.payload["totalUsage"].clone())?,
                step_count: checkpoint.payload["stepCount"].as_u64().unwrap_or(0) as u32,
                turn_count: checkpoint.payload["turnCount"].as_u64().unwrap_or(0) as u32,
                termination_reason: serde_json::from_value(checkpoint.payload["terminationReason"].clone())?,
            }
        }
        Some(Phase::Explore) => {
            let checkpoint = read_phase_checkpoint(&args.checkpoint_dir, "explore", args.resume_data.as_deref())
                .await
                .ok_or_else(|| anyhow::anyhow!("no explore checkpoint to resume from"))?;
            let messages: Vec<Message> = serde_json::from_value(checkpoint.payload["messages"].clone())?;
            let total_usage: LlmUsage = serde_json::from_value(checkpoint.payload["totalUsage"].clone())?;
            let step_count = checkpoint.payload["stepCount"].as_u64().unwrap_or(0) as u32;
            let turn_count = checkpoint.payload["turnCount"].as_u64().unwrap_or(0) as u32;
            let termination_reason: TerminationReason =
                serde_json::from_value(checkpoint.payload["terminationReason"].clone())?;

            run_synthesis(
                &args.checkpoint_dir,
                &analysis_id,
                synthesis_llm.as_ref(),
                &modules,
                &messages,
                total_usage,
                step_count,
                turn_count,
                termination_reason,
            )
            .await?
        }
        // `None` (a fresh run) and `Some(Phase::Scout)` both fall through here:
        // the scout phase has no standalone state worth reloading, so resuming
        // from it just re-runs it alongside the rest of the pipeline.
        _ => {
            emit(protocol::ProgressEvent::new(
                protocol::EventKind::Scouting,
                analysis_id.as_str(),
                None,
                serde_json::json!({"url": args.url}),
            ));

            let viewport = browser::resolve_viewport(&args.viewport);
            let browser_session = Arc::new(browser::BrowserSession::launch(viewport).await?);
            browser_session.navigate(&args.url).await?;

            let mut registry = qa_core::tools::ToolRegistry::new();
            browser::register_all(&mut registry, Arc::clone(&browser_session));
            pseudo_tools::register_all(&mut registry);
            let tool_source: Arc<dyn qa_core::ToolSource> =
                Arc::new(qa_core::tools::AggregateToolSource::new(registry));

            checkpoint::write(
                &args.checkpoint_dir,
                &PhaseCheckpoint {
                    phase: "scout".to_string(),
                    analysis_id: analysis_id.clone(),
                    payload: serde_json::json!({"url": args.url}),
                },
            )
            .await?;

            let mut budget_policy = BudgetPolicy {
                max_total_steps: profile.max_total_steps,
                ..BudgetPolicy::default()
            };
            let total_budget = config::profiles::compute_deadline(profile.agent_steps, &profile);
            let synthesis_reserve = synthesis::budget::clamp_reserve(
                Duration::from_secs(7 * 60),
                profile.max_total_timeout,
                total_budget,
            );
            let explore_budget = total_budget.saturating_sub(synthesis_reserve);
            let now_unix_ms = chrono::Utc::now().timestamp_millis();
            let deadline_unix_ms = now_unix_ms + explore_budget.as_millis() as i64;
            budget_policy.max_deadline_unix_ms = now_unix_ms + profile.max_total_timeout.as_millis() as i64;

            if !args.adaptive_steps {
                budget_policy.max_total_steps = profile.agent_steps;
            }
            if !args.adaptive_time {
                budget_policy.max_deadline_unix_ms = deadline_unix_ms;
            }

            let step_sink: Arc<dyn StepSink> = Arc::new(PersistingStepSink {
                analysis_id: analysis_id.clone(),
                step_store: step_store.clone(),
                rate,
            });

            let explore_config = ExploreConfig {
                system_prompt: build_system_prompt(&modules, args.agent_mode),
                step_budget: profile.agent_steps,
                deadline_unix_ms,
                budget_policy,
            };

            let transcript = explore(
                explore_config,
                args.url.clone(),
                Arc::clone(&llm),
                tool_source,
                Some(step_sink),
                Arc::clone(&cancel_flag),
                None,
                RunnableConfig::new(analysis_id.clone()),
            )
            .await?;

            if transcript.final_state.extra_steps_granted > 0 {
                emit(protocol::ProgressEvent::with_payload(
                    protocol::EventKind::AgentAdaptive,
                    analysis_id.as_str(),
                    None,
                    &protocol::AdaptiveGrantData {
                        granted_steps: Some(transcript.final_state.extra_steps_granted),
                        granted_time_ms: None,
                        new_step_ceiling: transcript.final_state.effective_step_budget(),
                        new_deadline_unix_ms: transcript.final_state.effective_deadline_unix_ms(),
                    },
                )?);
            }
            if transcript.final_state.extra_time_granted_ms > 0 {
                emit(protocol::ProgressEvent::with_payload(
                    protocol::EventKind::AgentTimeoutExtend,
                    analysis_id.as_str(),
                    None,
                    &protocol::AdaptiveGrantData {
                        granted_steps: None,
                        granted_time_ms: Some(transcript.final_state.extra_time_granted_ms),
                        new_step_ceiling: transcript.final_state.effective_step_budget(),
                        new_deadline_unix_ms: transcript.final_state.effective_deadline_unix_ms(),
                    },
                )?);
            }

            checkpoint::write(
                &args.checkpoint_dir,
                &PhaseCheckpoint {
                    phase: "explore".to_string(),
                    analysis_id: analysis_id.clone(),
                    payload: serde_json::json!({
                        "stepCount": transcript.step_count(),
                        "turnCount": transcript.turn_count(),
                        "terminationReason": transcript.termination_reason,
                        "messages": transcript.final_state.messages,
                        "totalUsage": transcript.total_usage(),
                    }),
                },
            )
            .await?;

            // Cancellation is surfaced to the supervisor via our own exit
            // path, not via synthesis: a cancelled run has nothing worth
            // summarizing.
            if transcript.termination_reason == TerminationReason::Cancelled {
                close_session(Some(browser_session)).await;
                anyhow::bail!("analysis cancelled");
            }

            session = Some(browser_session);

            run_synthesis(
                &args.checkpoint_dir,
                &analysis_id,
                synthesis_llm.as_ref(),
                &modules,
                &transcript.final_state.messages,
                transcript.total_usage(),
                transcript.step_count(),
                transcript.turn_count(),
                transcript.termination_reason,
            )
            .await?
        }
    };

    let mut total_usage = outcome.total_usage;
    let mut result = serde_json::json!({
        "findings": outcome.findings,
        "stepCount": outcome.step_count,
        "terminationReason": outcome.termination_reason,
    });

    if synthesis::scenarios::enabled(&modules) {
        emit(protocol::ProgressEvent::new(
            protocol::EventKind::Flows("generating".to_string()),
            analysis_id.as_str(),
            None,
            serde_json::Value::Null,
        ));
        match synthesis::generate_scenarios(synthesis_llm.as_ref(), &outcome.findings).await {
            Ok(scenario_outcome) => {
                total_usage.accumulate(&scenario_outcome.usage);
                result["scenarios"] = serde_json::to_value(&scenario_outcome.scenarios).unwrap_or_default();
                emit(protocol::ProgressEvent::new(
                    protocol::EventKind::Flows("generated".to_string()),
                    analysis_id.as_str(),
                    None,
                    serde_json::json!({"count": scenario_outcome.scenarios.len()}),
                ));
            }
            Err(err) => {
                warn!(error = %err, "scenario generation failed, proceeding without scenarios");
                emit(protocol::ProgressEvent::new(
                    protocol::EventKind::Flows("failed".to_string()),
                    analysis_id.as_str(),
                    None,
                    serde_json::json!({"error": err.to_string()}),
                ));
            }
        }
    }

    emit(protocol::ProgressEvent::with_payload(
        protocol::EventKind::CostEstimate,
        analysis_id.as_str(),
        None,
        &protocol::CostEstimateData {
            input: total_usage.input_tokens,
            output: total_usage.output_tokens,
            cache_creation: total_usage.cache_creation_input_tokens,
            cache_read: total_usage.cache_read_input_tokens,
            api_calls: outcome.turn_count,
            credits: total_usage.credits(rate.0, rate.1),
            usd: total_usage.credits(rate.0, rate.1) / 100.0,
        },
    )?);

    checkpoint::write(
        &args.checkpoint_dir,
        &PhaseCheckpoint {
            phase: "result".to_string(),
            analysis_id: analysis_id.clone(),
            payload: result,
        },
    )
    .await?;

    close_session(session).await;
    Ok(())
}

/// Runs the synthesis phase and checkpoints its own output (shared by the
/// fresh-run path and the explore-checkpoint resume path, since both arrive
/// here with nothing left but a message transcript and a running usage
/// total).
#[allow(clippy::too_many_arguments)]
async fn run_synthesis(
    checkpoint_dir: &std::path::Path,
    analysis_id: &str,
    synthesis_llm: &dyn LlmClient,
    modules: &[Module],
    messages: &[Message],
    mut total_usage: LlmUsage,
    step_count: u32,
    turn_count: u32,
    termination_reason: TerminationReason,
) -> Result<RunOutcome, anyhow::Error> {
    emit(protocol::ProgressEvent::new(
        protocol::EventKind::Synthesis,
        analysis_id,
        None,
        serde_json::Value::Null,
    ));

    let synthesis_outcome = synthesis::synthesize(synthesis_llm, modules, messages).await?;
    if let Some(warning) = &synthesis_outcome.repair_warning {
        emit(protocol::ProgressEvent::new(
            protocol::EventKind::SynthesisRetry,
            analysis_id,
            None,
            serde_json::json!({"warning": warning}),
        ));
    }
    total_usage.accumulate(&synthesis_outcome.usage);

    checkpoint::write(
        checkpoint_dir,
        &PhaseCheckpoint {
            phase: "synthesis".to_string(),
            analysis_id: analysis_id.to_string(),
            payload: serde_json::json!({
                "findings": synthesis_outcome.findings,
                "stepCount": step_count,
                "turnCount": turn_count,
                "terminationReason": termination_reason,
                "totalUsage": total_usage,
            }),
        },
    )
    .await?;

    Ok(RunOutcome {
        findings: synthesis_outcome.findings,
        total_usage,
        step_count,
        turn_count,
        termination_reason,
    })
}

/// Tools hold their own `Arc<BrowserSession>` clone, but `explore` takes the
/// tool source by value and drops it once the loop ends, so by the time we
/// get here this is the last reference. A resumed run that skipped past the
/// explore phase never launched a browser at all.
async fn close_session(session: Option<Arc<browser::BrowserSession>>) {
    let Some(session) = session else {
        return;
    };
    match Arc::try_unwrap(session) {
        Ok(session) => session.close().await,
        Err(_) => warn!("browser session still has outstanding references, skipping graceful close"),
    }
}

#[tokio::main]
async fn main() {
    cli::logging::init();
    let args = Args::parse();
    let analysis_id = args.analysis_id.clone();

    if let Err(err) = run(args).await {
        error!(analysis_id, error = %err, "exploration run failed");
        std::process::exit(1);
    }
    info!(analysis_id, "exploration run completed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_exact_argv_supervise_config_renders() {
        let args = Args::parse_from([
            "qa-runner",
            "--analysis-id",
            "an-1",
            "--url",
            "https://example.com/game",
            "--profile",
            "balanced",
            "--viewport",
            "desktop",
            "--checkpoint-dir",
            "/tmp/qa/an-1",
            "--modules",
            "ui_ux,test_flows",
            "--adaptive-steps",
            "--resume-from=explore",
            "--resume-data=/tmp/qa/an-1/checkpoint-explore.json",
        ]);
        assert_eq!(args.analysis_id, "an-1");
        assert_eq!(args.modules, vec!["ui_ux", "test_flows"]);
        assert!(args.adaptive_steps);
        assert!(!args.adaptive_time);
        assert_eq!(args.resume_from.as_deref(), Some("explore"));
        assert_eq!(
            args.resume_data,
            Some(PathBuf::from("/tmp/qa/an-1/checkpoint-explore.json"))
        );
    }

    #[test]
    fn store_paths_sit_alongside_the_checkpoint_root() {
        let (db, screenshots) = store_paths(std::path::Path::new("/data/checkpoints/an-1"));
        assert_eq!(db, PathBuf::from("/data/checkpoints/qa.sqlite"));
        assert_eq!(screenshots, PathBuf::from("/data/checkpoints/screenshots"));
    }

    #[test]
    fn system_prompt_mentions_agent_mode_only_when_enabled() {
        let modules = vec![Module::UiUx];
        assert!(!build_system_prompt(&modules, false).contains("win conditions"));
        assert!(build_system_prompt(&modules, true).contains("win conditions"));
    }

    #[test]
    fn system_prompt_lists_enabled_modules() {
        let modules = vec![Module::UiUx, Module::Wording];
        let prompt = build_system_prompt(&modules, false);
        assert!(prompt.contains("ui_ux"));
        assert!(prompt.contains("wording"));
    }
}
