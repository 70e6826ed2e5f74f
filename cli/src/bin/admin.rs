//! Operator-facing CLI over [`cli::QaService`] (spec §6): one process per
//! invocation, one subcommand per external operation. Every subcommand
//! prints a single JSON document to stdout (or, for `subscribe`, one JSON
//! line per event) so it composes with `jq` the way an admin tool should.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use cli::{PlatformService, QaService, StartAnalysisRequest};
use store::models::Module;
use store::{AnalysisStore, StepStore};

#[derive(Parser, Debug)]
#[command(name = "qa-admin")]
struct Cli {
    /// Root directory for the SQLite database, screenshot tree, and
    /// per-analysis checkpoint directories (spec §3, §9).
    #[arg(long, env = "QA_DATA_ROOT", default_value = "./qa-data")]
    data_root: PathBuf,
    /// Path to the `qa-runner` binary this process supervises.
    #[arg(long, env = "QA_RUNNER_BINARY", default_value = "qa-runner")]
    runner_binary: PathBuf,
    /// Maximum number of concurrently supervised analyses (spec §4.1).
    #[arg(long, env = "QA_ADMISSION_CAPACITY", default_value_t = 4)]
    admission_capacity: usize,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// `StartAnalysis` (spec §6).
    Start {
        #[arg(long)]
        url: String,
        #[arg(long, value_delimiter = ',')]
        modules: Vec<String>,
        #[arg(long, default_value = "balanced")]
        profile: String,
        #[arg(long)]
        agent_mode: bool,
        #[arg(long, default_value = "desktop")]
        viewport: String,
        #[arg(long)]
        adaptive_steps: bool,
        #[arg(long)]
        adaptive_time: bool,
        #[arg(long)]
        creator: Option<String>,
        #[arg(long)]
        project_id: Option<String>,
    },
    /// `GetAnalysis` (spec §6).
    Get { id: String },
    /// `ListSteps` (spec §6).
    Steps { id: String },
    /// `CancelAnalysis` (spec §6).
    Cancel { id: String },
    /// `ContinueAnalysis` (spec §6).
    Continue { id: String },
    /// `SubscribeEvents` (spec §6): prints the reconnect backlog, then
    /// streams live events as newline-delimited JSON until the analysis's
    /// channel closes or the process is interrupted.
    Subscribe {
        id: String,
        #[arg(long)]
        after_seq: Option<u64>,
    },
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(err) => error!(error = %err, "failed to serialize response"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::logging::init();
    let _ = config::load_and_apply("qa", None);
    let args = Cli::parse();

    std::fs::create_dir_all(&args.data_root)?;
    let db_path = args.data_root.join("qa.sqlite");
    let screenshots_root = args.data_root.join("screenshots");
    let checkpoint_root = args.data_root.join("checkpoints");
    std::fs::create_dir_all(&checkpoint_root)?;

    let analysis_store = AnalysisStore::open(db_path.clone())?;
    let step_store = StepStore::open(db_path, screenshots_root)?;

    let now = chrono::Utc::now().timestamp_millis();
    let recovered = analysis_store.sweep_orphaned_running(now).await?;
    if recovered > 0 {
        info!(recovered, "marked orphaned running analyses as failed on startup");
    }

    let bus = Arc::new(cli::EventBus::new(analysis_store.clone(), step_store.clone()));
    let admission = admission::AdmissionGate::new(args.admission_capacity);
    let service: Arc<PlatformService> = Arc::new(PlatformService::new(
        analysis_store,
        step_store,
        admission,
        bus,
        args.runner_binary,
        checkpoint_root,
    ));

    match args.command {
        Command::Start {
            url,
            modules,
            profile,
            agent_mode,
            viewport,
            adaptive_steps,
            adaptive_time,
            creator,
            project_id,
        } => {
            let modules: Vec<Module> = modules.iter().filter_map(|s| Module::parse(s)).collect();
            let analysis = service
                .start_analysis(StartAnalysisRequest {
                    url,
                    modules,
                    profile,
                    agent_mode,
                    viewport,
                    adaptive_steps,
                    adaptive_time,
                    creator,
                    project_id,
                })
                .await?;
            print_json(&analysis);
        }
        Command::Get { id } => {
            let analysis = service.get_analysis(&id).await?;
            print_json(&analysis);
        }
        Command::Steps { id } => {
            let steps = service.list_steps(&id).await?;
            print_json(&steps);
        }
        Command::Cancel { id } => {
            service.cancel_analysis(&id).await?;
            print_json(&serde_json::json!({"cancelled": id}));
        }
        Command::Continue { id } => {
            let analysis = service.continue_analysis(&id).await?;
            print_json(&analysis);
        }
        Command::Subscribe { id, after_seq } => {
            let (backlog, mut rx) = service.subscribe_events(&id, after_seq).await?;
            for event in &backlog {
                print_json(event);
            }
            loop {
                match rx.recv().await {
                    Ok(event) => print_json(&event),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        error!(skipped, "subscriber lagged behind the event bus, some events were dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_comma_joined_modules() {
        let cli = Cli::parse_from([
            "qa-admin",
            "start",
            "--url",
            "https://example.com/game",
            "--modules",
            "ui_ux,test_flows",
            "--profile",
            "thorough",
            "--adaptive-steps",
        ]);
        match cli.command {
            Command::Start { url, modules, profile, adaptive_steps, adaptive_time, .. } => {
                assert_eq!(url, "https://example.com/game");
                assert_eq!(modules, vec!["ui_ux", "test_flows"]);
                assert_eq!(profile, "thorough");
                assert!(adaptive_steps);
                assert!(!adaptive_time);
            }
            other => panic!("expected Start, got {other:?}"),
        }
    }

    #[test]
    fn admission_capacity_defaults_to_four() {
        let cli = Cli::parse_from(["qa-admin", "get", "an-1"]);
        assert_eq!(cli.admission_capacity, 4);
        match cli.command {
            Command::Get { id } => assert_eq!(id, "an-1"),
            other => panic!("expected Get, got {other:?}"),
        }
    }

    #[test]
    fn subscribe_parses_optional_after_seq() {
        let cli = Cli::parse_from(["qa-admin", "subscribe", "an-1", "--after-seq", "42"]);
        match cli.command {
            Command::Subscribe { id, after_seq } => {
                assert_eq!(id, "an-1");
                assert_eq!(after_seq, Some(42));
            }
            other => panic!("expected Subscribe, got {other:?}"),
        }
    }
}
