//! Builds the child process's argv from a [`SuperviseConfig`] (spec §4.2:
//! "Starts the child with arguments derived from `cfg`").

use std::path::PathBuf;

use store::models::Module;

/// Everything needed to supervise one analysis run, mirroring
/// `StartAnalysisRequest` (spec §3/§4.1) plus the resume pointer and the
/// directory phase checkpoints are written to.
#[derive(Clone, Debug)]
pub struct SuperviseConfig {
    pub analysis_id: String,
    pub url: String,
    pub profile: String,
    pub modules: Vec<Module>,
    pub viewport: String,
    pub agent_mode: bool,
    pub adaptive_steps: bool,
    pub adaptive_time: bool,
    pub checkpoint_dir: PathBuf,
    /// `Some((phase, path))` when resuming from a prior checkpoint
    /// (`ContinueAnalysis`, spec §6).
    pub resume_from: Option<(String, PathBuf)>,
}

impl SuperviseConfig {
    /// Renders this config as the argv for the exploration-runner child
    /// process (everything after argv[0]).
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--analysis-id".to_string(),
            self.analysis_id.clone(),
            "--url".to_string(),
            self.url.clone(),
            "--profile".to_string(),
            self.profile.clone(),
            "--viewport".to_string(),
            self.viewport.clone(),
            "--checkpoint-dir".to_string(),
            self.checkpoint_dir.to_string_lossy().into_owned(),
        ];

        if !self.modules.is_empty() {
            args.push("--modules".to_string());
            args.push(Module::join(&self.modules));
        }
        if self.agent_mode {
            args.push("--agent-mode".to_string());
        }
        if self.adaptive_steps {
            args.push("--adaptive-steps".to_string());
        }
        if self.adaptive_time {
            args.push("--adaptive-time".to_string());
        }
        if let Some((phase, path)) = &self.resume_from {
            args.push(format!("--resume-from={phase}"));
            args.push(format!("--resume-data={}", path.to_string_lossy()));
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SuperviseConfig {
        SuperviseConfig {
            analysis_id: "an-1".to_string(),
            url: "https://example.com/game".to_string(),
            profile: "balanced".to_string(),
            modules: vec![Module::UiUx, Module::TestFlows],
            viewport: "desktop".to_string(),
            agent_mode: false,
            adaptive_steps: true,
            adaptive_time: false,
            checkpoint_dir: PathBuf::from("/tmp/qa/an-1"),
            resume_from: None,
        }
    }

    #[test]
    fn renders_modules_as_a_comma_joined_list() {
        let args = base_config().to_args();
        let idx = args.iter().position(|a| a == "--modules").unwrap();
        assert_eq!(args[idx + 1], "ui_ux,test_flows");
    }

    #[test]
    fn resume_pointer_renders_as_two_equals_style_flags() {
        let mut cfg = base_config();
        cfg.resume_from = Some(("synthesis".to_string(), PathBuf::from("/tmp/qa/an-1/checkpoint-synthesis.json")));
        let args = cfg.to_args();
        assert!(args.contains(&"--resume-from=synthesis".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--resume-data=")));
    }

    #[test]
    fn flags_are_omitted_when_disabled() {
        let mut cfg = base_config();
        cfg.adaptive_steps = false;
        let args = cfg.to_args();
        assert!(!args.contains(&"--adaptive-steps".to_string()));
    }
}
