//! Named resource-profile presets (spec §6): per-profile model tier, step
//! ceiling, adaptive-extension toggles, and timeout bounds.

use std::time::Duration;

/// One resolved profile: `{ model, maxTokens, agentSteps, temperature,
/// adaptiveSteps, adaptiveTime, maxTotalSteps, maxTotalTimeout,
/// synthesisMaxTokens }` (spec §6).
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    pub name: &'static str,
    pub model: &'static str,
    pub max_tokens: u32,
    pub agent_steps: u32,
    pub temperature: f32,
    pub adaptive_steps: bool,
    pub adaptive_time: bool,
    pub max_total_steps: u32,
    pub max_total_timeout: Duration,
    pub synthesis_max_tokens: u32,
}

const QUICK: Profile = Profile {
    name: "quick",
    model: "claude-sonnet-4-5",
    max_tokens: 4096,
    agent_steps: 8,
    temperature: 0.7,
    adaptive_steps: false,
    adaptive_time: false,
    max_total_steps: 8,
    max_total_timeout: Duration::from_secs(10 * 60),
    synthesis_max_tokens: 2048,
};

const BALANCED: Profile = Profile {
    name: "balanced",
    model: "claude-sonnet-4-5",
    max_tokens: 4096,
    agent_steps: 15,
    temperature: 0.7,
    adaptive_steps: false,
    adaptive_time: false,
    max_total_steps: 15,
    max_total_timeout: Duration::from_secs(25 * 60),
    synthesis_max_tokens: 4096,
};

const THOROUGH: Profile = Profile {
    name: "thorough",
    model: "claude-sonnet-4-5",
    max_tokens: 8192,
    agent_steps: 20,
    temperature: 0.7,
    adaptive_steps: true,
    adaptive_time: true,
    max_total_steps: 50,
    max_total_timeout: Duration::from_secs(60 * 60),
    synthesis_max_tokens: 4096,
};

const MAXIMUM: Profile = Profile {
    name: "maximum",
    model: "claude-opus-4-1",
    max_tokens: 8192,
    agent_steps: 40,
    temperature: 0.7,
    adaptive_steps: true,
    adaptive_time: true,
    max_total_steps: 80,
    max_total_timeout: Duration::from_secs(60 * 60),
    synthesis_max_tokens: 8192,
};

const DEBUG: Profile = Profile {
    name: "debug",
    model: "claude-sonnet-4-5",
    max_tokens: 4096,
    agent_steps: 5,
    temperature: 0.0,
    adaptive_steps: false,
    adaptive_time: false,
    max_total_steps: 5,
    max_total_timeout: Duration::from_secs(5 * 60),
    synthesis_max_tokens: 2048,
};

const ALL: &[Profile] = &[QUICK, BALANCED, THOROUGH, MAXIMUM, DEBUG];

/// Looks up a profile by name (case-sensitive, as it travels on the wire in
/// `StartAnalysisRequest`).
pub fn resolve(name: &str) -> Option<Profile> {
    ALL.iter().find(|p| p.name == name).cloned()
}

/// `(usd_per_million_input, usd_per_million_output)` for a model tier, fed
/// into `LlmUsage::credits` to price each step as it's recorded. Unknown
/// model strings fall back to the Sonnet rate rather than erroring, since a
/// step must always get *some* credit figure.
pub fn model_rate_usd_per_million(model: &str) -> (f64, f64) {
    match model {
        "claude-opus-4-1" => (15.0, 75.0),
        "claude-sonnet-4-5" => (3.0, 15.0),
        "gpt-4o-mini" => (0.15, 0.6),
        _ => (3.0, 15.0),
    }
}

/// The subprocess deadline formula (spec §4.2 step 1): `steps * 75s + 7min`,
/// clamped to `[5min, 60min]`, then further clamped to the profile's own
/// `max_total_timeout` ceiling.
pub fn compute_deadline(step_budget: u32, profile: &Profile) -> Duration {
    let raw = Duration::from_secs(step_budget as u64 * 75) + Duration::from_secs(7 * 60);
    let clamped = raw.clamp(Duration::from_secs(5 * 60), Duration::from_secs(60 * 60));
    clamped.min(profile.max_total_timeout)
}
