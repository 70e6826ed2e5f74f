//! Synthesis token/time budget rules (spec §4.5, §9).

use std::time::Duration;

use store::models::Module;

const SYNTHESIS_MAX_TOKENS_FLOOR: u32 = 8192;
const SYNTHESIS_MAX_TOKENS_RICH: u32 = 16384;

/// Enforces the synthesis max-token floor: at least 8192, raised to 16384
/// when UI/UX, Wording, and Game Design are all enabled (spec §4.5).
pub fn synthesis_max_tokens(configured: u32, modules: &[Module]) -> u32 {
    let floor = if all_rich_modules_enabled(modules) {
        SYNTHESIS_MAX_TOKENS_RICH
    } else {
        SYNTHESIS_MAX_TOKENS_FLOOR
    };
    configured.max(floor)
}

fn all_rich_modules_enabled(modules: &[Module]) -> bool {
    [Module::UiUx, Module::Wording, Module::GameDesign]
        .iter()
        .all(|m| modules.contains(m))
}

/// Clamps a configured synthesis time reserve to 30% of the total run
/// budget, then to whatever time actually remains when the explore loop
/// ends (Open Question decision #3, see `DESIGN.md`).
pub fn clamp_reserve(configured_reserve: Duration, total_budget: Duration, time_remaining: Duration) -> Duration {
    let ceiling = Duration::from_secs_f64(total_budget.as_secs_f64() * 0.3);
    configured_reserve.min(ceiling).min(time_remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_applies_when_modules_are_sparse() {
        assert_eq!(synthesis_max_tokens(2048, &[Module::TestFlows]), 8192);
    }

    #[test]
    fn floor_raises_to_16384_when_all_three_rich_modules_enabled() {
        let modules = [Module::UiUx, Module::Wording, Module::GameDesign];
        assert_eq!(synthesis_max_tokens(4096, &modules), 16384);
    }

    #[test]
    fn configured_value_above_the_floor_is_kept() {
        assert_eq!(synthesis_max_tokens(20_000, &[]), 20_000);
    }

    #[test]
    fn reserve_never_exceeds_thirty_percent_of_total_budget() {
        let reserve = clamp_reserve(
            Duration::from_secs(600),
            Duration::from_secs(1000),
            Duration::from_secs(1000),
        );
        assert_eq!(reserve, Duration::from_secs(300));
    }

    #[test]
    fn reserve_never_exceeds_time_actually_remaining() {
        let reserve = clamp_reserve(
            Duration::from_secs(600),
            Duration::from_secs(1000),
            Duration::from_secs(30),
        );
        assert_eq!(reserve, Duration::from_secs(30));
    }
}
