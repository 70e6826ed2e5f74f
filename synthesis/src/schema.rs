//! Conditional schema prompt assembly (spec §4.5): the synthesis system
//! prompt always asks for the core fields (game info, mechanics, UI
//! elements, user flows, edge cases) and appends one section per enabled
//! module, so a run with every optional module disabled gets a prompt with
//! no optional sections at all (spec §8 testable property).

use store::models::Module;

const CORE_SECTIONS: &str = r#"Summarize the exploration transcript as JSON with these top-level keys:
- "gameInfo": { "title": string, "genre": string, "summary": string }
- "mechanics": string[] — the core game mechanics observed
- "uiElements": string[] — UI elements encountered (buttons, menus, HUD)
- "userFlows": string[] — the sequences of actions the agent performed
- "edgeCases": string[] — anything unexpected, broken, or worth flagging
Return only the JSON object, no surrounding prose."#;

fn module_section(module: Module) -> &'static str {
    match module {
        Module::UiUx => {
            r#"- "uiUxFindings": string[] — usability issues: unclear affordances, inconsistent layout, readability"#
        }
        Module::Wording => {
            r#"- "wordingFindings": string[] — copy issues: typos, unclear labels, inconsistent tone"#
        }
        Module::GameDesign => {
            r#"- "gameDesignFindings": string[] — balance, pacing, and onboarding observations"#
        }
        Module::TestFlows => {
            r#"- "testFlowCandidates": string[] — user flows worth turning into regression scenarios"#
        }
        Module::Gli => {
            r#"- "gliFindings": string[] — compliance-relevant observations (RNG fairness, disclosures, age gating)"#
        }
        Module::RunTests => "",
    }
}

/// Builds the synthesis system prompt: core sections plus one section per
/// enabled module that contributes a findings section (`RunTests` doesn't —
/// it toggles the test executor, not a synthesis field).
pub fn findings_prompt(modules: &[Module]) -> String {
    let mut prompt = CORE_SECTIONS.to_string();
    for module in modules {
        let section = module_section(*module);
        if !section.is_empty() {
            prompt.push_str("\nAlso include, as an additional top-level key:\n");
            prompt.push_str(section);
        }
    }
    prompt
}

/// The scenario-generation system prompt (spec §4.5), only ever assembled
/// when `TestFlows` is enabled — callers check that before calling this.
pub fn scenario_prompt() -> &'static str {
    r#"Given the synthesis result, produce a JSON array of scenarios: \
[{ "name": string, "intent": string, "acceptanceCriteria": string[] }, ...]. \
Order scenarios by how central they are to the game's core loop. \
Return only the JSON array, no surrounding prose."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_modules_yields_only_the_core_sections() {
        let prompt = findings_prompt(&[]);
        assert_eq!(prompt, CORE_SECTIONS);
    }

    #[test]
    fn enabled_module_appends_its_section() {
        let prompt = findings_prompt(&[Module::Wording]);
        assert!(prompt.contains("wordingFindings"));
        assert!(!prompt.contains("uiUxFindings"));
    }

    #[test]
    fn run_tests_contributes_no_section() {
        let prompt = findings_prompt(&[Module::RunTests]);
        assert_eq!(prompt, CORE_SECTIONS);
    }
}
