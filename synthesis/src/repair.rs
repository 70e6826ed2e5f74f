//! JSON repair pass for a synthesis response truncated by `max_tokens`
//! (spec §4.5): close any open brackets/braces/strings so the partial
//! document still parses, rather than discarding the whole call.

/// Attempts to close unterminated strings/arrays/objects in `text` so it
/// parses as JSON. Tracks bracket depth outside of strings and whether the
/// text ends mid-string; does not attempt to fix truncated keys or dangling
/// commas, which `serde_json` will reject and the caller logs as a failed
/// repair.
pub fn repair(text: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = text.trim_end().trim_end_matches(',').to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

/// Parses `text` as JSON, falling back to [`repair`] if the first attempt
/// fails. Returns the repair warning message alongside the value when a
/// repair pass was needed, so the caller can log it (spec §4.5: "a warning
/// is logged").
pub fn parse_with_repair(text: &str) -> Result<(serde_json::Value, Option<String>), serde_json::Error> {
    match serde_json::from_str(text) {
        Ok(value) => Ok((value, None)),
        Err(first_err) => {
            let repaired = repair(text);
            let value = serde_json::from_str(&repaired)?;
            Ok((
                value,
                Some(format!("synthesis response required JSON repair: {first_err}")),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_a_truncated_object_and_array() {
        let truncated = r#"{"gameInfo": {"title": "Foo"}, "mechanics": ["jump", "run"#;
        let repaired = repair(truncated);
        let value: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["gameInfo"]["title"], "Foo");
        assert_eq!(value["mechanics"][1], "run");
    }

    #[test]
    fn well_formed_json_parses_without_repair() {
        let (value, warning) = parse_with_repair(r#"{"ok": true}"#).unwrap();
        assert_eq!(value["ok"], true);
        assert!(warning.is_none());
    }

    #[test]
    fn truncated_json_parses_after_repair_and_reports_a_warning() {
        let (value, warning) = parse_with_repair(r#"{"ok": true, "items": [1, 2"#).unwrap();
        assert_eq!(value["items"][1], 2);
        assert!(warning.is_some());
    }
}
