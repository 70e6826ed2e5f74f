//! Progress-event sentinel line parsing (spec §4.2 step 2).
//!
//! Child processes emit one progress event per stdout line as
//! `@@QA_EVENT@@<json>`, where `<json>` is a `protocol::ProgressEvent`. The
//! Open Question decision here (see `DESIGN.md`) is to parse with a
//! compiled `regex::Regex` rather than `str::split`, since the JSON payload
//! itself may contain the delimiter byte sequence inside a string (a
//! flow name or step label with `@@` in it must not desynchronize the
//! parser).

use once_cell_lite::OnceRegex;
use protocol::ProgressEvent;

/// The sentinel anchor. Matches at line start; everything after it on the
/// same line is the JSON payload.
const SENTINEL: &str = "@@QA_EVENT@@";

static SENTINEL_RE: OnceRegex = OnceRegex::new(r"^@@QA_EVENT@@(.*)$");

/// Formats one progress event as a sentinel line for a child to write to
/// its stdout.
pub fn format(event: &ProgressEvent) -> Result<String, serde_json::Error> {
    Ok(format!("{SENTINEL}{}", serde_json::to_string(event)?))
}

/// Parses a single stdout line. Returns `None` for lines that aren't
/// sentinel lines (ordinary log output, passed through to the capture
/// buffer instead) or whose payload fails to parse as a `ProgressEvent`
/// (logged by the caller and otherwise ignored — a malformed event must
/// never abort the supervised run).
pub fn parse(line: &str) -> Option<ProgressEvent> {
    let captures = SENTINEL_RE.get().captures(line)?;
    let payload = captures.get(1)?.as_str();
    serde_json::from_str(payload).ok()
}

/// A tiny `Lazy<Regex>`-equivalent without pulling in `once_cell` as a
/// direct dependency beyond what's already ambient via `regex`'s own
/// transitive use — kept local since it's a one-off.
mod once_cell_lite {
    use std::sync::OnceLock;

    pub struct OnceRegex {
        pattern: &'static str,
        cell: OnceLock<regex::Regex>,
    }

    impl OnceRegex {
        pub const fn new(pattern: &'static str) -> Self {
            Self {
                pattern,
                cell: OnceLock::new(),
            }
        }

        pub fn get(&self) -> &regex::Regex {
            self.cell
                .get_or_init(|| regex::Regex::new(self.pattern).expect("static sentinel regex is valid"))
        }
    }
}
