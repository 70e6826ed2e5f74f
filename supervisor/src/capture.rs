//! Bounded capture buffer for non-event child output (spec §4.2: "Non-event
//! lines are buffered as a capped rolling stderr/stdout log (bounded at
//! ~1000 lines)... Captured stdout buffer is bounded (recommended 10 MiB)
//! with head/tail preservation").
//!
//! Lines are kept until either cap is hit; once a cap is hit, the buffer
//! keeps the first `HEAD_LINES` and the most recent `TAIL_LINES`, dropping
//! the middle — the failure classifier (spec §4.2 step 4) wants "the last
//! meaningful stderr line", which head/tail preservation keeps available
//! even on a very chatty child.

const MAX_LINES: usize = 1000;
const MAX_BYTES: usize = 10 * 1024 * 1024;
const HEAD_LINES: usize = 100;
const TAIL_LINES: usize = 900;

pub struct CaptureBuffer {
    lines: Vec<String>,
    bytes: usize,
    dropped: usize,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        self.bytes += line.len();
        self.lines.push(line);

        if self.lines.len() > MAX_LINES || self.bytes > MAX_BYTES {
            self.collapse();
        }
    }

    fn collapse(&mut self) {
        if self.lines.len() <= HEAD_LINES + TAIL_LINES {
            return;
        }
        let head: Vec<String> = self.lines[..HEAD_LINES].to_vec();
        let tail_start = self.lines.len() - TAIL_LINES;
        let tail: Vec<String> = self.lines[tail_start..].to_vec();
        self.dropped += self.lines.len() - head.len() - tail.len();
        self.lines = head.into_iter().chain(tail).collect();
        self.bytes = self.lines.iter().map(String::len).sum();
    }

    /// The last non-empty line, used by the failure classifier (spec §4.2
    /// step 4: "the last meaningful stderr line").
    pub fn last_meaningful_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .rev()
            .map(String::as_str)
            .find(|l| !l.trim().is_empty())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn dropped_line_count(&self) -> usize {
        self.dropped
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_meaningful_line_skips_trailing_blanks() {
        let mut buf = CaptureBuffer::new();
        buf.push("starting up");
        buf.push("connection refused");
        buf.push("");
        assert_eq!(buf.last_meaningful_line(), Some("connection refused"));
    }

    #[test]
    fn collapses_to_head_and_tail_once_the_line_cap_is_exceeded() {
        let mut buf = CaptureBuffer::new();
        for i in 0..(MAX_LINES + 50) {
            buf.push(format!("line-{i}"));
        }
        assert!(buf.lines().len() <= HEAD_LINES + TAIL_LINES);
        assert_eq!(buf.lines()[0], "line-0");
        assert!(buf.dropped_line_count() > 0);
    }
}
