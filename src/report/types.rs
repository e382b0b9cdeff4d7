//! Report value types: the bad-line record and the run summary.

use serde::{Deserialize, Serialize};

/// A rejected or undecodable line, captured for diagnostics.
///
/// Immutable once created; owned by the run's report. Field spans are byte
/// offsets within the decoded line text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadLineRecord {
    /// Source the line came from.
    pub source_path: String,
    /// 1-based line number from stream start (header is line 1).
    pub line_number: u64,
    /// Absolute byte position of the failure within the source, when a
    /// decode error pinpointed one.
    pub byte_position: Option<u64>,
    /// The decoded line text. Absent when only a decode error is known and
    /// the original bytes are unrecoverable as text.
    pub raw_line: Option<String>,
    /// Match spans (byte start, byte end) of the triggering rule.
    pub matched_spans: Vec<(usize, usize)>,
    /// Delimiter in use when the line was classified.
    pub delimiter: char,
    /// Name of the rule that rejected the line; `None` for decode failures.
    pub rule: Option<String>,
}

impl BadLineRecord {
    /// Record for a line whose bytes failed to decode.
    pub fn decode_failure(
        source_path: impl Into<String>,
        line_number: u64,
        byte_position: Option<u64>,
        delimiter: char,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            line_number,
            byte_position,
            raw_line: None,
            matched_spans: Vec::new(),
            delimiter,
            rule: None,
        }
    }

    /// Record for a line that matched a rejection rule.
    pub fn pattern_match(
        source_path: impl Into<String>,
        line_number: u64,
        line: impl Into<String>,
        matched_spans: Vec<(usize, usize)>,
        delimiter: char,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            line_number,
            byte_position: None,
            raw_line: Some(line.into()),
            matched_spans,
            delimiter,
            rule: Some(rule.into()),
        }
    }

    /// Render the record as display lines: the offending line with a
    /// preface, a caret line marking each matched span, and the rule name.
    ///
    /// Diagnostic output only, never parsed back in.
    pub fn render(&self) -> Vec<String> {
        let preface = format!("line {}: ", self.line_number);

        let Some(text) = &self.raw_line else {
            let position = match self.byte_position {
                Some(pos) => format!("byte {pos}"),
                None => "unknown position".to_string(),
            };
            return vec![format!("{preface}<undecodable line at {position}>")];
        };

        let mut lines = vec![format!("{preface}{text}")];

        if !self.matched_spans.is_empty() {
            let mut carets: Vec<char> = Vec::with_capacity(preface.len() + text.chars().count());
            carets.resize(preface.len(), ' ');
            for (byte_idx, _) in text.char_indices() {
                let marked = self
                    .matched_spans
                    .iter()
                    .any(|&(start, end)| byte_idx >= start && byte_idx < end);
                carets.push(if marked { '^' } else { ' ' });
            }
            lines.push(carets.into_iter().collect());
        }

        if let Some(rule) = &self.rule {
            lines.push(format!("matched rule: {rule}"));
        }

        lines
    }
}

/// Summary statistics for one sanitizer run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Every logical line read, header included.
    pub total_lines_seen: u64,
    /// Data lines written to the destination (repaired lines included).
    pub accepted_count: u64,
    /// Subset of accepted lines that went through the off-by-one repair.
    pub repaired_count: u64,
    /// Data lines rejected into the report.
    pub rejected_count: u64,
    /// Seconds spent reading source chunks.
    pub elapsed_read_seconds: f64,
    /// Seconds spent flushing destination chunks.
    pub elapsed_write_seconds: f64,
    /// `100 * accepted_count / total_lines_seen`.
    pub percent_accepted: f64,
}

impl RunSummary {
    /// Accepted lines per second of read time, for the completion log.
    pub fn lines_per_second(&self) -> f64 {
        let elapsed = self.elapsed_read_seconds + self.elapsed_write_seconds;
        if elapsed > 0.0 {
            self.accepted_count as f64 / elapsed
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_caret_under_match() {
        let record = BadLineRecord::pattern_match(
            "/tmp/example",
            1,
            "09BB¿~NY~1G",
            vec![(4, 6)],
            '~',
            "non-ascii",
        );

        let lines = record.render();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "line 1: 09BB¿~NY~1G");
        // "¿" is a single char at char-column 4, preface is 8 chars wide;
        // the caret line keeps the full visual width of the line above it.
        assert_eq!(lines[1], "            ^      ");
        assert_eq!(lines[1].chars().count(), lines[0].chars().count());
        assert_eq!(lines[2], "matched rule: non-ascii");
    }

    #[test]
    fn test_render_multiple_spans() {
        let record = BadLineRecord::pattern_match(
            "/tmp/example",
            12,
            "a~b~c~d",
            vec![(1, 2), (5, 6)],
            '~',
            "too-many-fields",
        );

        let lines = record.render();
        assert_eq!(lines[0], "line 12: a~b~c~d");
        assert_eq!(lines[1], "          ^   ^ ");
    }

    #[test]
    fn test_render_caret_width_matches_line() {
        let record = BadLineRecord::pattern_match(
            "/tmp/example",
            3,
            "NULL~NULL~",
            vec![(4, 10)],
            '~',
            "null-sentinel",
        );

        let lines = record.render();
        // Caret line is exactly as wide as preface + text.
        assert_eq!(lines[1].chars().count(), lines[0].chars().count());
        assert!(lines[1].ends_with("^^^^^^"));
    }

    #[test]
    fn test_render_decode_failure_without_text() {
        let record = BadLineRecord::decode_failure("/tmp/example", 7, Some(1042), '~');
        let lines = record.render();
        assert_eq!(lines, vec!["line 7: <undecodable line at byte 1042>"]);

        let unknown = BadLineRecord::decode_failure("/tmp/example", 8, None, '~');
        assert_eq!(
            unknown.render(),
            vec!["line 8: <undecodable line at unknown position>"]
        );
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            total_lines_seen: 4,
            accepted_count: 1,
            repaired_count: 0,
            rejected_count: 2,
            elapsed_read_seconds: 0.5,
            elapsed_write_seconds: 0.1,
            percent_accepted: 25.0,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"accepted_count\":1"));
        assert!(json.contains("\"percent_accepted\":25.0"));
    }
}
