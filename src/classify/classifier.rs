//! Per-line accept / repair / reject decisions.
//!
//! The classifier binds a compiled [`RejectionPolicy`] to one source's
//! header contract. Decision order, first match wins:
//!
//! 1. decode under the configured encoding; failure rejects with a
//!    best-effort byte position;
//! 2. fixed rules (non-ASCII, NULL sentinel in drop mode, caller patterns)
//!    in policy order; any match rejects;
//! 3. column-count guards: a line exactly one trailing field short is
//!    repaired by appending a delimiter, anything else that trips a guard
//!    is rejected;
//! 4. otherwise accept, substituting the NULL sentinel in replace mode.

use std::borrow::Cow;

use crate::error::ConfigError;
use crate::report::BadLineRecord;
use crate::source::RawLine;

use super::policy::{RejectionPolicy, RejectRule, column_guards};

/// Classification outcome for a single line.
#[derive(Debug)]
pub enum Outcome {
    /// Line passes; text has sentinel substitution already applied.
    Accept(String),
    /// Line was one trailing field short; text carries the appended
    /// delimiter and is otherwise treated as accepted.
    Repair(String),
    /// Line failed decode or matched a rejection rule.
    Reject(BadLineRecord),
}

/// Pure per-line decision logic bound to one header contract. No I/O.
#[derive(Debug)]
pub struct LineClassifier {
    policy: RejectionPolicy,
    guards: Vec<RejectRule>,
    expected_columns: usize,
    source_path: String,
}

impl LineClassifier {
    /// Bind a policy to a header contract.
    ///
    /// `expected_columns` comes from splitting the header on the delimiter.
    /// Guard patterns derive from it here; the fixed rules were already
    /// compiled when the policy was built.
    pub fn new(
        policy: RejectionPolicy,
        expected_columns: usize,
        source_path: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let guards = if policy.enforce_column_count() {
            column_guards(policy.delimiter(), expected_columns)?
        } else {
            Vec::new()
        };

        Ok(Self {
            policy,
            guards,
            expected_columns,
            source_path: source_path.into(),
        })
    }

    /// The header-derived column count this classifier enforces.
    pub fn expected_columns(&self) -> usize {
        self.expected_columns
    }

    /// Classify one raw line.
    pub fn classify(&self, raw: &RawLine) -> Outcome {
        let text = match self.decode(raw) {
            Ok(text) => text,
            Err(record) => return Outcome::Reject(*record),
        };

        // Fixed rules first: non-ASCII outranks the column guards, so a
        // line violating both is rejected rather than repaired.
        for rule in self.policy.rules() {
            let spans = rule.match_spans(&text);
            if !spans.is_empty() {
                return Outcome::Reject(BadLineRecord::pattern_match(
                    self.source_path.clone(),
                    raw.number,
                    text.into_owned(),
                    spans,
                    self.policy.delimiter(),
                    rule.name.clone(),
                ));
            }
        }

        if !self.guards.is_empty() {
            let delimiters = text.matches(self.policy.delimiter()).count();

            // The sole supported repair: exactly one missing trailing
            // field. Any other shortfall or excess is a plain reject.
            if self.expected_columns >= 2 && delimiters == self.expected_columns - 2 {
                let mut repaired = self.policy.substitute_sentinel(&text).into_owned();
                repaired.push(self.policy.delimiter());
                return Outcome::Repair(repaired);
            }

            for guard in &self.guards {
                let spans = guard.match_spans(&text);
                if !spans.is_empty() {
                    return Outcome::Reject(BadLineRecord::pattern_match(
                        self.source_path.clone(),
                        raw.number,
                        text.into_owned(),
                        spans,
                        self.policy.delimiter(),
                        guard.name.clone(),
                    ));
                }
            }
        }

        let accepted = self.policy.substitute_sentinel(&text).into_owned();
        Outcome::Accept(accepted)
    }

    /// Decode a raw line under the configured encoding.
    ///
    /// UTF-8 decode failures carry the exact byte offset of the first bad
    /// byte; other encodings only report that a failure happened.
    fn decode<'a>(&self, raw: &'a RawLine) -> Result<Cow<'a, str>, Box<BadLineRecord>> {
        if self.policy.encoding() == encoding_rs::UTF_8 {
            match std::str::from_utf8(&raw.bytes) {
                Ok(text) => Ok(Cow::Borrowed(text)),
                Err(e) => Err(Box::new(BadLineRecord::decode_failure(
                    self.source_path.clone(),
                    raw.number,
                    Some(raw.byte_offset + e.valid_up_to() as u64),
                    self.policy.delimiter(),
                ))),
            }
        } else {
            let (text, had_errors) = self
                .policy
                .encoding()
                .decode_without_bom_handling(&raw.bytes);
            if had_errors {
                Err(Box::new(BadLineRecord::decode_failure(
                    self.source_path.clone(),
                    raw.number,
                    None,
                    self.policy.delimiter(),
                )))
            } else {
                Ok(text)
            }
        }
    }
}
