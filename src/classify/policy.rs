//! Immutable rejection policy compiled from configuration.
//!
//! The policy is built once per run, before any byte is read. Every
//! pattern (fixed, sentinel, and caller-supplied) compiles here so a bad
//! pattern fails the run up front instead of on line one.

use encoding_rs::Encoding;
use regex::Regex;
use snafu::prelude::*;

use crate::config::{NullHandling, SanitizeConfig};
use crate::error::{ConfigError, InvalidPatternSnafu, UnknownEncodingSnafu};

/// Matches any byte outside the ASCII range.
const NON_ASCII: &str = r"[^\x00-\x7F]";

/// Rule name for the non-ASCII byte class.
pub const RULE_NON_ASCII: &str = "non-ascii";
/// Rule name for the delimited NULL sentinel (drop mode only).
pub const RULE_NULL_SENTINEL: &str = "null-sentinel";
/// Rule name for lines with too many fields.
pub const RULE_TOO_MANY_FIELDS: &str = "too-many-fields";
/// Rule name for lines with too few fields.
pub const RULE_TOO_FEW_FIELDS: &str = "too-few-fields";

/// A single compiled rejection rule.
#[derive(Debug, Clone)]
pub struct RejectRule {
    /// Name reported in diagnostics ("non-ascii", "null-sentinel", or the
    /// caller's pattern text).
    pub name: String,
    regex: Regex,
}

impl RejectRule {
    fn new(name: impl Into<String>, pattern: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).context(InvalidPatternSnafu { pattern })?;
        Ok(Self {
            name: name.into(),
            regex,
        })
    }

    /// All match spans (byte offsets) of this rule within the line.
    pub fn match_spans(&self, line: &str) -> Vec<(usize, usize)> {
        self.regex
            .find_iter(line)
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    /// Whether this rule matches the line at all.
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

/// Immutable rejection policy: compiled rules plus sentinel handling.
///
/// Safe to share read-only across runs; the column-count guards are not
/// part of the policy because they derive from each source's header (see
/// [`LineClassifier`](crate::classify::LineClassifier)).
#[derive(Debug, Clone)]
pub struct RejectionPolicy {
    rules: Vec<RejectRule>,
    delimiter: char,
    null_handling: NullHandling,
    delimited_sentinel: String,
    replacement: String,
    encoding: &'static Encoding,
    enforce_column_count: bool,
}

impl RejectionPolicy {
    /// Compile a policy from configuration. Fails fast on any invalid
    /// pattern or unknown encoding label.
    pub fn compile(config: &SanitizeConfig) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();

        if config.reject_non_ascii {
            rules.push(RejectRule::new(RULE_NON_ASCII, NON_ASCII)?);
        }

        if config.null_handling == NullHandling::Drop {
            let sentinel = regex::escape(&config.delimited_sentinel());
            rules.push(RejectRule::new(RULE_NULL_SENTINEL, &sentinel)?);
        }

        for pattern in &config.reject_patterns {
            rules.push(RejectRule::new(pattern.clone(), pattern)?);
        }

        let encoding = Encoding::for_label(config.encoding.as_bytes()).context(
            UnknownEncodingSnafu {
                label: config.encoding.clone(),
            },
        )?;

        Ok(Self {
            rules,
            delimiter: config.delimiter_char(),
            null_handling: config.null_handling,
            delimited_sentinel: config.delimited_sentinel(),
            replacement: config.sentinel_replacement(),
            encoding,
            enforce_column_count: config.enforce_column_count,
        })
    }

    /// The fixed rules, in evaluation order.
    pub fn rules(&self) -> &[RejectRule] {
        &self.rules
    }

    /// The field delimiter.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The text encoding data lines are decoded under.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Whether column-count guards apply.
    pub fn enforce_column_count(&self) -> bool {
        self.enforce_column_count
    }

    /// Apply sentinel substitution to an accepted line, when in replace mode.
    pub fn substitute_sentinel<'a>(&self, line: &'a str) -> std::borrow::Cow<'a, str> {
        if self.null_handling == NullHandling::Replace && line.contains(&self.delimited_sentinel) {
            std::borrow::Cow::Owned(line.replace(&self.delimited_sentinel, &self.replacement))
        } else {
            std::borrow::Cow::Borrowed(line)
        }
    }
}

/// Build the column-count guard rules for a header with `expected_columns`
/// columns.
///
/// A well-formed line carries `expected_columns - 1` delimiters. The
/// "too many" guard fires at `expected_columns` delimiters or more; the
/// "too few" guard at `expected_columns - 2` or fewer. Headers with a
/// single column produce no "too few" guard (a line cannot have fewer
/// than zero delimiters).
pub fn column_guards(
    delimiter: char,
    expected_columns: usize,
) -> Result<Vec<RejectRule>, ConfigError> {
    let mut guards = Vec::new();
    if expected_columns == 0 {
        return Ok(guards);
    }

    let d = regex::escape(&delimiter.to_string());
    let field = format!("[^{d}]*");

    let too_many = format!("^(?:{field}{d}){{{n},}}", n = expected_columns);
    guards.push(RejectRule::new(RULE_TOO_MANY_FIELDS, &too_many)?);

    if expected_columns >= 2 {
        let too_few = format!("^(?:{field}{d}){{0,{m}}}{field}$", m = expected_columns - 2);
        guards.push(RejectRule::new(RULE_TOO_FEW_FIELDS, &too_few)?);
    }

    Ok(guards)
}
