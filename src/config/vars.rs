//! Environment variable interpolation for config files.
//!
//! Supports `${VAR}` (error if unset), `${VAR:-default}` (default when
//! unset or empty), and `$$` as an escape for a literal `$`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::{ConfigError, EnvInterpolationSnafu};

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("interpolation pattern is valid")
});

/// Interpolate environment variables in the given text.
///
/// All missing variables are accumulated so the user sees every problem at
/// once instead of fixing them one at a time.
pub fn interpolate(input: &str) -> Result<String, ConfigError> {
    let mut missing: Vec<String> = Vec::new();

    let text = VAR_PATTERN.replace_all(input, |caps: &Captures| {
        if &caps[0] == "$$" {
            return "$".to_string();
        }
        let name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str());
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => value,
            _ => match default {
                Some(d) => d.to_string(),
                None => {
                    missing.push(format!("environment variable '{name}' is not set"));
                    caps[0].to_string()
                }
            },
        }
    });

    if missing.is_empty() {
        Ok(text.into_owned())
    } else {
        EnvInterpolationSnafu {
            message: missing.join("\n"),
        }
        .fail()
    }
}
