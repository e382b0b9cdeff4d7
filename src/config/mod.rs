//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation, and validates the sanitizer's tunables before any
//! streaming begins.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{
    ConfigError, EmptySourcePathSnafu, InvalidDelimiterSnafu, ReadFileSnafu, UnknownEncodingSnafu,
    YamlParseSnafu,
};

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Main configuration structure for a sanitizer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    /// Destination configuration (optional; defaults to a UUID-named file
    /// under the system temp directory).
    #[serde(default)]
    pub destination: DestinationConfig,
    /// Sanitizer decision policy settings.
    #[serde(default)]
    pub sanitize: SanitizeConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Source configuration for reading a delimited extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path or URL of the input file.
    /// Examples: "s3://bucket/extracts/dump.txt", "/data/dump.txt"
    pub path: String,

    /// Bytes to request per chunked read (default: 1 MiB).
    #[serde(default = "default_chunk_size_bytes")]
    pub chunk_size_bytes: usize,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

/// Destination configuration for the cleaned output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Path or URL of the cleaned output file.
    /// When omitted, a UUID-named file under the system temp dir is used.
    #[serde(default = "default_destination_path")]
    pub path: String,

    /// Buffered bytes before a flush to the destination
    /// (default: aligned with the reader chunk size).
    #[serde(default = "default_chunk_size_bytes")]
    pub flush_threshold_bytes: usize,

    /// Storage options (credentials, region, etc.)
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            path: default_destination_path(),
            flush_threshold_bytes: default_chunk_size_bytes(),
            storage_options: HashMap::new(),
        }
    }
}

fn default_chunk_size_bytes() -> usize {
    MB
}

fn default_destination_path() -> String {
    std::env::temp_dir()
        .join(format!("{}.clean", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

/// How NULL sentinels in the data are handled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NullHandling {
    /// Reject any line containing the delimited NULL sentinel.
    #[default]
    Drop,
    /// Keep the line, substituting the sentinel with the replacement string.
    Replace,
}

/// Decision policy settings for the line classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizeConfig {
    /// Field delimiter. Must be exactly one character.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// NULL sentinel handling mode.
    #[serde(default)]
    pub null_handling: NullHandling,

    /// The bare sentinel token ("NULL" by default); it is matched
    /// surrounded by the delimiter on both sides.
    #[serde(default = "default_null_sentinel")]
    pub null_sentinel: String,

    /// Replacement for the delimited sentinel in replace mode
    /// (default: two adjacent delimiters, i.e. an empty field).
    #[serde(default)]
    pub replacement: Option<String>,

    /// Reject lines whose delimiter count breaks the header contract
    /// (default: true).
    #[serde(default = "default_true")]
    pub enforce_column_count: bool,

    /// Reject lines containing bytes outside the ASCII range (default: true).
    #[serde(default = "default_true")]
    pub reject_non_ascii: bool,

    /// Extra caller-supplied rejection patterns (regular expressions).
    #[serde(default)]
    pub reject_patterns: Vec<String>,

    /// Text encoding label for decoding data lines (default: "utf-8").
    /// Any label recognized by the WHATWG encoding standard works,
    /// e.g. "latin1", "windows-1252".
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// Classify and count without writing any output bytes.
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            null_handling: NullHandling::default(),
            null_sentinel: default_null_sentinel(),
            replacement: None,
            enforce_column_count: true,
            reject_non_ascii: true,
            reject_patterns: Vec::new(),
            encoding: default_encoding(),
            dry_run: false,
        }
    }
}

impl SanitizeConfig {
    /// The delimiter as a single char. Only valid after `validate()`.
    pub fn delimiter_char(&self) -> char {
        self.delimiter.chars().next().unwrap_or('~')
    }

    /// The full sentinel substring: `{delim}{token}{delim}`.
    pub fn delimited_sentinel(&self) -> String {
        format!("{d}{t}{d}", d = self.delimiter, t = self.null_sentinel)
    }

    /// The substitution applied in replace mode. Defaults to an empty
    /// field: two adjacent delimiters.
    pub fn sentinel_replacement(&self) -> String {
        self.replacement
            .clone()
            .unwrap_or_else(|| format!("{d}{d}", d = self.delimiter))
    }
}

fn default_delimiter() -> String {
    "~".to_string()
}

fn default_null_sentinel() -> String {
    "NULL".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment
    /// variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;

        let content = if interpolate_env {
            vars::interpolate(&content)?
        } else {
            content
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Pattern compilation and encoding resolution are validated again by
    /// the policy constructor; this catches shape errors up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.source.path.is_empty(), EmptySourcePathSnafu);
        ensure!(
            self.sanitize.delimiter.chars().count() == 1,
            InvalidDelimiterSnafu {
                delimiter: self.sanitize.delimiter.clone(),
            }
        );
        ensure!(
            encoding_rs::Encoding::for_label(self.sanitize.encoding.as_bytes()).is_some(),
            UnknownEncodingSnafu {
                label: self.sanitize.encoding.clone(),
            }
        );
        Ok(())
    }
}
