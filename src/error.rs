//! Error types for linescrub using snafu.
//!
//! This module defines structured error types with context selectors for
//! all fatal error conditions. Per-line problems (decode failures, pattern
//! rejections) are not errors: they become [`BadLineRecord`]s and the run
//! continues.
//!
//! [`BadLineRecord`]: crate::report::BadLineRecord

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },

    /// IO error during storage operations.
    #[snafu(display("IO error"))]
    Io { source: std::io::Error },

    /// S3 configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },
}

impl StorageError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::ObjectStore { source } => {
                matches!(source, object_store::Error::NotFound { .. })
            }
            _ => false,
        }
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
///
/// All of these surface before streaming begins: the policy compiles its
/// patterns and the encoding label resolves at construction time.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Source path is empty.
    #[snafu(display("Source path cannot be empty"))]
    EmptySourcePath,

    /// Field delimiter must be exactly one character.
    #[snafu(display("Delimiter must be a single character, got {delimiter:?}"))]
    InvalidDelimiter { delimiter: String },

    /// A rejection pattern failed to compile.
    #[snafu(display("Invalid rejection pattern {pattern:?}"))]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// The configured encoding label is not recognized.
    #[snafu(display("Unknown text encoding label {label:?}"))]
    UnknownEncoding { label: String },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },
}

// ============ Read Errors ============

/// Errors raised by the streaming reader (fatal to the run).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReadError {
    /// A chunk could not be read from the source.
    #[snafu(display("Failed to read chunk at byte {offset} of {path}"))]
    ChunkRead {
        source: StorageError,
        path: String,
        offset: u64,
    },

    /// The source could not be stat'ed for its total size.
    #[snafu(display("Failed to stat source {path}"))]
    SourceStat { source: StorageError, path: String },

    /// The source has zero total lines, not even a header.
    #[snafu(display("Source {path} is empty: no header line"))]
    EmptySource { path: String },
}

// ============ Write Errors ============

/// Errors raised by the chunked writer (fatal to the run).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WriteError {
    /// A buffered chunk could not be flushed to the destination.
    #[snafu(display("Failed to flush chunk to {path}"))]
    ChunkFlush {
        source: std::io::Error,
        path: String,
    },

    /// The destination writer could not be finalized.
    #[snafu(display("Failed to finalize destination {path}"))]
    Finalize {
        source: std::io::Error,
        path: String,
    },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Report Errors ============

/// Errors that can occur while persisting the bad-line report.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReportError {
    /// Failed to serialize a bad-line record.
    #[snafu(display("Failed to serialize bad-line record"))]
    ReportSerialize { source: serde_json::Error },

    /// Failed to write the report.
    #[snafu(display("Failed to write bad-line report"))]
    ReportWrite { source: StorageError },
}

// ============ Sanitize Error (top-level) ============

/// Top-level errors that aggregate all fatal error types.
///
/// Source/destination failures carry the position the run had reached so a
/// partial run can be diagnosed without re-running.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SanitizeError {
    /// Storage error.
    #[snafu(display("Storage error"))]
    SanitizeStorage { source: StorageError },

    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Source read failure.
    #[snafu(display("Source read failed ({path}, line {lines_seen}, {bytes_processed} bytes in)"))]
    SourceIo {
        source: ReadError,
        path: String,
        lines_seen: u64,
        bytes_processed: u64,
    },

    /// Destination write failure.
    #[snafu(display("Destination write failed after {lines_seen} lines"))]
    DestinationIo { source: WriteError, lines_seen: u64 },

    /// Report persistence failure.
    #[snafu(display("Report error"))]
    Report { source: ReportError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// `run()` called on a pipeline that already finished its run.
    #[snafu(display("Pipeline has already run; construct a new pipeline per source"))]
    RunAlreadyFinished,
}

impl SanitizeError {
    /// Check if this error represents a "not found" condition (404, NoSuchKey, etc.)
    pub fn is_not_found(&self) -> bool {
        match self {
            SanitizeError::SanitizeStorage { source } => source.is_not_found(),
            SanitizeError::SourceIo {
                source: ReadError::ChunkRead { source, .. },
                ..
            } => source.is_not_found(),
            _ => false,
        }
    }
}
