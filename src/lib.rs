//! linescrub: a library for sanitizing delimiter-separated text extracts.
//!
//! This library provides components for streaming a delimited text file
//! from local disk or S3, classifying each line against a header-derived
//! column contract and a configurable rejection-pattern set, repairing the
//! single recoverable shape (one missing trailing field), and writing a
//! cleaned copy plus a structured report of rejected lines.
//!
//! # Example
//!
//! ```ignore
//! use linescrub::{Config, run_pipeline, error::SanitizeError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SanitizeError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let report = run_pipeline(config).await?;
//!     println!("Accepted {} lines", report.summary.accepted_count);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod source;
pub mod storage;

// Re-export main types
pub use classify::{LineClassifier, Outcome, RejectionPolicy};
pub use config::Config;
pub use pipeline::{Pipeline, RunReport, run_pipeline};
pub use report::{BadLineRecord, RunSummary};
pub use storage::{StorageProvider, StorageProviderRef};
