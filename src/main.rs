//! linescrub: a standalone tool for sanitizing delimiter-separated extracts.
//!
//! Streams a delimited text file from local disk or S3, drops or repairs
//! malformed lines against the header's column contract, and writes a
//! cleaned copy plus an optional bad-line report.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use linescrub::config::Config;
use linescrub::error::{AddressParseSnafu, ConfigSnafu, MetricsSnafu, ReportSnafu, SanitizeError};
use linescrub::pipeline::run_pipeline;
use linescrub::report::BadLineReport;
use linescrub::storage::StorageProvider;

/// Streaming sanitizer for delimited text extracts.
#[derive(Parser, Debug)]
#[command(name = "linescrub")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Classify and count without writing the cleaned output.
    #[arg(long)]
    dry_run: bool,

    /// Optional location to persist the bad-line report (NDJSON).
    /// A timestamped file name is generated when this points to a directory
    /// (trailing slash).
    #[arg(long)]
    report: Option<String>,

    /// Print every rejected line with caret annotations.
    #[arg(long)]
    show_bad_lines: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), SanitizeError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("linescrub starting");

    let mut config = Config::from_file(&args.config).context(ConfigSnafu)?;
    if args.dry_run {
        config.sanitize.dry_run = true;
    }

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        linescrub::metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    let report = run_pipeline(config).await?;

    info!("Sanitizer completed successfully");
    info!("  Lines seen: {}", report.summary.total_lines_seen);
    info!("  Accepted: {}", report.summary.accepted_count);
    info!("  Repaired: {}", report.summary.repaired_count);
    info!("  Rejected: {}", report.summary.rejected_count);
    info!("  Accepted %: {:.5}", report.summary.percent_accepted);
    info!(
        "  Elapsed: {:.1}s read, {:.1}s write",
        report.summary.elapsed_read_seconds, report.summary.elapsed_write_seconds
    );

    if args.show_bad_lines {
        for record in &report.bad_lines {
            for line in record.render() {
                warn!("{line}");
            }
        }
    }

    if let Some(report_path) = &args.report {
        persist_report(report_path, &report.bad_lines).await?;
    }

    Ok(())
}

/// Persist the bad-line report as NDJSON.
async fn persist_report(
    target: &str,
    records: &[linescrub::report::BadLineRecord],
) -> Result<(), SanitizeError> {
    let path = if target.ends_with('/') {
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        format!("{target}badlines-{timestamp}.ndjson")
    } else {
        target.to_string()
    };

    let storage = StorageProvider::for_url(&path)
        .await
        .context(linescrub::error::SanitizeStorageSnafu)?;

    let report = BadLineReport::from_records(records.to_vec());
    report.persist(&storage).await.context(ReportSnafu)?;

    info!("Wrote bad-line report to {path} ({} records)", records.len());
    Ok(())
}
