//! Main sanitizing pipeline.
//!
//! Connects the streaming reader, line classifier, chunked writer, and
//! bad-line report into a single sequential run:
//!
//! `Initialized → HeaderRead → Streaming → Finalizing → Done`
//!
//! One logical line is classified and routed at a time; the only blocking
//! points are chunk reads from the source and chunk flushes to the
//! destination. Per-line problems become report records and never abort
//! the run; source/destination failures abort after a best-effort flush.

mod signal;

use snafu::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::{LineClassifier, Outcome, RejectionPolicy};
use crate::config::Config;
use crate::emit;
use crate::error::{
    ConfigSnafu, DestinationIoSnafu, RunAlreadyFinishedSnafu, SanitizeError, SanitizeStorageSnafu,
    SourceIoSnafu,
};
use crate::metrics::events::{LineClassified, LineStatus, LinesProcessed};
use crate::report::{BadLineRecord, BadLineReport, RunSummary};
use crate::sink::{ChunkedWriter, ChunkedWriterConfig};
use crate::source::progress::ProgressObserverRef;
use crate::source::{StreamingReader, StreamingReaderConfig};
use crate::storage::{StorageProvider, StorageProviderRef};

/// Result of a completed run: summary statistics plus every rejected line.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub bad_lines: Vec<BadLineRecord>,
}

/// Run lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Initialized,
    HeaderRead,
    Streaming,
    Finalizing,
    Done,
}

/// Sanitizing pipeline for a single source-to-destination run.
///
/// A pipeline instance processes exactly one run; calling [`run`](Self::run)
/// again afterwards is a caller error. The storage handles are injected at
/// construction and are not shared across concurrent runs.
pub struct Pipeline {
    config: Config,
    source_storage: StorageProviderRef,
    dest_storage: StorageProviderRef,
    policy: RejectionPolicy,
    report: BadLineReport,
    state: RunState,
    shutdown: CancellationToken,
    progress: Option<ProgressObserverRef>,
    lines_seen: u64,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("state", &self.state)
            .field("lines_seen", &self.lines_seen)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a new pipeline from configuration.
    ///
    /// All patterns compile and the encoding label resolves here, so a bad
    /// configuration fails before any byte is read.
    pub async fn new(config: Config, shutdown: CancellationToken) -> Result<Self, SanitizeError> {
        config.validate().context(ConfigSnafu)?;
        let policy = RejectionPolicy::compile(&config.sanitize).context(ConfigSnafu)?;

        let source_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.source.path,
                config.source.storage_options.clone(),
            )
            .await
            .context(SanitizeStorageSnafu)?,
        );

        let dest_storage = Arc::new(
            StorageProvider::for_url_with_options(
                &config.destination.path,
                config.destination.storage_options.clone(),
            )
            .await
            .context(SanitizeStorageSnafu)?,
        );

        Ok(Self {
            config,
            source_storage,
            dest_storage,
            policy,
            report: BadLineReport::new(),
            state: RunState::Initialized,
            shutdown,
            progress: None,
            lines_seen: 0,
        })
    }

    /// Attach an optional progress observer, fed per chunk.
    pub fn with_progress(mut self, observer: ProgressObserverRef) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Bad-line records accumulated so far (useful after an abort).
    pub fn bad_lines(&self) -> &[BadLineRecord] {
        self.report.records()
    }

    /// Logical lines seen so far, header included.
    pub fn lines_seen(&self) -> u64 {
        self.lines_seen
    }

    /// Run the pipeline to completion.
    ///
    /// The header (line 1) establishes the column contract and is written
    /// through verbatim. Every subsequent line is classified; accepted and
    /// repaired text goes to the destination, rejects go to the report.
    pub async fn run(&mut self) -> Result<RunReport, SanitizeError> {
        ensure!(
            self.state == RunState::Initialized,
            RunAlreadyFinishedSnafu
        );

        info!(
            "Sanitizing {} -> {}{}",
            self.source_storage.url(),
            self.dest_storage.url(),
            if self.config.sanitize.dry_run {
                " (dry run)"
            } else {
                ""
            }
        );

        let mut elapsed_read = Duration::ZERO;
        let mut elapsed_write = Duration::ZERO;

        let read_start = Instant::now();
        let mut reader = StreamingReader::open(
            Arc::clone(&self.source_storage),
            StreamingReaderConfig::new(self.config.source.chunk_size_bytes),
            self.progress.clone(),
        )
        .await
        .with_context(|_| SourceIoSnafu {
            path: self.source_storage.url().to_string(),
            lines_seen: 0u64,
            bytes_processed: 0u64,
        })?;
        elapsed_read += read_start.elapsed();

        let mut writer = ChunkedWriter::new(
            Arc::clone(&self.dest_storage),
            ChunkedWriterConfig::new(
                self.config.destination.flush_threshold_bytes,
                self.config.sanitize.dry_run,
            ),
        );

        // Header: line 1. Open() already rejected zero-byte sources, so a
        // header line always exists.
        let read_start = Instant::now();
        let header = reader.next_line().await.with_context(|_| SourceIoSnafu {
            path: self.source_storage.url().to_string(),
            lines_seen: 0u64,
            bytes_processed: 0u64,
        })?;
        elapsed_read += read_start.elapsed();

        let Some(header) = header else {
            // Unreachable after the open() size check; kept as a guard.
            self.state = RunState::Done;
            let path = self.source_storage.url().to_string();
            return Err(SanitizeError::SourceIo {
                source: crate::error::ReadError::EmptySource { path: path.clone() },
                path,
                lines_seen: 0,
                bytes_processed: 0,
            });
        };
        self.lines_seen = 1;
        emit!(LinesProcessed { count: 1 });

        let expected_columns = self.parse_header(&header.bytes);
        let classifier = LineClassifier::new(
            self.policy.clone(),
            expected_columns,
            self.source_storage.url(),
        )
        .context(ConfigSnafu)?;
        self.state = RunState::HeaderRead;

        let write_start = Instant::now();
        self.write_or_abort(writer.write_raw_line(&header.bytes))
            .await?;
        elapsed_write += write_start.elapsed();

        // Stream the data lines.
        self.state = RunState::Streaming;
        let mut accepted: u64 = 0;
        let mut repaired: u64 = 0;
        let mut rejected: u64 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown requested, finalizing with partial output");
                break;
            }

            let read_start = Instant::now();
            let next = reader.next_line().await;
            elapsed_read += read_start.elapsed();

            let raw = match next {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(e) => {
                    // Source failure: keep what we have, then propagate.
                    writer.flush_on_abort().await;
                    self.state = RunState::Done;
                    return Err(e).with_context(|_| SourceIoSnafu {
                        path: self.source_storage.url().to_string(),
                        lines_seen: self.lines_seen,
                        bytes_processed: reader.bytes_processed(),
                    });
                }
            };

            self.lines_seen += 1;
            emit!(LinesProcessed { count: 1 });

            match classifier.classify(&raw) {
                Outcome::Accept(text) => {
                    let write_start = Instant::now();
                    self.write_or_abort(writer.write_line(&text)).await?;
                    elapsed_write += write_start.elapsed();
                    accepted += 1;
                    emit!(LineClassified {
                        status: LineStatus::Accepted
                    });
                }
                Outcome::Repair(text) => {
                    debug!("Repaired line {}: appended trailing delimiter", raw.number);
                    let write_start = Instant::now();
                    self.write_or_abort(writer.write_line(&text)).await?;
                    elapsed_write += write_start.elapsed();
                    accepted += 1;
                    repaired += 1;
                    emit!(LineClassified {
                        status: LineStatus::Repaired
                    });
                }
                Outcome::Reject(record) => {
                    for display_line in record.render() {
                        debug!("{display_line}");
                    }
                    self.report.push(record);
                    rejected += 1;
                    emit!(LineClassified {
                        status: LineStatus::Rejected
                    });
                }
            }
        }

        // Finalize: residual buffer flushes exactly once.
        self.state = RunState::Finalizing;
        let write_start = Instant::now();
        let finish_result = writer.finish().await;
        elapsed_write += write_start.elapsed();
        self.state = RunState::Done;
        let bytes_written = finish_result.context(DestinationIoSnafu {
            lines_seen: self.lines_seen,
        })?;

        let summary = RunSummary {
            total_lines_seen: self.lines_seen,
            accepted_count: accepted,
            repaired_count: repaired,
            rejected_count: rejected,
            elapsed_read_seconds: elapsed_read.as_secs_f64(),
            elapsed_write_seconds: elapsed_write.as_secs_f64(),
            percent_accepted: 100.0 * accepted as f64 / self.lines_seen as f64,
        };

        if self.lines_seen == 1 {
            warn!("Source contained a header but no data lines");
        }
        info!(
            "Run complete: {}/{} lines accepted ({} repaired, {} rejected, {:.5}%), {} bytes written, {:.0} lines/s",
            accepted,
            summary.total_lines_seen,
            repaired,
            rejected,
            summary.percent_accepted,
            bytes_written,
            summary.lines_per_second(),
        );

        Ok(RunReport {
            summary,
            bad_lines: self.report.take_records(),
        })
    }

    /// Split the header to establish the column contract.
    ///
    /// The header is decoded leniently; it is written through verbatim and
    /// never classified, so a malformed header only affects the count.
    fn parse_header(&self, header: &[u8]) -> usize {
        let (text, _) = self
            .policy
            .encoding()
            .decode_without_bom_handling(header);
        let delimiter = self.policy.delimiter();
        let columns = text.split(delimiter).count();

        if !text.contains(delimiter) {
            warn!(
                "Header contains no {:?} delimiter; treating source as single-column",
                delimiter
            );
        } else {
            debug!("Header establishes {columns} columns");
        }
        columns
    }

    /// Await a writer operation, converting failures into an abort with
    /// line context.
    async fn write_or_abort(
        &mut self,
        op: impl std::future::Future<Output = Result<(), crate::error::WriteError>>,
    ) -> Result<(), SanitizeError> {
        match op.await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = RunState::Done;
                Err(e).context(DestinationIoSnafu {
                    lines_seen: self.lines_seen,
                })
            }
        }
    }
}

/// Run the sanitizer with the given configuration, honoring shutdown
/// signals at chunk granularity.
pub async fn run_pipeline(config: Config) -> Result<RunReport, SanitizeError> {
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let mut pipeline = Pipeline::new(config, shutdown).await?;
    pipeline.run().await
}
