//! Threshold-buffered line writer.
//!
//! Accepted lines accumulate in memory and flush to the destination
//! whenever the buffer crosses the configured threshold. Flush granularity
//! is invisible in the final artifact: concatenating all flushed chunks
//! plus the final flush equals writing every line in one shot. Residual
//! bytes flush exactly once at finish.

use bytes::BytesMut;
use object_store::buffered::BufWriter;
use snafu::prelude::*;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::emit;
use crate::error::{ChunkFlushSnafu, FinalizeSnafu, WriteError};
use crate::metrics::events::{BytesWritten, ChunkFlushed};
use crate::storage::StorageProviderRef;

/// Configuration for the chunked writer.
#[derive(Debug, Clone)]
pub struct ChunkedWriterConfig {
    /// Buffered bytes before a flush to the destination.
    pub flush_threshold_bytes: usize,
    /// Classify and count without writing any destination bytes.
    pub dry_run: bool,
}

impl ChunkedWriterConfig {
    pub fn new(flush_threshold_bytes: usize, dry_run: bool) -> Self {
        Self {
            flush_threshold_bytes,
            dry_run,
        }
    }
}

/// Buffered writer for accepted line text.
///
/// Every line is terminated with a single `\n` on write regardless of the
/// source's original terminator. The destination handle is supplied by the
/// caller's storage provider; the writer never outlives its run.
pub struct ChunkedWriter {
    destination_url: String,
    /// None in dry-run mode.
    sink: Option<BufWriter>,
    buffer: BytesMut,
    config: ChunkedWriterConfig,
    bytes_written: u64,
    lines_written: u64,
}

impl ChunkedWriter {
    /// Create a writer over the destination.
    ///
    /// In dry-run mode no destination handle is opened at all.
    pub fn new(storage: StorageProviderRef, config: ChunkedWriterConfig) -> Self {
        let sink = if config.dry_run {
            None
        } else {
            // Capacity at least the threshold so our flushes map onto
            // whole buffered parts.
            Some(storage.writer(config.flush_threshold_bytes.max(crate::config::MB)))
        };

        Self {
            destination_url: storage.url().to_string(),
            sink,
            buffer: BytesMut::with_capacity(config.flush_threshold_bytes),
            config,
            bytes_written: 0,
            lines_written: 0,
        }
    }

    /// Bytes handed to the destination so far (excludes buffered bytes).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Lines appended so far (buffered or flushed).
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Append one line, flushing if the buffer crosses the threshold.
    pub async fn write_line(&mut self, line: &str) -> Result<(), WriteError> {
        self.write_raw_line(line.as_bytes()).await
    }

    /// Append one line of raw bytes (used for the verbatim header).
    pub async fn write_raw_line(&mut self, line: &[u8]) -> Result<(), WriteError> {
        self.buffer.extend_from_slice(line);
        self.buffer.extend_from_slice(b"\n");
        self.lines_written += 1;

        if self.buffer.len() >= self.config.flush_threshold_bytes {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush buffered bytes to the destination.
    ///
    /// A no-op when the buffer is empty or in dry-run mode (the buffer is
    /// discarded so dry runs stay memory-bounded).
    pub async fn flush(&mut self) -> Result<(), WriteError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();

        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        sink.write_all(&chunk).await.context(ChunkFlushSnafu {
            path: self.destination_url.clone(),
        })?;

        self.bytes_written += chunk.len() as u64;
        emit!(BytesWritten {
            bytes: chunk.len() as u64
        });
        emit!(ChunkFlushed);
        debug!(
            "Flushed {} bytes to {} ({} total)",
            chunk.len(),
            self.destination_url,
            self.bytes_written
        );
        Ok(())
    }

    /// Flush the residual buffer and finalize the destination.
    ///
    /// Must be called exactly once; the destination object only becomes
    /// visible to readers after this completes.
    pub async fn finish(mut self) -> Result<u64, WriteError> {
        self.flush().await?;

        if let Some(mut sink) = self.sink.take() {
            sink.shutdown().await.context(FinalizeSnafu {
                path: self.destination_url.clone(),
            })?;
        }
        Ok(self.bytes_written)
    }

    /// Best-effort flush for abort paths; errors are reported, not raised.
    pub async fn flush_on_abort(&mut self) {
        if let Err(e) = self.flush().await {
            tracing::error!("Best-effort flush on abort failed: {e}");
            return;
        }
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.shutdown().await {
                tracing::error!("Best-effort finalize on abort failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn writer_at(
        dir: &TempDir,
        name: &str,
        threshold: usize,
        dry_run: bool,
    ) -> (StorageProviderRef, ChunkedWriter) {
        let path = dir.path().join(name);
        let storage = Arc::new(
            StorageProvider::for_url(path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let writer = ChunkedWriter::new(
            storage.clone(),
            ChunkedWriterConfig::new(threshold, dry_run),
        );
        (storage, writer)
    }

    #[tokio::test]
    async fn test_lines_written_in_order_with_newlines() {
        let dir = TempDir::new().unwrap();
        let (storage, mut writer) = writer_at(&dir, "out.txt", 1024, false).await;

        writer.write_line("h1~h2").await.unwrap();
        writer.write_line("a~b").await.unwrap();
        writer.write_line("c~d").await.unwrap();
        let written = writer.finish().await.unwrap();

        assert_eq!(written, 14);
        let content = storage.get().await.unwrap();
        assert_eq!(content.as_ref(), b"h1~h2\na~b\nc~d\n");
    }

    #[tokio::test]
    async fn test_flush_threshold_invisible_in_artifact() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..50).map(|i| format!("row{i}~value{i}")).collect();

        // Write the same lines under wildly different thresholds.
        let mut outputs = Vec::new();
        for (name, threshold) in [("tiny.txt", 1), ("mid.txt", 64), ("big.txt", 1 << 20)] {
            let (storage, mut writer) = writer_at(&dir, name, threshold, false).await;
            for line in &lines {
                writer.write_line(line).await.unwrap();
            }
            writer.finish().await.unwrap();
            outputs.push(storage.get().await.unwrap());
        }

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[1], outputs[2]);
    }

    #[tokio::test]
    async fn test_residual_buffer_flushed_at_finish() {
        let dir = TempDir::new().unwrap();
        let (storage, mut writer) = writer_at(&dir, "out.txt", 1 << 20, false).await;

        // Far below the threshold: nothing flushed yet.
        writer.write_line("only").await.unwrap();
        assert_eq!(writer.bytes_written(), 0);

        writer.finish().await.unwrap();
        assert_eq!(storage.get().await.unwrap().as_ref(), b"only\n");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let (storage, mut writer) = writer_at(&dir, "out.txt", 8, true).await;

        for i in 0..100 {
            writer.write_line(&format!("row{i}")).await.unwrap();
        }
        assert_eq!(writer.lines_written(), 100);
        let written = writer.finish().await.unwrap();

        assert_eq!(written, 0);
        assert!(!path.exists());
        assert!(storage.get().await.is_err());
    }
}
