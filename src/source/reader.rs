//! Chunked streaming line reader.
//!
//! Reads the source in bounded ranged chunks rather than line by line,
//! reassembling logical lines across chunk boundaries with a carry buffer.
//! Works identically over a local file and a remote object body because
//! both sit behind the same storage provider.

use bytes::{Buf, Bytes, BytesMut};
use snafu::prelude::*;
use tracing::debug;

use crate::emit;
use crate::error::{ChunkReadSnafu, EmptySourceSnafu, ReadError, SourceStatSnafu};
use crate::metrics::events::BytesRead;
use crate::source::progress::ProgressObserverRef;
use crate::storage::StorageProviderRef;

/// Configuration for the streaming reader.
#[derive(Debug, Clone)]
pub struct StreamingReaderConfig {
    /// Bytes to request per chunked read.
    pub chunk_size_bytes: usize,
}

impl StreamingReaderConfig {
    pub fn new(chunk_size_bytes: usize) -> Self {
        Self { chunk_size_bytes }
    }
}

/// One logical line, still undecoded.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// Line bytes with the terminator (and any `\r` before it) stripped.
    pub bytes: Bytes,
    /// 1-based ordinal from stream start; the header is line 1.
    pub number: u64,
    /// Absolute byte offset of the line start within the source.
    pub byte_offset: u64,
}

/// Pull-based logical-line source over a storage provider.
///
/// Forward-only: each call to [`next_line`](Self::next_line) either yields
/// the next line, `None` at exhaustion, or a fatal read error. A non-empty
/// carry at end of source is emitted as a final line even without a
/// trailing newline.
pub struct StreamingReader {
    storage: StorageProviderRef,
    config: StreamingReaderConfig,
    progress: Option<ProgressObserverRef>,
    /// Total object size from the initial stat.
    total_size: u64,
    /// Next byte offset to request.
    read_offset: u64,
    /// Unconsumed bytes carried between chunk reads.
    carry: BytesMut,
    /// Absolute offset of the first byte in `carry`.
    carry_offset: u64,
    /// Lines emitted so far.
    lines_emitted: u64,
}

impl std::fmt::Debug for StreamingReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingReader")
            .field("total_size", &self.total_size)
            .field("read_offset", &self.read_offset)
            .field("carry_offset", &self.carry_offset)
            .field("lines_emitted", &self.lines_emitted)
            .finish_non_exhaustive()
    }
}

impl StreamingReader {
    /// Stat the source and prepare for reading.
    ///
    /// Fails with [`ReadError::EmptySource`] when the object has zero
    /// bytes; such a source cannot even produce a header line.
    pub async fn open(
        storage: StorageProviderRef,
        config: StreamingReaderConfig,
        progress: Option<ProgressObserverRef>,
    ) -> Result<Self, ReadError> {
        let total_size = storage.size().await.context(SourceStatSnafu {
            path: storage.url().to_string(),
        })? as u64;

        ensure!(
            total_size > 0,
            EmptySourceSnafu {
                path: storage.url().to_string(),
            }
        );

        debug!("Opened {} ({} bytes)", storage.url(), total_size);

        Ok(Self {
            storage,
            config,
            progress,
            total_size,
            read_offset: 0,
            carry: BytesMut::new(),
            carry_offset: 0,
            lines_emitted: 0,
        })
    }

    /// Total source size in bytes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Bytes consumed from the source so far.
    pub fn bytes_processed(&self) -> u64 {
        self.read_offset
    }

    /// Lines emitted so far.
    pub fn lines_emitted(&self) -> u64 {
        self.lines_emitted
    }

    /// Whether the source is exhausted and the carry is drained.
    pub fn is_exhausted(&self) -> bool {
        self.read_offset >= self.total_size && self.carry.is_empty()
    }

    /// Pull the next logical line.
    ///
    /// Returns `Ok(None)` at end of stream. Reading the next chunk is the
    /// only operation here that can block.
    pub async fn next_line(&mut self) -> Result<Option<RawLine>, ReadError> {
        loop {
            if let Some(newline_idx) = memchr_newline(&self.carry) {
                return Ok(Some(self.take_line(newline_idx, true)));
            }

            if self.read_offset >= self.total_size {
                // Source exhausted: emit the final unterminated line.
                if self.carry.is_empty() {
                    return Ok(None);
                }
                let len = self.carry.len();
                return Ok(Some(self.take_line(len, false)));
            }

            self.fill_carry().await?;
        }
    }

    /// Read the next chunk from the source into the carry buffer.
    async fn fill_carry(&mut self) -> Result<(), ReadError> {
        let start = self.read_offset as usize;
        let end = std::cmp::min(
            self.read_offset + self.config.chunk_size_bytes as u64,
            self.total_size,
        ) as usize;

        let chunk = self
            .storage
            .get_range(start..end)
            .await
            .context(ChunkReadSnafu {
                path: self.storage.url().to_string(),
                offset: self.read_offset,
            })?;

        self.read_offset = end as u64;
        emit!(BytesRead {
            bytes: chunk.len() as u64
        });
        if let Some(progress) = &self.progress {
            progress.on_progress(self.read_offset, Some(self.total_size));
        }

        self.carry.extend_from_slice(&chunk);
        Ok(())
    }

    /// Split one line out of the carry buffer.
    ///
    /// `line_len` is the length up to (not including) the newline;
    /// `terminated` says whether a newline byte follows and must be
    /// consumed. A `\r` before the terminator is stripped.
    fn take_line(&mut self, line_len: usize, terminated: bool) -> RawLine {
        let offset = self.carry_offset;
        let mut line = self.carry.split_to(line_len).freeze();
        let mut consumed = line_len;

        if terminated {
            self.carry.advance(1);
            consumed += 1;
        }

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        self.carry_offset = offset + consumed as u64;
        self.lines_emitted += 1;

        RawLine {
            bytes: line,
            number: self.lines_emitted,
            byte_offset: offset,
        }
    }
}

fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn reader_over(content: &[u8], chunk_size: usize) -> (TempDir, StreamingReader) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.txt");
        std::fs::write(&path, content).unwrap();

        let storage = Arc::new(
            StorageProvider::for_url(path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let reader = StreamingReader::open(storage, StreamingReaderConfig::new(chunk_size), None)
            .await
            .unwrap();
        (temp_dir, reader)
    }

    async fn collect_lines(reader: &mut StreamingReader) -> Vec<(u64, u64, String)> {
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push((
                line.number,
                line.byte_offset,
                String::from_utf8(line.bytes.to_vec()).unwrap(),
            ));
        }
        lines
    }

    #[tokio::test]
    async fn test_lines_reassembled_across_chunk_boundaries() {
        // 4-byte chunks split every line across reads.
        let (_dir, mut reader) = reader_over(b"alpha~1\nbeta~2\ngamma~3\n", 4).await;
        let lines = collect_lines(&mut reader).await;

        assert_eq!(
            lines,
            vec![
                (1, 0, "alpha~1".to_string()),
                (2, 8, "beta~2".to_string()),
                (3, 15, "gamma~3".to_string()),
            ]
        );
        assert!(reader.is_exhausted());
    }

    #[tokio::test]
    async fn test_final_line_without_newline_is_emitted() {
        let (_dir, mut reader) = reader_over(b"header~h\ntail~t", 1024).await;
        let lines = collect_lines(&mut reader).await;

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].2, "tail~t");
    }

    #[tokio::test]
    async fn test_crlf_normalized() {
        let (_dir, mut reader) = reader_over(b"a~b\r\nc~d\r\n", 1024).await;
        let lines = collect_lines(&mut reader).await;

        assert_eq!(lines[0].2, "a~b");
        assert_eq!(lines[1].2, "c~d");
        // byte offsets still count the source's own terminators
        assert_eq!(lines[1].1, 5);
    }

    #[tokio::test]
    async fn test_empty_lines_preserved() {
        let (_dir, mut reader) = reader_over(b"a\n\nb\n", 1024).await;
        let lines = collect_lines(&mut reader).await;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].2, "");
    }

    #[tokio::test]
    async fn test_empty_source_fails_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();

        let storage = Arc::new(
            StorageProvider::for_url(path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let err = StreamingReader::open(storage, StreamingReaderConfig::new(1024), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::EmptySource { .. }));
    }

    #[tokio::test]
    async fn test_progress_reports_total_size() {
        use crate::source::progress::ProgressObserver;
        use std::sync::Mutex;

        struct Recorder(Mutex<Vec<(u64, Option<u64>)>>);
        impl ProgressObserver for Recorder {
            fn on_progress(&self, processed: u64, total: Option<u64>) {
                self.0.lock().unwrap().push((processed, total));
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("input.txt");
        std::fs::write(&path, b"0123456789\n0123456789\n").unwrap();

        let storage = Arc::new(
            StorageProvider::for_url(path.to_str().unwrap())
                .await
                .unwrap(),
        );
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut reader = StreamingReader::open(
            storage,
            StreamingReaderConfig::new(8),
            Some(recorder.clone()),
        )
        .await
        .unwrap();

        while reader.next_line().await.unwrap().is_some() {}

        let updates = recorder.0.lock().unwrap();
        assert_eq!(
            *updates,
            vec![(8, Some(22)), (16, Some(22)), (22, Some(22))]
        );
    }
}
