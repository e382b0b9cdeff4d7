//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the sanitizer.
//! Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::counter;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when source bytes are read.
pub struct BytesRead {
    pub bytes: u64,
}

impl InternalEvent for BytesRead {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes read");
        counter!("linescrub_bytes_read_total").increment(self.bytes);
    }
}

/// Event emitted when a buffered chunk reaches the destination.
pub struct BytesWritten {
    pub bytes: u64,
}

impl InternalEvent for BytesWritten {
    fn emit(self) {
        trace!(bytes = self.bytes, "Bytes written");
        counter!("linescrub_bytes_written_total").increment(self.bytes);
    }
}

/// Event emitted on every destination flush.
pub struct ChunkFlushed;

impl InternalEvent for ChunkFlushed {
    fn emit(self) {
        trace!("Chunk flushed");
        counter!("linescrub_chunks_flushed_total").increment(1);
    }
}

/// Classification outcome of a processed line.
#[derive(Debug, Clone, Copy)]
pub enum LineStatus {
    Accepted,
    Repaired,
    Rejected,
}

impl LineStatus {
    fn as_str(&self) -> &'static str {
        match self {
            LineStatus::Accepted => "accepted",
            LineStatus::Repaired => "repaired",
            LineStatus::Rejected => "rejected",
        }
    }
}

/// Event emitted when a data line is classified.
pub struct LineClassified {
    pub status: LineStatus,
}

impl InternalEvent for LineClassified {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Line classified");
        counter!("linescrub_lines_classified_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when logical lines are read from the source.
pub struct LinesProcessed {
    pub count: u64,
}

impl InternalEvent for LinesProcessed {
    fn emit(self) {
        trace!(count = self.count, "Lines processed");
        counter!("linescrub_lines_processed_total").increment(self.count);
    }
}
