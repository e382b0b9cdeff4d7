//! Source coordinator: chunked, pull-based line reading.

pub mod progress;
pub mod reader;

pub use progress::ProgressObserver;
pub use reader::{RawLine, StreamingReader, StreamingReaderConfig};
