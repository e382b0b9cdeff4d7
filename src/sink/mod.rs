//! Sink coordinator: buffered chunked writing of accepted lines.

pub mod writer;

pub use writer::{ChunkedWriter, ChunkedWriterConfig};
