//! Bad-line report accumulation and persistence.
//!
//! The pipeline owns one report per run. Records accumulate in memory and
//! are returned to the caller; persistence (NDJSON, one record per line)
//! is offered for callers that want an artifact to inspect later.

pub mod types;

pub use types::{BadLineRecord, RunSummary};

use snafu::prelude::*;

use crate::error::{ReportError, ReportSerializeSnafu, ReportWriteSnafu};
use crate::storage::StorageProvider;

/// Accumulating report of rejected lines for a single run.
#[derive(Debug, Default)]
pub struct BadLineReport {
    records: Vec<BadLineRecord>,
}

impl BadLineReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from already-collected records.
    pub fn from_records(records: Vec<BadLineRecord>) -> Self {
        Self { records }
    }

    /// Append a record.
    pub fn push(&mut self, record: BadLineRecord) {
        self.records.push(record);
    }

    /// Number of records accumulated.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the report is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The accumulated records.
    pub fn records(&self) -> &[BadLineRecord] {
        &self.records
    }

    /// Take ownership of the accumulated records, leaving the report empty.
    pub fn take_records(&mut self) -> Vec<BadLineRecord> {
        std::mem::take(&mut self.records)
    }

    /// Serialize the report as NDJSON (one JSON record per line).
    pub fn to_ndjson(&self) -> Result<String, ReportError> {
        let mut ndjson = String::new();
        for record in &self.records {
            let line = serde_json::to_string(record).context(ReportSerializeSnafu)?;
            ndjson.push_str(&line);
            ndjson.push('\n');
        }
        Ok(ndjson)
    }

    /// Persist the report to the given storage location as NDJSON.
    pub async fn persist(&self, storage: &StorageProvider) -> Result<(), ReportError> {
        let ndjson = self.to_ndjson()?;
        storage
            .put(bytes::Bytes::from(ndjson))
            .await
            .context(ReportWriteSnafu)?;
        Ok(())
    }
}
