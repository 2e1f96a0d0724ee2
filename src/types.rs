//! Core types for factiva-news

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Kind of snapshot job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Document volume estimate for a query
    Explain,
    /// Time-series aggregation for a query
    Analytics,
    /// Bulk extraction of matching documents into files
    Extraction,
    /// Incremental update (additions, replacements, deletes) of an extraction
    Update,
}

impl JobKind {
    /// Whether completed jobs of this kind produce downloadable files
    pub fn produces_files(self) -> bool {
        matches!(self, JobKind::Extraction | JobKind::Update)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobKind::Explain => "explain",
            JobKind::Analytics => "analytics",
            JobKind::Extraction => "extraction",
            JobKind::Update => "update",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a job
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Built locally, not yet submitted
    #[default]
    Created,
    /// Accepted by the platform
    Submitted,
    /// Queued on the platform
    Pending,
    /// Running on the platform
    Running,
    /// Finished successfully; results are available
    Done,
    /// Finished unsuccessfully
    Failed,
}

impl JobStatus {
    /// Parse a platform job state (`JOB_STATE_*`)
    ///
    /// Returns `None` for states this client does not know about.
    pub fn from_platform(state: &str) -> Option<Self> {
        match state {
            "JOB_STATE_SUBMITTED" | "JOB_CREATED" => Some(JobStatus::Submitted),
            "JOB_STATE_PENDING" | "JOB_STATE_QUEUED" | "JOB_QUEUED" => Some(JobStatus::Pending),
            "JOB_STATE_RUNNING" | "JOB_VALIDATING" | "JOB_STATE_VALIDATING" => {
                Some(JobStatus::Running)
            }
            "JOB_STATE_DONE" => Some(JobStatus::Done),
            "JOB_STATE_FAILED" | "JOB_STATE_CANCELLED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further transition occurs from this status
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

/// Type of a snapshot update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// Documents added since the snapshot
    Additions,
    /// Documents replaced since the snapshot
    Replacements,
    /// Documents deleted since the snapshot
    Deletes,
}

impl UpdateType {
    /// Platform name of the update type
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Additions => "additions",
            UpdateType::Replacements => "replacements",
            UpdateType::Deletes => "deletes",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "additions" => Ok(UpdateType::Additions),
            "replacements" => Ok(UpdateType::Replacements),
            "deletes" => Ok(UpdateType::Deletes),
            other => Err(Error::Construction(format!(
                "unknown update type `{other}` (expected additions, replacements or deletes)"
            ))),
        }
    }
}

/// Tabular analytics result: one JSON object per row
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalyticsTable {
    /// Result rows as returned by the platform
    pub rows: Vec<Map<String, Value>>,
}

impl AnalyticsTable {
    /// Column names in first-seen order across all rows
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.contains(&key.as_str()) {
                    columns.push(key);
                }
            }
        }
        columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Files produced by an extraction or update job
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    /// File format tag (e.g. "avro", "json", "csv")
    pub format: String,
    /// Remote file URIs
    pub uris: Vec<String>,
}

/// Kind-specific payload of a completed job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    /// Explain: number of matching documents
    DocumentVolume(u64),
    /// Analytics: aggregation table
    Analytics(AnalyticsTable),
    /// Extraction or update: downloadable files
    Files(FileSet),
}

impl JobResult {
    /// Document volume, for explain results
    pub fn document_volume(&self) -> Option<u64> {
        match self {
            JobResult::DocumentVolume(count) => Some(*count),
            _ => None,
        }
    }

    /// Analytics table, for analytics results
    pub fn analytics(&self) -> Option<&AnalyticsTable> {
        match self {
            JobResult::Analytics(table) => Some(table),
            _ => None,
        }
    }

    /// File set, for extraction and update results
    pub fn files(&self) -> Option<&FileSet> {
        match self {
            JobResult::Files(files) => Some(files),
            _ => None,
        }
    }
}
