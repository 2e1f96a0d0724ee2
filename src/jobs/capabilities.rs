//! Per-kind job behavior
//!
//! Each [`JobKind`] maps to a static table of plain functions. The lifecycle
//! code dispatches through this table instead of matching on the kind at every
//! step, so adding a kind means adding one table.

use serde_json::Value;

use crate::api::{str_at, value_at};
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};
use crate::types::{AnalyticsTable, FileSet, JobKind, JobResult};

use super::Job;

/// Kind-specific operations used by the shared job lifecycle
pub(crate) struct Capabilities {
    /// Submission URL for a job
    pub submission_url: fn(&Job, &Endpoints) -> Result<String>,
    /// Caller-visible identifier from a creation response's `data.id`
    pub identifier_from: fn(&str) -> String,
    /// Whether a `links.self` in the creation response is trusted as the status URL
    pub uses_self_link: bool,
    /// Result payload from a terminal-success status response
    pub result_from: fn(&Value) -> Result<JobResult>,
}

static EXPLAIN: Capabilities = Capabilities {
    submission_url: collection_url,
    identifier_from: raw_identifier,
    uses_self_link: true,
    result_from: document_volume,
};

static ANALYTICS: Capabilities = Capabilities {
    submission_url: collection_url,
    identifier_from: raw_identifier,
    uses_self_link: true,
    result_from: analytics_table,
};

static EXTRACTION: Capabilities = Capabilities {
    submission_url: collection_url,
    identifier_from: snapshot_identifier,
    uses_self_link: false,
    result_from: file_set,
};

static UPDATE: Capabilities = Capabilities {
    submission_url: update_url,
    identifier_from: update_identifier,
    uses_self_link: false,
    result_from: file_set,
};

impl JobKind {
    pub(crate) fn capabilities(self) -> &'static Capabilities {
        match self {
            JobKind::Explain => &EXPLAIN,
            JobKind::Analytics => &ANALYTICS,
            JobKind::Extraction => &EXTRACTION,
            JobKind::Update => &UPDATE,
        }
    }
}

fn collection_url(job: &Job, endpoints: &Endpoints) -> Result<String> {
    Ok(endpoints.endpoint_for(job.kind()))
}

fn update_url(job: &Job, endpoints: &Endpoints) -> Result<String> {
    let target = job
        .update_target()
        .ok_or_else(|| Error::Construction("update job has no update target".into()))?;
    Ok(endpoints.update_submission_url(
        job.auth().key(),
        target.snapshot_id(),
        target.update_type(),
    ))
}

fn raw_identifier(id: &str) -> String {
    id.to_string()
}

/// Snapshot id: last dash-delimited segment of the full resource id
pub(crate) fn snapshot_identifier(id: &str) -> String {
    id.rsplit('-').next().unwrap_or(id).to_string()
}

/// Update id: last three dash-delimited segments (`{snapshot}-{type}-{timestamp}`)
pub(crate) fn update_identifier(id: &str) -> String {
    let segments: Vec<&str> = id.split('-').collect();
    let start = segments.len().saturating_sub(3);
    segments[start..].join("-")
}

fn document_volume(body: &Value) -> Result<JobResult> {
    let counts = value_at(body, "/data/attributes/counts")?;
    let volume = counts
        .as_u64()
        .or_else(|| counts.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| {
            Error::MalformedResponse(format!("document count is not a number: {counts}"))
        })?;
    Ok(JobResult::DocumentVolume(volume))
}

fn analytics_table(body: &Value) -> Result<JobResult> {
    let results = value_at(body, "/data/attributes/results")?;
    let table: AnalyticsTable = serde_json::from_value(results.clone())?;
    Ok(JobResult::Analytics(table))
}

fn file_set(body: &Value) -> Result<JobResult> {
    let format = body
        .pointer("/data/attributes/format")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let files = value_at(body, "/data/attributes/files")?
        .as_array()
        .ok_or_else(|| Error::MalformedResponse("`files` is not an array".into()))?;
    let uris = files
        .iter()
        .map(|file| str_at(file, "/uri").map(str::to_string))
        .collect::<Result<Vec<_>>>()?;
    Ok(JobResult::Files(FileSet { format, uris }))
}
