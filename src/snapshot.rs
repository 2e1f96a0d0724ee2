//! Snapshot facade over the four job kinds
//!
//! A [`Snapshot`] ties one query (or one existing snapshot id) to explain,
//! analytics, extraction and update jobs, and keeps the last job of each kind
//! so results and files can be fetched again later.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Client;
use crate::error::{Error, Result};
use crate::jobs::{Job, UpdateRequest};
use crate::types::{AnalyticsTable, JobKind, JobResult, JobStatus, UpdateType};

/// Payload provider for snapshot jobs
///
/// [`query`](SnapshotQuery::query) is the shared `query` object; the
/// per-kind payloads default to wrapping it as `{"query": ...}`.
pub trait SnapshotQuery: Send + Sync {
    /// Base query object (`{"where": ..., ...}`)
    fn query(&self) -> Value;

    /// Body for an explain submission
    fn explain_payload(&self) -> Value {
        json!({ "query": self.query() })
    }

    /// Body for an analytics submission
    fn analytics_payload(&self) -> Value {
        json!({ "query": self.query() })
    }

    /// Body for an extraction submission
    fn extraction_payload(&self) -> Value {
        json!({ "query": self.query() })
    }
}

/// Query built from a where clause and optional refinements
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    /// SQL-like filter over the document fields
    #[serde(rename = "where")]
    pub where_clause: String,
    /// Code lists that must match (`{"company_codes": [...]}`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Value>,
    /// Code lists that must not match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<Value>,
    /// Extraction: fields to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select_fields: Option<Vec<String>>,
    /// Extraction: maximum number of documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Extraction: output file format ("avro", "json", "csv")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
    /// Analytics: time bucket ("DAY", "MONTH", "YEAR"; default "MONTH")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// Analytics: date field to bucket on (default "publication_datetime")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_field: Option<String>,
    /// Analytics: also group by source code
    #[serde(default)]
    pub group_by_source_code: bool,
    /// Analytics: keep only the top N groups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
}

impl WhereClause {
    /// Query over a where clause
    pub fn new(where_clause: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            ..Default::default()
        }
    }
}

impl From<&str> for WhereClause {
    fn from(where_clause: &str) -> Self {
        Self::new(where_clause)
    }
}

impl SnapshotQuery for WhereClause {
    fn query(&self) -> Value {
        let mut query = Map::new();
        query.insert("where".into(), json!(self.where_clause));
        if let Some(includes) = &self.includes {
            query.insert("includes".into(), includes.clone());
        }
        if let Some(excludes) = &self.excludes {
            query.insert("excludes".into(), excludes.clone());
        }
        Value::Object(query)
    }

    fn analytics_payload(&self) -> Value {
        let mut query = self.query();
        query["frequency"] = json!(self.frequency.as_deref().unwrap_or("MONTH"));
        query["date_field"] = json!(self.date_field.as_deref().unwrap_or("publication_datetime"));
        query["group_by_source_code"] = json!(self.group_by_source_code);
        if let Some(top) = self.top {
            query["top"] = json!(top);
        }
        json!({ "query": query })
    }

    fn extraction_payload(&self) -> Value {
        let mut query = self.query();
        if let Some(fields) = &self.select_fields {
            query["select"] = json!(fields);
        }
        if let Some(limit) = self.limit {
            query["limit"] = json!(limit);
        }
        if let Some(format) = &self.file_format {
            query["format"] = json!(format);
        }
        json!({ "query": query })
    }
}

/// A query or an existing snapshot, with the last job of each kind
pub struct Snapshot {
    client: Client,
    query: Option<Arc<dyn SnapshotQuery>>,
    snapshot_id: Option<String>,
    explain: Option<Job>,
    analytics: Option<Job>,
    extraction: Option<Job>,
    update: Option<Job>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("query", &self.query.as_ref().map(|q| q.query()))
            .field("snapshot_id", &self.snapshot_id)
            .field("explain", &self.explain.as_ref().map(Job::status))
            .field("analytics", &self.analytics.as_ref().map(Job::status))
            .field("extraction", &self.extraction.as_ref().map(Job::status))
            .field("update", &self.update.as_ref().map(Job::status))
            .finish()
    }
}

impl Client {
    /// Snapshot workflow over a query
    pub fn snapshot(&self, query: impl SnapshotQuery + 'static) -> Snapshot {
        Snapshot {
            client: self.clone(),
            query: Some(Arc::new(query)),
            snapshot_id: None,
            explain: None,
            analytics: None,
            extraction: None,
            update: None,
        }
    }

    /// Snapshot workflow over an existing snapshot, with its extraction job polled once
    pub async fn load_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        let extraction = self.load_extraction(snapshot_id).await?;
        Ok(Snapshot {
            client: self.clone(),
            query: None,
            snapshot_id: Some(snapshot_id.to_string()),
            explain: None,
            analytics: None,
            extraction: Some(extraction),
            update: None,
        })
    }
}

impl Snapshot {
    /// Id of the extracted snapshot, once known
    pub fn snapshot_id(&self) -> Option<&str> {
        self.snapshot_id.as_deref()
    }

    /// Last job of the given kind
    pub fn last_job(&self, kind: JobKind) -> Option<&Job> {
        match kind {
            JobKind::Explain => self.explain.as_ref(),
            JobKind::Analytics => self.analytics.as_ref(),
            JobKind::Extraction => self.extraction.as_ref(),
            JobKind::Update => self.update.as_ref(),
        }
    }

    fn slot(&mut self, kind: JobKind) -> &mut Option<Job> {
        match kind {
            JobKind::Explain => &mut self.explain,
            JobKind::Analytics => &mut self.analytics,
            JobKind::Extraction => &mut self.extraction,
            JobKind::Update => &mut self.update,
        }
    }

    fn require_query(&self) -> Result<Arc<dyn SnapshotQuery>> {
        self.query
            .clone()
            .ok_or_else(|| Error::Construction("this snapshot has no query".into()))
    }

    fn require_snapshot_id(&self) -> Result<String> {
        self.snapshot_id
            .clone()
            .ok_or_else(|| Error::Construction("no snapshot id: submit an extraction first".into()))
    }

    /// Poll the last job of `kind` once
    pub async fn refresh(&mut self, kind: JobKind) -> Result<JobStatus> {
        let client = self.client.clone();
        let job = self
            .slot(kind)
            .as_mut()
            .ok_or_else(|| Error::InvalidArgument(format!("no {kind} job has been started")))?;
        client.poll_job(job).await
    }

    /// Submit an explain job for the query
    pub async fn submit_explain(&mut self) -> Result<&Job> {
        let payload = self.require_query()?.explain_payload();
        let job = self.explain.insert(self.client.explain_job());
        self.client.submit_job(job, Some(&payload)).await?;
        Ok(&*job)
    }

    /// Run an explain job to completion and return the document volume
    pub async fn process_explain(&mut self) -> Result<u64> {
        let payload = self.require_query()?.explain_payload();
        let job = self.explain.insert(self.client.explain_job());
        self.client.process_job(job, Some(&payload), None).await?;
        job.result()
            .and_then(JobResult::document_volume)
            .ok_or_else(|| Error::MalformedResponse("explain job finished without counts".into()))
    }

    /// Submit an analytics job for the query
    pub async fn submit_analytics(&mut self) -> Result<&Job> {
        let payload = self.require_query()?.analytics_payload();
        let job = self.analytics.insert(self.client.analytics_job());
        self.client.submit_job(job, Some(&payload)).await?;
        Ok(&*job)
    }

    /// Run an analytics job to completion and return its table
    pub async fn process_analytics(&mut self) -> Result<AnalyticsTable> {
        let payload = self.require_query()?.analytics_payload();
        let job = self.analytics.insert(self.client.analytics_job());
        self.client.process_job(job, Some(&payload), None).await?;
        job.result()
            .and_then(JobResult::analytics)
            .cloned()
            .ok_or_else(|| {
                Error::MalformedResponse("analytics job finished without results".into())
            })
    }

    /// Submit an extraction job; its identifier becomes this snapshot's id
    pub async fn submit_extraction(&mut self) -> Result<&Job> {
        let payload = self.require_query()?.extraction_payload();
        let job = self.extraction.insert(self.client.extraction_job());
        self.client.submit_job(job, Some(&payload)).await?;
        self.snapshot_id = job.identifier().map(str::to_string);
        Ok(&*job)
    }

    /// Run an extraction to completion and download its files
    pub async fn process_extraction(&mut self, download_to: Option<&Path>) -> Result<Vec<PathBuf>> {
        let payload = self.require_query()?.extraction_payload();
        let job = self.extraction.insert(self.client.extraction_job());
        let submitted = self.client.submit_job(job, Some(&payload)).await;
        self.snapshot_id = job.identifier().map(str::to_string);
        submitted?;
        self.finish_and_download(JobKind::Extraction, download_to).await
    }

    /// Download the files of the last extraction again
    pub async fn download_extraction_files(&self, download_to: Option<&Path>) -> Result<Vec<PathBuf>> {
        self.download_last(JobKind::Extraction, download_to).await
    }

    /// Submit an update of the extracted snapshot
    pub async fn submit_update(&mut self, update_type: UpdateType) -> Result<&Job> {
        let request = UpdateRequest::new(self.require_snapshot_id()?, update_type);
        let job = self.update.insert(self.client.update_job(request)?);
        self.client.submit_job(job, None).await?;
        Ok(&*job)
    }

    /// Run an update of the extracted snapshot to completion and download its files
    pub async fn process_update(
        &mut self,
        update_type: UpdateType,
        download_to: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let request = UpdateRequest::new(self.require_snapshot_id()?, update_type);
        let job = self.update.insert(self.client.update_job(request)?);
        self.client.submit_job(job, None).await?;
        self.finish_and_download(JobKind::Update, download_to).await
    }

    /// Download the files of the last update again
    pub async fn download_update_files(&self, download_to: Option<&Path>) -> Result<Vec<PathBuf>> {
        self.download_last(JobKind::Update, download_to).await
    }

    async fn finish_and_download(
        &mut self,
        kind: JobKind,
        download_to: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let client = self.client.clone();
        let Some(job) = self.slot(kind).as_mut() else {
            return Err(Error::InvalidArgument(format!("no {kind} job has been started")));
        };
        if client.wait_for_job(job, None).await? == JobStatus::Failed {
            return Err(Error::JobFailed {
                identifier: job.identifier().unwrap_or_default().to_string(),
                errors: job
                    .errors()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "no error details reported".to_string()),
            });
        }
        client.download_job_files(job, download_to).await
    }

    async fn download_last(&self, kind: JobKind, download_to: Option<&Path>) -> Result<Vec<PathBuf>> {
        let job = self
            .last_job(kind)
            .ok_or_else(|| Error::InvalidArgument(format!("no {kind} job has been started")))?;
        self.client.download_job_files(job, download_to).await
    }
}
