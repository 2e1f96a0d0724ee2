//! Snapshot jobs: record, per-kind capabilities and the shared lifecycle.
//!
//! The job state machine is split by concern:
//! - this module - the [`Job`] record and update identity parsing
//! - [`capabilities`] - per-kind endpoint, identifier and result extraction
//! - [`lifecycle`] - submit / poll / wait / process on [`Client`](crate::Client)
//! - [`download`] - file retrieval for extraction and update jobs

pub(crate) mod capabilities;
pub mod download;
mod lifecycle;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};
use crate::types::{JobKind, JobResult, JobStatus, UpdateType};

/// Timestamp layout embedded in update ids
const UPDATE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// One platform-side asynchronous computation
///
/// A job is exclusively owned by the caller that built it. Its `identifier`
/// is assigned exactly once (at submission, or at construction when the job
/// is rebuilt from a known id), and its result is only present once the
/// status is [`JobStatus::Done`].
#[derive(Clone, Debug)]
pub struct Job {
    kind: JobKind,
    identifier: Option<String>,
    resource_link: Option<String>,
    status: JobStatus,
    result: Option<JobResult>,
    errors: Option<Value>,
    update: Option<UpdateTarget>,
    auth: AuthContext,
}

impl Job {
    fn blank(kind: JobKind, auth: AuthContext) -> Self {
        Self {
            kind,
            identifier: None,
            resource_link: None,
            status: JobStatus::Created,
            result: None,
            errors: None,
            update: None,
            auth,
        }
    }

    /// New explain (document count) job
    pub fn explain(auth: AuthContext) -> Self {
        Self::blank(JobKind::Explain, auth)
    }

    /// New analytics (aggregation) job
    pub fn analytics(auth: AuthContext) -> Self {
        Self::blank(JobKind::Analytics, auth)
    }

    /// New extraction job
    pub fn extraction(auth: AuthContext) -> Self {
        Self::blank(JobKind::Extraction, auth)
    }

    /// Rebuild an extraction job from the id of an existing snapshot
    ///
    /// The job is ready to poll; no request is made here.
    pub fn extraction_from_snapshot(
        snapshot_id: impl Into<String>,
        auth: AuthContext,
        endpoints: &Endpoints,
    ) -> Self {
        let snapshot_id = snapshot_id.into();
        let mut job = Self::blank(JobKind::Extraction, auth);
        job.resource_link =
            Some(endpoints.resource_url_for(JobKind::Extraction, &snapshot_id, job.auth.key()));
        job.identifier = Some(snapshot_id);
        job
    }

    /// New or rebuilt update job
    ///
    /// When the target was resolved from an update id, the job is rebuilt
    /// with its identifier and resource link; otherwise it awaits submission.
    pub fn update(target: UpdateTarget, auth: AuthContext, endpoints: &Endpoints) -> Self {
        let mut job = Self::blank(JobKind::Update, auth);
        if let Some(update_id) = target.update_id.clone() {
            job.resource_link =
                Some(endpoints.resource_url_for(JobKind::Update, &update_id, job.auth.key()));
            job.identifier = Some(update_id);
        }
        job.update = Some(target);
        job
    }

    /// Job kind
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Identifier assigned at submission or reconstruction
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Status URL, derived from the identifier
    pub fn resource_link(&self) -> Option<&str> {
        self.resource_link.as_deref()
    }

    /// Current lifecycle status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Kind-specific payload, present only once the job is done
    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    /// Error details reported by the platform for a failed job
    pub fn errors(&self) -> Option<&Value> {
        self.errors.as_ref()
    }

    /// Update identity, for update jobs
    pub fn update_target(&self) -> Option<&UpdateTarget> {
        self.update.as_ref()
    }

    /// Authentication handle this job issues its requests with
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Assign identity after a successful submission
    pub(crate) fn mark_submitted(&mut self, identifier: String, resource_link: String) -> Result<()> {
        if let Some(existing) = &self.identifier {
            return Err(Error::Construction(format!(
                "job identifier is already set to {existing}"
            )));
        }
        if let Some(target) = self.update.as_mut() {
            target.update_id.get_or_insert_with(|| identifier.clone());
        }
        self.identifier = Some(identifier);
        self.resource_link = Some(resource_link);
        self.status = JobStatus::Submitted;
        Ok(())
    }

    /// Record a non-terminal or failed status reported by a poll
    pub(crate) fn record_status(&mut self, status: JobStatus, errors: Option<Value>) {
        debug_assert!(status != JobStatus::Done, "done jobs go through complete()");
        self.status = status;
        if status == JobStatus::Failed {
            self.errors = errors;
        }
    }

    /// Record a successful completion together with its payload
    pub(crate) fn complete(&mut self, result: JobResult) {
        self.status = JobStatus::Done;
        self.result = Some(result);
    }
}

/// Caller-supplied identity of an update job
///
/// Exactly one form must be given: either an `update_id` issued by a
/// previous submission, or a `snapshot_id` together with an `update_type`.
#[derive(Clone, Debug, Default)]
pub struct UpdateRequest {
    /// Id of a previously created update (`{snapshotId}-{updateType}-{timestamp}`)
    pub update_id: Option<String>,
    /// Id of the snapshot being updated
    pub snapshot_id: Option<String>,
    /// Update type: "additions", "replacements" or "deletes"
    pub update_type: Option<String>,
}

impl UpdateRequest {
    /// Request a new update of a snapshot
    pub fn new(snapshot_id: impl Into<String>, update_type: UpdateType) -> Self {
        Self {
            update_id: None,
            snapshot_id: Some(snapshot_id.into()),
            update_type: Some(update_type.as_str().to_string()),
        }
    }

    /// Refer to an existing update by id
    pub fn existing(update_id: impl Into<String>) -> Self {
        Self {
            update_id: Some(update_id.into()),
            snapshot_id: None,
            update_type: None,
        }
    }

    /// Validate the request into an [`UpdateTarget`]
    ///
    /// # Errors
    /// [`Error::Construction`] when both forms or neither are given, or when
    /// the update type or update id cannot be parsed.
    pub fn resolve(self) -> Result<UpdateTarget> {
        let UpdateRequest {
            update_id,
            snapshot_id,
            update_type,
        } = self;

        match (update_id, snapshot_id, update_type) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(Error::Construction(
                "update_id is not compatible with update_type and snapshot_id".into(),
            )),
            (Some(update_id), None, None) => UpdateTarget::from_update_id(&update_id),
            (None, Some(snapshot_id), Some(update_type)) => {
                if snapshot_id.is_empty() {
                    return Err(Error::Construction("snapshot_id must not be empty".into()));
                }
                Ok(UpdateTarget {
                    snapshot_id,
                    update_type: update_type.parse()?,
                    update_id: None,
                })
            }
            _ => Err(Error::Construction(
                "not enough parameters to create an update job".into(),
            )),
        }
    }
}

/// Resolved identity of an update job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateTarget {
    snapshot_id: String,
    update_type: UpdateType,
    update_id: Option<String>,
}

impl UpdateTarget {
    /// Parse an update id of the form `{snapshotId}-{updateType}-{timestamp}`
    pub fn from_update_id(update_id: &str) -> Result<Self> {
        let mut parts = update_id.split('-');
        let (Some(snapshot_id), Some(update_type), Some(timestamp), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Construction(format!(
                "update id `{update_id}` is not of the form snapshot-type-timestamp"
            )));
        };
        if snapshot_id.is_empty() || timestamp.is_empty() {
            return Err(Error::Construction(format!(
                "update id `{update_id}` has empty segments"
            )));
        }
        Ok(Self {
            snapshot_id: snapshot_id.to_string(),
            update_type: update_type.parse()?,
            update_id: Some(update_id.to_string()),
        })
    }

    /// Snapshot being updated
    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    /// Update type
    pub fn update_type(&self) -> UpdateType {
        self.update_type
    }

    /// Update id, when the target refers to an existing update
    pub fn update_id(&self) -> Option<&str> {
        self.update_id.as_deref()
    }

    /// Creation time encoded in the update id
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        let update_id = self.update_id.as_deref()?;
        let timestamp = update_id.rsplit('-').next()?;
        NaiveDateTime::parse_from_str(timestamp, UPDATE_TIMESTAMP_FORMAT).ok()
    }
}
