//! Shared job lifecycle: submit, poll, wait, process

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Job, UpdateRequest, download};
use crate::Client;
use crate::api::str_at;
use crate::error::{Error, Result};
use crate::types::{JobResult, JobStatus};

/// HTTP status the platform returns for a created job
const CREATED: u16 = 201;
/// HTTP status of a successful status lookup
const OK: u16 = 200;

impl Client {
    /// Submit a job to the platform
    ///
    /// On `201 Created` the job receives its identifier (trimmed per kind)
    /// and its resource link, and moves to [`JobStatus::Submitted`].
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if the job already has an identifier
    ///   (build a new job to submit again)
    /// - [`Error::Submission`] for any status other than 201; the job is unchanged
    pub async fn submit_job(&self, job: &mut Job, payload: Option<&Value>) -> Result<()> {
        if let Some(identifier) = job.identifier() {
            return Err(Error::InvalidArgument(format!(
                "job {identifier} has already been submitted"
            )));
        }

        let capabilities = job.kind().capabilities();
        let api = self.api.with_auth(job.auth().clone());
        let url = (capabilities.submission_url)(job, api.endpoints())?;

        let response = api.post(&url, payload).await?;
        if response.status != CREATED {
            tracing::warn!(
                kind = %job.kind(),
                status = response.status,
                "job submission rejected"
            );
            return Err(Error::Submission {
                status: response.status,
                body: response.body,
            });
        }

        let body = response.json()?;
        let identifier = (capabilities.identifier_from)(str_at(&body, "/data/id")?);
        let resource_link = body
            .pointer("/links/self")
            .and_then(Value::as_str)
            .filter(|_| capabilities.uses_self_link)
            .map(str::to_string)
            .unwrap_or_else(|| {
                api.endpoints()
                    .resource_url_for(job.kind(), &identifier, job.auth().key())
            });

        tracing::info!(kind = %job.kind(), identifier = %identifier, "job submitted");
        job.mark_submitted(identifier, resource_link)
    }

    /// Fetch the current status of a job once
    ///
    /// When the platform reports the job done, the kind-specific result is
    /// extracted and stored on the job in the same step.
    ///
    /// # Errors
    /// [`Error::Poll`] if the job has no resource link (no request is made)
    /// or the platform answers with anything but 200.
    pub async fn poll_job(&self, job: &mut Job) -> Result<JobStatus> {
        let Some(link) = job.resource_link().map(str::to_string) else {
            return Err(Error::Poll {
                link: None,
                status: None,
                message: "job has no resource link; submit it first".into(),
            });
        };

        let api = self.api.with_auth(job.auth().clone());
        let response = api.get(&link).await?;
        if response.status != OK {
            return Err(Error::Poll {
                link: Some(link),
                status: Some(response.status),
                message: response.body,
            });
        }

        let body = response.json()?;
        let state = body
            .pointer("/data/attributes/job_status")
            .or_else(|| body.pointer("/data/attributes/current_state"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_field("/data/attributes/job_status"))?;

        let status = JobStatus::from_platform(state).unwrap_or_else(|| {
            tracing::warn!(state, link = %link, "unrecognized job state, treating as running");
            JobStatus::Running
        });

        match status {
            JobStatus::Done => {
                let result = (job.kind().capabilities().result_from)(&body)?;
                job.complete(result);
            }
            JobStatus::Failed => {
                let errors = body
                    .pointer("/errors")
                    .or_else(|| body.pointer("/data/attributes/errors"))
                    .cloned();
                job.record_status(status, errors);
            }
            other => job.record_status(other, None),
        }

        tracing::debug!(
            kind = %job.kind(),
            identifier = job.identifier().unwrap_or_default(),
            state,
            status = ?status,
            "job polled"
        );
        Ok(status)
    }

    /// Poll until the job reaches a terminal status
    ///
    /// Polls immediately, then every `interval` (default:
    /// [`JobConfig::poll_interval`](crate::config::JobConfig::poll_interval)).
    /// There is no overall deadline; wrap the call in
    /// [`tokio::time::timeout`] to bound it.
    pub async fn wait_for_job(&self, job: &mut Job, interval: Option<Duration>) -> Result<JobStatus> {
        let interval = interval.unwrap_or(self.config.jobs.poll_interval);
        loop {
            let status = self.poll_job(job).await?;
            if status.is_terminal() {
                tracing::info!(
                    kind = %job.kind(),
                    identifier = job.identifier().unwrap_or_default(),
                    status = ?status,
                    "job finished"
                );
                return Ok(status);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Submit, wait for completion and, for file-producing kinds, download the files
    ///
    /// Returns the downloaded paths (empty for explain and analytics jobs).
    ///
    /// # Errors
    /// [`Error::JobFailed`] when the job ends in the failed state, plus any
    /// submission, poll or download error.
    pub async fn process_job(
        &self,
        job: &mut Job,
        payload: Option<&Value>,
        download_to: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        self.submit_job(job, payload).await?;
        if self.wait_for_job(job, None).await? == JobStatus::Failed {
            return Err(Error::JobFailed {
                identifier: job.identifier().unwrap_or_default().to_string(),
                errors: job
                    .errors()
                    .map(Value::to_string)
                    .unwrap_or_else(|| "no error details reported".to_string()),
            });
        }

        if !job.kind().produces_files() {
            return Ok(Vec::new());
        }
        self.download_job_files(job, download_to).await
    }

    /// Download the files of a completed extraction or update job
    ///
    /// Files go to `download_to`, or to `<download_dir>/<identifier>` when
    /// no path is given.
    pub async fn download_job_files(
        &self,
        job: &Job,
        download_to: Option<&Path>,
    ) -> Result<Vec<PathBuf>> {
        let Some(JobResult::Files(files)) = job.result() else {
            return Err(Error::InvalidArgument(format!(
                "{} job has no files to download (status {:?})",
                job.kind(),
                job.status()
            )));
        };

        let target_dir = match download_to {
            Some(path) => path.to_path_buf(),
            None => self
                .config
                .jobs
                .download_dir
                .join(job.identifier().unwrap_or_default()),
        };

        download::download_all(
            self.api.http(),
            &job.auth().headers()?,
            &files.uris,
            &target_dir,
        )
        .await
    }

    /// Rebuild an extraction job from a snapshot id and fetch its status
    pub async fn load_extraction(&self, snapshot_id: &str) -> Result<Job> {
        if snapshot_id.is_empty() {
            return Err(Error::Construction("snapshot_id must not be empty".into()));
        }
        let mut job = Job::extraction_from_snapshot(
            snapshot_id,
            self.api.auth().clone(),
            self.api.endpoints(),
        );
        self.poll_job(&mut job).await?;
        Ok(job)
    }

    /// Rebuild an update job from an update id and fetch its status
    pub async fn load_update(&self, update_id: &str) -> Result<Job> {
        let mut job = self.update_job(UpdateRequest::existing(update_id))?;
        self.poll_job(&mut job).await?;
        Ok(job)
    }
}
