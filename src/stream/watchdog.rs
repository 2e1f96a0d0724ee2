//! Account extraction-limit watchdog
//!
//! Runs beside a consuming subscription. It periodically checks the owning
//! stream's status and, once the platform reports the document limit as
//! exceeded, looks up the account's limit for the final report. Exceeding the
//! limit never stops consumption: documents already queued keep flowing.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, str_at, value_at};
use crate::error::{Error, Result};

/// Stream job status reported once the account limit is reached
pub const DOC_COUNT_EXCEEDED: &str = "DOC_COUNT_EXCEEDED";

/// Outcome of a watchdog run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QuotaReport {
    /// Account limit, present only if the limit was reported exceeded
    pub max_allowed_extracts: Option<u64>,
    /// Number of stream status checks performed
    pub checks: u32,
}

impl QuotaReport {
    /// Whether the account's extraction limit was exceeded during consumption
    pub fn exceeded(&self) -> bool {
        self.max_allowed_extracts.is_some()
    }
}

/// Background quota checker for one stream
pub(crate) struct QuotaWatchdog {
    api: ApiClient,
    stream_id: String,
    interval: Duration,
}

impl QuotaWatchdog {
    pub(crate) fn new(api: ApiClient, stream_id: String, interval: Duration) -> Self {
        Self {
            api,
            stream_id,
            interval,
        }
    }

    /// Start checking in a background task until `cancel` fires
    pub(crate) fn spawn(self, cancel: CancellationToken) -> JoinHandle<Result<QuotaReport>> {
        tokio::spawn(async move {
            let stream_id = self.stream_id.clone();
            let result = self.run(cancel).await;
            if let Err(e) = &result {
                error!(stream_id = %stream_id, error = %e, "quota watchdog stopped");
            }
            result
        })
    }

    async fn run(self, cancel: CancellationToken) -> Result<QuotaReport> {
        let mut report = QuotaReport::default();
        debug!(stream_id = %self.stream_id, "quota watchdog started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.check(&mut report) => result?,
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        match report.max_allowed_extracts {
            Some(limit) => warn!(
                stream_id = %self.stream_id,
                max_allowed_extracts = limit,
                "account document limit exceeded; no new documents will be queued for this \
                 stream, documents already queued are still delivered"
            ),
            None => info!(stream_id = %self.stream_id, "job finished"),
        }
        Ok(report)
    }

    async fn check(&self, report: &mut QuotaReport) -> Result<()> {
        report.checks += 1;
        debug!(stream_id = %self.stream_id, "checking if extraction limit is reached");

        let response = self.api.get(&self.api.endpoints().stream(&self.stream_id)).await?;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
                body: response.body,
            });
        }
        let body = response.json()?;
        let job_status = str_at(&body, "/data/attributes/job_status")?;

        if job_status == DOC_COUNT_EXCEEDED && report.max_allowed_extracts.is_none() {
            let limit = self.account_limit().await?;
            warn!(
                stream_id = %self.stream_id,
                max_allowed_extracts = limit,
                "extraction limit reached"
            );
            report.max_allowed_extracts = Some(limit);
        }
        Ok(())
    }

    async fn account_limit(&self) -> Result<u64> {
        let url = self.api.endpoints().account(self.api.auth().account_key());
        let response = self.api.get(&url).await?;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
                body: response.body,
            });
        }
        let body = response.json()?;
        let limit = value_at(&body, "/data/attributes/max_allowed_extracts")?;
        limit
            .as_u64()
            .or_else(|| limit.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| {
                Error::MalformedResponse(format!("max_allowed_extracts is not a number: {limit}"))
            })
    }
}
