//! Endpoint resolution for jobs, streams and accounts
//!
//! Pure URL construction: no I/O and no error paths. Every URL the crate
//! talks to is built here from the configured host.

use crate::types::{JobKind, UpdateType};

/// Snapshot (extraction) documents collection
const SNAPSHOTS_PATH: &str = "/alpha/extractions/documents";
/// Explain endpoint suffix under the snapshots collection
const EXPLAIN_SUFFIX: &str = "/_explain";
/// Analytics collection
const ANALYTICS_PATH: &str = "/alpha/analytics";
/// Extractions collection (update submissions)
const EXTRACTIONS_PATH: &str = "/alpha/extractions";
/// Streams collection
const STREAMS_PATH: &str = "/alpha/streams";
/// Accounts collection
const ACCOUNTS_PATH: &str = "/alpha/accounts";

/// Prefix the platform puts in front of every extraction resource id
pub const EXTRACTION_ID_PREFIX: &str = "dj-synhub-extraction";

/// URL builder bound to one platform host
#[derive(Clone, Debug)]
pub struct Endpoints {
    host: String,
}

impl Endpoints {
    /// Create a resolver for the given scheme and host (trailing slashes are ignored)
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
        }
    }

    /// Host this resolver builds URLs for
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base submission URL for a job kind
    ///
    /// Update jobs are submitted below this base, see [`Endpoints::update_submission_url`].
    pub fn endpoint_for(&self, kind: JobKind) -> String {
        match kind {
            JobKind::Explain => format!("{}{SNAPSHOTS_PATH}{EXPLAIN_SUFFIX}", self.host),
            JobKind::Analytics => format!("{}{ANALYTICS_PATH}", self.host),
            JobKind::Extraction => format!("{}{SNAPSHOTS_PATH}", self.host),
            JobKind::Update => format!("{}{EXTRACTIONS_PATH}", self.host),
        }
    }

    /// Canonical status URL for a job identifier
    ///
    /// Extraction and update identifiers are caller-visible short ids, so the
    /// full resource id is rebuilt from the account key. Explain and analytics
    /// jobs live directly under their collection.
    pub fn resource_url_for(&self, kind: JobKind, identifier: &str, api_key: &str) -> String {
        match kind {
            JobKind::Extraction | JobKind::Update => format!(
                "{}{SNAPSHOTS_PATH}/{EXTRACTION_ID_PREFIX}-{api_key}-{identifier}",
                self.host
            ),
            JobKind::Explain | JobKind::Analytics => {
                format!("{}/{identifier}", self.endpoint_for(kind))
            }
        }
    }

    /// Submission URL for an update of an existing snapshot
    pub fn update_submission_url(
        &self,
        api_key: &str,
        snapshot_id: &str,
        update_type: UpdateType,
    ) -> String {
        format!(
            "{}/{EXTRACTION_ID_PREFIX}-{api_key}-{snapshot_id}/{}",
            self.endpoint_for(JobKind::Update),
            update_type.as_str()
        )
    }

    /// Streams collection (query-backed stream creation)
    pub fn streams(&self) -> String {
        format!("{}{STREAMS_PATH}", self.host)
    }

    /// A single stream
    pub fn stream(&self, stream_id: &str) -> String {
        format!("{}/{stream_id}", self.streams())
    }

    /// Snapshot-backed stream creation
    pub fn snapshot_streams(&self, snapshot_id: &str) -> String {
        format!("{}{SNAPSHOTS_PATH}/{snapshot_id}/streams", self.host)
    }

    /// Subscriptions of a stream
    pub fn subscriptions(&self, stream_id: &str) -> String {
        format!("{}/subscriptions", self.stream(stream_id))
    }

    /// A single subscription of a stream
    pub fn subscription(&self, stream_id: &str, subscription_id: &str) -> String {
        format!("{}/{subscription_id}", self.subscriptions(stream_id))
    }

    /// Account details (extraction limits)
    pub fn account(&self, account_key: &str) -> String {
        format!("{}{ACCOUNTS_PATH}/{account_key}", self.host)
    }
}
