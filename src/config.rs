//! Configuration types for factiva-news

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for [`Client`](crate::Client)
///
/// Fields are organized into sub-configs:
/// - [`api`](ApiConfig) - platform host and HTTP client settings
/// - [`jobs`](JobConfig) - job polling and download locations
/// - [`streaming`](StreamingConfig) - message pump and quota watchdog timing
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Platform API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Snapshot job settings
    #[serde(default)]
    pub jobs: JobConfig,

    /// Stream consumption settings
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Platform API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host of the platform API (default: "https://api.dowjones.com")
    #[serde(default = "default_host")]
    pub host: String,

    /// Timeout applied to every platform request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Snapshot job settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Constant interval between status polls (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Root for job downloads when no path is given (default: ".")
    ///
    /// Files land in `<download_dir>/<job identifier>`.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            download_dir: default_download_dir(),
        }
    }
}

/// Stream consumption settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Messaging project that owns the stream subscriptions
    #[serde(default)]
    pub project_id: Option<String>,

    /// Base URL of the Pub/Sub REST service (default: "https://pubsub.googleapis.com")
    #[serde(default = "default_pubsub_endpoint")]
    pub pubsub_endpoint: String,

    /// Messages requested per pull (default: 10)
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Fixed pause before retrying after a transient transport error (default: 10 seconds)
    #[serde(default = "default_transport_retry_delay", with = "duration_serde")]
    pub transport_retry_delay: Duration,

    /// Interval between quota watchdog checks (default: 300 seconds)
    #[serde(default = "default_quota_check_interval", with = "duration_serde")]
    pub quota_check_interval: Duration,

    /// Pause after a pull that returned no messages (default: 1 second)
    #[serde(default = "default_idle_pull_delay", with = "duration_serde")]
    pub idle_pull_delay: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            pubsub_endpoint: default_pubsub_endpoint(),
            default_batch_size: default_batch_size(),
            transport_retry_delay: default_transport_retry_delay(),
            quota_check_interval: default_quota_check_interval(),
            idle_pull_delay: default_idle_pull_delay(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "https://api.dowjones.com".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("factiva-news/{}", env!("CARGO_PKG_VERSION"))
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_transport_retry_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_quota_check_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_idle_pull_delay() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
