//! Error types for factiva-news
//!
//! This module provides the error taxonomy for the library:
//! - Construction errors raised synchronously before any network call
//! - Platform response errors (submission, polling, unexpected status codes)
//! - Messaging transport errors, split into transient and not-found classes
//! - Wrappers for the underlying HTTP, JSON and I/O errors

use thiserror::Error;

/// Result type alias for factiva-news operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for factiva-news
///
/// Each variant carries the context needed to decide whether to resubmit,
/// retry or abort. Only [`Error::Channel`] with a transient cause is retried
/// by the library itself (inside the pull loop); everything else propagates.
#[derive(Debug, Error)]
pub enum Error {
    /// Conflicting or missing identifiers when building a job or stream
    #[error("construction error: {0}")]
    Construction(String),

    /// Caller supplied an invalid argument (e.g. pull mode without a message cap)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Job creation request did not return the creation status code
    #[error("job submission failed with HTTP {status}: {body}")]
    Submission {
        /// HTTP status code returned by the platform
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Job status request failed, or the job has no resource link yet
    #[error("job poll failed{}: {message}", .status.map(|s| format!(" with HTTP {s}")).unwrap_or_default())]
    Poll {
        /// Resource link that was polled, if any
        link: Option<String>,
        /// HTTP status code, if a request was made
        status: Option<u16>,
        /// Response body or a description of the failure
        message: String,
    },

    /// Job reached the failed terminal state
    #[error("job {identifier} failed: {errors}")]
    JobFailed {
        /// Job identifier
        identifier: String,
        /// Error details reported by the platform (JSON rendered as text)
        errors: String,
    },

    /// Platform returned a status code the operation does not accept
    #[error("unexpected HTTP {status} from API: {body}")]
    UnexpectedResponse {
        /// HTTP status code returned by the platform
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Response body is missing a field the operation depends on
    #[error("malformed API response: {0}")]
    MalformedResponse(String),

    /// Stream operation requires a stream id that has not been set
    #[error("stream id is undefined")]
    UndefinedStreamId,

    /// Stream does not exist on the platform
    #[error("stream {0} does not exist")]
    StreamNotFound(String),

    /// Subscription id is not registered on this stream
    #[error("invalid subscription id: {0}")]
    InvalidSubscription(String),

    /// Creating an additional subscription failed
    #[error("unable to create subscription: {0}")]
    SubscriptionCreation(String),

    /// Subscription has no consumption engine bound to it
    #[error("uninitialized listener for subscription {0}")]
    UninitializedListener(String),

    /// Stream message envelope could not be decoded
    #[error("malformed stream message: {0}")]
    MalformedMessage(String),

    /// Messaging channel error
    #[error("messaging channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A file download failed
    #[error("download of {uri} failed: {reason}")]
    Download {
        /// Remote file URI
        uri: String,
        /// Reason for the failure
        reason: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failed to complete
    #[error("background task error: {0}")]
    Task(String),
}

/// Messaging channel errors
///
/// The channel only distinguishes two classes: failures worth retrying after a
/// pause and a fresh channel handle, and a subscription that no longer exists.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// Recoverable transport failure (timeouts, unavailable, throttling, ...)
    #[error("transient transport error: {0}")]
    Transient(String),

    /// Subscription or resource was deleted server-side
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Build a [`Error::MalformedResponse`] for a missing JSON field
    pub(crate) fn missing_field(field: &str) -> Self {
        Error::MalformedResponse(format!("missing field `{field}`"))
    }
}
