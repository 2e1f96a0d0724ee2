//! Transient failure classification
//!
//! The only local recovery in this crate is the pull loop's fixed-delay retry
//! on messaging transport errors. Everything that decides whether an error is
//! worth that retry goes through [`IsRetryable`].
//!
//! # Example
//!
//! ```
//! use factiva_news::error::ChannelError;
//! use factiva_news::retry::IsRetryable;
//!
//! assert!(ChannelError::Transient("deadline exceeded".into()).is_retryable());
//! assert!(!ChannelError::NotFound("subscription".into()).is_retryable());
//! ```

use crate::error::{ChannelError, Error};

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (unavailable, deadline exceeded, connection reset) return `true`.
/// Permanent failures (deleted subscription, bad request, malformed data) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ChannelError {
    fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Transient(_))
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Channel(e) => e.is_retryable(),
            // Platform API failures are surfaced to the caller, who decides to resubmit
            Error::Network(_)
            | Error::Submission { .. }
            | Error::Poll { .. }
            | Error::UnexpectedResponse { .. }
            | Error::JobFailed { .. } => false,
            // Caller and data errors never heal by waiting
            Error::Construction(_)
            | Error::InvalidArgument(_)
            | Error::MalformedResponse(_)
            | Error::MalformedMessage(_)
            | Error::UndefinedStreamId
            | Error::StreamNotFound(_)
            | Error::InvalidSubscription(_)
            | Error::SubscriptionCreation(_)
            | Error::UninitializedListener(_)
            | Error::Serialization(_) => false,
            Error::Download { .. } | Error::Io(_) | Error::Task(_) => false,
        }
    }
}

/// Map an HTTP status from the messaging service onto a [`ChannelError`]
///
/// 404 means the subscription is gone; every other failure is treated as
/// transient, matching the messaging client's own retry semantics.
pub(crate) fn classify_channel_status(status: u16, context: &str) -> ChannelError {
    if status == 404 {
        ChannelError::NotFound(context.to_string())
    } else {
        ChannelError::Transient(format!("HTTP {status}: {context}"))
    }
}
