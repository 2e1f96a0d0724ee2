//! # factiva-news
//!
//! Async client library for Factiva snapshot jobs and news streams.
//!
//! ## What it covers
//!
//! - **Snapshot jobs** - explain, analytics, extraction and update jobs share
//!   one lifecycle: submit, poll, wait, and download result files
//! - **Streams** - create or reopen a stream, manage its subscriptions, and
//!   consume messages in pull or push mode with per-message acknowledgement
//! - **Quota watchdog** - every consumption checks the account's extraction
//!   limit in the background and reports it when exceeded
//!
//! ## Quick Start
//!
//! ```no_run
//! use factiva_news::{Client, WhereClause};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::with_api_key("0123456789abcdef0123456789abcdef")?;
//!
//!     let mut snapshot = client.snapshot(WhereClause::new(
//!         "publication_datetime >= '2021-01-01 00:00:00' AND LOWER(language_code) = 'en'",
//!     ));
//!     let volume = snapshot.process_explain().await?;
//!     println!("{volume} matching documents");
//!
//!     let files = snapshot.process_extraction(None).await?;
//!     println!("downloaded {} files", files.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Consuming a stream
//!
//! ```no_run
//! use std::sync::Arc;
//! use factiva_news::{Client, ConsumeMode, LoggingHandler, PullOptions, RestPubSubConnector};
//!
//! # async fn run(client: Client) -> factiva_news::Result<()> {
//! let connector = RestPubSubConnector::new(&client.config().streaming, None)?;
//! let stream = client
//!     .open_stream("dj-synhub-stream-0123-abcd")
//!     .await?
//!     .with_connector(Arc::new(connector));
//!
//! for id in stream.subscription_ids() {
//!     let summary = stream
//!         .consume(id, Arc::new(LoggingHandler), ConsumeMode::Pull(PullOptions::new(100)))
//!         .await?
//!         .into_summary();
//!     println!("{id}: {summary:?}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP transport for platform requests
pub mod api;
/// Credentials and request headers
pub mod auth;
mod client;
/// Configuration types
pub mod config;
/// Endpoint resolution
pub mod endpoints;
/// Error types
pub mod error;
/// Snapshot jobs: state machine, lifecycle and file retrieval
pub mod jobs;
/// Retry classification for transport errors
pub mod retry;
/// Snapshot queries and the snapshot facade
pub mod snapshot;
/// Streams, subscriptions and message consumption
pub mod stream;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use auth::AuthContext;
pub use client::Client;
pub use config::{ApiConfig, Config, JobConfig, StreamingConfig};
pub use error::{ChannelError, Error, Result};
pub use jobs::{Job, UpdateRequest, UpdateTarget};
pub use snapshot::{Snapshot, SnapshotQuery, WhereClause};
pub use stream::{
    ChannelConnector, ConsumeMode, Consumption, ConsumptionEngine, LoggingHandler,
    MessageChannel, MessageHandler, NewsMessage, PullOptions, PullSummary, PushHandle,
    QuotaReport, RestPubSubConnector, Stream, StreamInfo, StreamSource, Subscription,
};
pub use types::{AnalyticsTable, FileSet, JobKind, JobResult, JobStatus, UpdateType};

/// Run push consumption until the process is asked to stop.
///
/// Waits for a termination signal, then stops the push handle and returns
/// the final quota report.
///
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use factiva_news::{Client, ConsumeMode, LoggingHandler, RestPubSubConnector, consume_until_shutdown};
///
/// # async fn run(client: Client) -> factiva_news::Result<()> {
/// let connector = Arc::new(RestPubSubConnector::new(&client.config().streaming, None)?);
/// let engine = client.subscription_engine("dj-synhub-stream-0123-abcd-filtered-x1y2", connector)?;
/// if let Some(handle) = engine
///     .consume(Arc::new(LoggingHandler), ConsumeMode::Push)
///     .await?
///     .into_push_handle()
/// {
///     let report = consume_until_shutdown(handle).await?;
///     println!("limit exceeded: {}", report.exceeded());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn consume_until_shutdown(handle: PushHandle) -> Result<QuotaReport> {
    wait_for_signal().await;
    tracing::info!(subscription_id = %handle.subscription_id(), "stopping push consumption");
    handle.stop().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments; fall back to ctrl_c
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
