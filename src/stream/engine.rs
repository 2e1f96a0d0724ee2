//! Stream consumption engine
//!
//! One engine per subscription. It runs either a pull loop on the caller's
//! task or a push registration on the channel's own scheduling, and in both
//! modes starts a [`QuotaWatchdog`] beside it. The pump and the watchdog share
//! only a [`CancellationToken`]: the pump cancels it when pull consumption
//! ends, [`PushHandle::stop`] cancels it for push consumption.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::channel::{
    ChannelConnector, MessageChannel, MessageDispatch, PushSubscription, ReceivedMessage,
    subscription_path,
};
use super::message::{MessageHandler, NewsMessage};
use super::watchdog::{QuotaReport, QuotaWatchdog};
use crate::api::ApiClient;
use crate::config::StreamingConfig;
use crate::error::{ChannelError, Error, Result};
use crate::retry::IsRetryable;

/// Pull-mode limits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Stop after this many messages have been handled and acknowledged (required)
    pub maximum_messages: Option<usize>,
    /// Messages requested per pull (default: `streaming.default_batch_size`)
    pub batch_size: Option<usize>,
}

impl PullOptions {
    /// Consume at most `maximum_messages` messages
    pub fn new(maximum_messages: usize) -> Self {
        Self {
            maximum_messages: Some(maximum_messages),
            batch_size: None,
        }
    }

    /// Request `batch_size` messages per pull
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Consumption strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeMode {
    /// Bounded pull loop on the calling task
    Pull(PullOptions),
    /// Registration with the channel's own dispatcher
    Push,
}

/// Result of a finished pull consumption
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PullSummary {
    /// Messages handled and acknowledged
    pub received: usize,
    /// Whether the handler asked to stop before the cap was reached
    pub stopped_by_handler: bool,
    /// Final quota watchdog report
    pub quota: QuotaReport,
}

/// What [`ConsumptionEngine::consume`] hands back
#[derive(Debug)]
pub enum Consumption {
    /// Pull mode ran to completion
    Pulled(PullSummary),
    /// Push mode is registered and running
    Pushing(PushHandle),
}

impl Consumption {
    /// Pull summary, for pull mode
    pub fn into_summary(self) -> Option<PullSummary> {
        match self {
            Consumption::Pulled(summary) => Some(summary),
            Consumption::Pushing(_) => None,
        }
    }

    /// Push handle, for push mode
    pub fn into_push_handle(self) -> Option<PushHandle> {
        match self {
            Consumption::Pushing(handle) => Some(handle),
            Consumption::Pulled(_) => None,
        }
    }
}

/// Marks an engine as consuming until dropped
#[derive(Debug)]
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Running push consumption
///
/// Dropping the handle leaves delivery and the watchdog running until the
/// process exits; call [`PushHandle::stop`] to end both.
#[derive(Debug)]
pub struct PushHandle {
    subscription_id: String,
    push: PushSubscription,
    cancel: CancellationToken,
    watchdog: JoinHandle<Result<QuotaReport>>,
    _active: ActiveGuard,
}

impl PushHandle {
    /// Subscription being consumed
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Whether the quota watchdog has exited (only on a fatal error)
    pub fn watchdog_finished(&self) -> bool {
        self.watchdog.is_finished()
    }

    /// Stop delivery and the watchdog, returning the final quota report
    pub async fn stop(self) -> Result<QuotaReport> {
        let PushHandle {
            subscription_id,
            push,
            cancel,
            watchdog,
            _active,
        } = self;
        push.shutdown().await?;
        cancel.cancel();
        let report = join_watchdog(watchdog).await;
        info!(subscription_id = %subscription_id, "push consumption stopped");
        report
    }
}

/// Message pump bound to one subscription
pub struct ConsumptionEngine {
    subscription_id: String,
    stream_id: String,
    api: ApiClient,
    connector: Arc<dyn ChannelConnector>,
    settings: StreamingConfig,
    active: Arc<AtomicBool>,
}

impl std::fmt::Debug for ConsumptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumptionEngine")
            .field("subscription_id", &self.subscription_id)
            .field("stream_id", &self.stream_id)
            .field("project_id", &self.connector.project_id())
            .field("consuming", &self.is_consuming())
            .finish()
    }
}

impl ConsumptionEngine {
    pub(crate) fn new(
        subscription_id: String,
        stream_id: String,
        api: ApiClient,
        connector: Arc<dyn ChannelConnector>,
        settings: StreamingConfig,
    ) -> Self {
        Self {
            subscription_id,
            stream_id,
            api,
            connector,
            settings,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscription this engine consumes
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Stream whose status the watchdog checks
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Whether a consumption is currently running
    pub fn is_consuming(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Consume messages with `handler` using the given strategy
    ///
    /// Pull mode returns once `maximum_messages` messages are handled, the
    /// handler returns `false`, or a fatal error occurs. Push mode returns as
    /// soon as registration completes.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] before any network call when pull mode has
    ///   no (or a zero) message cap, or when this engine is already consuming
    /// - [`Error::Channel`] with [`ChannelError::NotFound`] when the
    ///   subscription no longer exists
    /// - [`Error::MalformedMessage`] when a pulled message cannot be decoded
    /// - the watchdog's error when it stopped on an unexpected response
    pub async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        mode: ConsumeMode,
    ) -> Result<Consumption> {
        match mode {
            ConsumeMode::Pull(options) => self
                .consume_pull(handler.as_ref(), options)
                .await
                .map(Consumption::Pulled),
            ConsumeMode::Push => self.consume_push(handler).await.map(Consumption::Pushing),
        }
    }

    fn claim(&self) -> Result<ActiveGuard> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                Error::InvalidArgument(format!(
                    "subscription {} is already being consumed",
                    self.subscription_id
                ))
            })?;
        Ok(ActiveGuard(self.active.clone()))
    }

    fn start_watchdog(&self, cancel: CancellationToken) -> JoinHandle<Result<QuotaReport>> {
        QuotaWatchdog::new(
            self.api.clone(),
            self.stream_id.clone(),
            self.settings.quota_check_interval,
        )
        .spawn(cancel)
    }

    async fn consume_pull(
        &self,
        handler: &dyn MessageHandler,
        options: PullOptions,
    ) -> Result<PullSummary> {
        let maximum = options
            .maximum_messages
            .filter(|max| *max > 0)
            .ok_or_else(|| {
                Error::InvalidArgument("maximum_messages is required for pull consumption".into())
            })?;
        let batch_size = options
            .batch_size
            .unwrap_or(self.settings.default_batch_size);
        if batch_size == 0 {
            return Err(Error::InvalidArgument("batch_size must be at least 1".into()));
        }

        let _active = self.claim()?;
        let mut channel = self.connector.connect().await?;
        let path = subscription_path(self.connector.project_id(), &self.subscription_id);

        let cancel = CancellationToken::new();
        let watchdog = self.start_watchdog(cancel.clone());
        info!(
            subscription_id = %self.subscription_id,
            maximum,
            batch_size,
            "pull consumption started, awaiting messages"
        );

        let pumped = self
            .pump(&mut channel, &path, handler, maximum, batch_size, &watchdog)
            .await;
        cancel.cancel();
        let quota = join_watchdog(watchdog).await;

        let (received, stopped_by_handler) = pumped?;
        let quota = quota?;
        info!(
            subscription_id = %self.subscription_id,
            received,
            stopped_by_handler,
            "pull consumption finished"
        );
        Ok(PullSummary {
            received,
            stopped_by_handler,
            quota,
        })
    }

    /// Pull, handle and acknowledge until the cap, a handler stop, or a fatal error
    async fn pump(
        &self,
        channel: &mut Arc<dyn MessageChannel>,
        path: &str,
        handler: &dyn MessageHandler,
        maximum: usize,
        batch_size: usize,
        watchdog: &JoinHandle<Result<QuotaReport>>,
    ) -> Result<(usize, bool)> {
        let mut received = 0usize;

        'pull: while received < maximum {
            if watchdog.is_finished() {
                warn!(subscription_id = %self.subscription_id, "quota watchdog exited, stopping pull");
                break;
            }

            let wanted = batch_size.min(maximum - received);
            let messages = match channel.pull(path, wanted).await {
                Ok(messages) => messages,
                Err(e) => {
                    self.recover(e, channel).await?;
                    continue;
                }
            };
            if messages.is_empty() {
                tokio::time::sleep(self.settings.idle_pull_delay).await;
                continue;
            }

            if messages.len() > wanted {
                debug!(
                    subscription_id = %self.subscription_id,
                    requested = wanted,
                    returned = messages.len(),
                    "channel returned extra messages, leaving them for redelivery"
                );
            }

            for message in messages.into_iter().take(wanted) {
                let news = NewsMessage::from_envelope(&message.data)?;
                info!(
                    subscription_id = %self.subscription_id,
                    id = %news.id,
                    "received news message"
                );
                let keep_going = handler.handle(&news, &self.subscription_id);

                // Unacknowledged messages are redelivered by the channel
                if let Err(e) = channel
                    .acknowledge(path, std::slice::from_ref(&message.ack_id))
                    .await
                {
                    self.recover(e, channel).await?;
                    if !keep_going {
                        return Ok((received, true));
                    }
                    continue 'pull;
                }
                received += 1;

                if !keep_going {
                    return Ok((received, true));
                }
            }
        }

        Ok((received, false))
    }

    /// Pause and reconnect after a transient error; propagate anything else
    async fn recover(&self, e: ChannelError, channel: &mut Arc<dyn MessageChannel>) -> Result<()> {
        if !e.is_retryable() {
            error!(subscription_id = %self.subscription_id, error = %e, "subscription unavailable");
            return Err(e.into());
        }

        warn!(
            subscription_id = %self.subscription_id,
            error = %e,
            pause_ms = self.settings.transport_retry_delay.as_millis() as u64,
            "problem pulling from stream, pausing before retry"
        );
        tokio::time::sleep(self.settings.transport_retry_delay).await;

        match self.connector.connect().await {
            Ok(fresh) => *channel = fresh,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "reconnect failed, reusing previous channel handle");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn consume_push(&self, handler: Arc<dyn MessageHandler>) -> Result<PushHandle> {
        let active = self.claim()?;
        let channel = self.connector.connect().await?;
        let path = subscription_path(self.connector.project_id(), &self.subscription_id);

        let dispatch = Arc::new(HandlerDispatch {
            subscription_id: self.subscription_id.clone(),
            path: path.clone(),
            channel: channel.clone(),
            handler,
        });
        let push = channel.subscribe(&path, dispatch).await?;

        let cancel = CancellationToken::new();
        let watchdog = self.start_watchdog(cancel.clone());
        info!(subscription_id = %self.subscription_id, "push consumption registered");

        Ok(PushHandle {
            subscription_id: self.subscription_id.clone(),
            push,
            cancel,
            watchdog,
            _active: active,
        })
    }
}

/// Push-mode dispatcher: decode, handle, acknowledge
struct HandlerDispatch {
    subscription_id: String,
    path: String,
    channel: Arc<dyn MessageChannel>,
    handler: Arc<dyn MessageHandler>,
}

#[async_trait]
impl MessageDispatch for HandlerDispatch {
    async fn dispatch(&self, message: ReceivedMessage) {
        let news = match NewsMessage::from_envelope(&message.data) {
            Ok(news) => news,
            Err(e) => {
                warn!(
                    subscription_id = %self.subscription_id,
                    ack_id = %message.ack_id,
                    error = %e,
                    "skipping undecodable message"
                );
                return;
            }
        };
        info!(subscription_id = %self.subscription_id, id = %news.id, "received news message");
        self.handler.handle(&news, &self.subscription_id);

        if let Err(e) = self
            .channel
            .acknowledge(&self.path, std::slice::from_ref(&message.ack_id))
            .await
        {
            warn!(
                subscription_id = %self.subscription_id,
                id = %news.id,
                error = %e,
                "acknowledge failed, message will be redelivered"
            );
        }
    }
}

async fn join_watchdog(watchdog: JoinHandle<Result<QuotaReport>>) -> Result<QuotaReport> {
    watchdog
        .await
        .map_err(|e| Error::Task(format!("quota watchdog panicked: {e}")))?
}
