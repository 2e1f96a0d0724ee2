//! Messaging channel abstraction
//!
//! Stream subscriptions are delivered over an external messaging service
//! (Google Pub/Sub). The consumption engine only talks to it through the
//! traits below, so the transport can be swapped for the REST adapter in
//! [`pubsub`](super::pubsub) or for an in-memory fake in tests.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ChannelError, Error, Result};

/// One message as delivered by the channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Token used to acknowledge this delivery
    pub ack_id: String,
    /// Raw message payload (a JSON envelope)
    pub data: Vec<u8>,
}

/// Pull / acknowledge / push access to a messaging service
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Pull up to `max_messages` messages without waiting for new ones
    async fn pull(
        &self,
        subscription_path: &str,
        max_messages: usize,
    ) -> std::result::Result<Vec<ReceivedMessage>, ChannelError>;

    /// Acknowledge delivered messages so they are not redelivered
    async fn acknowledge(
        &self,
        subscription_path: &str,
        ack_ids: &[String],
    ) -> std::result::Result<(), ChannelError>;

    /// Register a dispatcher that the channel invokes for every delivered message
    ///
    /// Returns once registration completes. Delivery then runs under the
    /// channel's own scheduling until the returned subscription is stopped.
    async fn subscribe(
        &self,
        subscription_path: &str,
        dispatch: Arc<dyn MessageDispatch>,
    ) -> std::result::Result<PushSubscription, ChannelError>;
}

/// Per-message callback registered in push mode
///
/// Each invocation handles and acknowledges exactly one message.
#[async_trait]
pub trait MessageDispatch: Send + Sync {
    /// Handle one delivered message
    async fn dispatch(&self, message: ReceivedMessage);
}

/// Factory for authenticated channel handles
///
/// The pull loop asks for a fresh handle after every transient transport
/// error.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Open a channel handle
    async fn connect(&self) -> std::result::Result<Arc<dyn MessageChannel>, ChannelError>;

    /// Messaging project that owns the subscriptions
    fn project_id(&self) -> &str;
}

/// Fully-qualified subscription name on the messaging service
pub fn subscription_path(project_id: &str, subscription_id: &str) -> String {
    format!("projects/{project_id}/subscriptions/{subscription_id}")
}

/// Handle on a running push registration
#[derive(Debug)]
pub struct PushSubscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PushSubscription {
    /// Wrap the dispatch task a channel spawned for a registration
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Whether the dispatch task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop dispatching and wait for the task to exit
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| Error::Task(format!("push dispatch task failed: {e}")))
    }
}
