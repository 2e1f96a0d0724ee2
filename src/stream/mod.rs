//! Streams: subscription registry and message consumption
//!
//! A [`Stream`] is a server-side continuous feed seeded from a snapshot or a
//! query. It keeps a registry of its [`Subscription`]s, and every
//! subscription gets a [`ConsumptionEngine`] once a messaging
//! [`ChannelConnector`] is attached.

pub mod channel;
mod engine;
mod message;
pub mod pubsub;
mod subscription;
mod watchdog;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use channel::{ChannelConnector, MessageChannel, MessageDispatch, PushSubscription, ReceivedMessage};
pub use engine::{ConsumeMode, Consumption, ConsumptionEngine, PullOptions, PullSummary, PushHandle};
pub use message::{LoggingHandler, MessageHandler, NewsMessage};
pub use pubsub::{RestPubSubChannel, RestPubSubConnector};
pub use subscription::Subscription;
pub use watchdog::{DOC_COUNT_EXCEEDED, QuotaReport};

use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::Client;
use crate::api::{ApiClient, ApiResponse, str_at};
use crate::config::StreamingConfig;
use crate::error::{Error, Result};
use crate::snapshot::SnapshotQuery;
use crate::utils::{flatten_json, stream_id_from_subscription};

/// What a new stream is seeded from
#[derive(Clone, Debug, PartialEq)]
pub enum StreamSource {
    /// An existing snapshot
    Snapshot(String),
    /// A query object (`{"where": ...}` and friends)
    Query(Value),
}

impl StreamSource {
    /// Seed a stream from a query
    pub fn query(query: &impl SnapshotQuery) -> Self {
        StreamSource::Query(query.query())
    }
}

/// Stream state as reported by the platform
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    /// Stream id
    pub id: String,
    /// Resource type (normally "stream")
    pub stream_type: Option<String>,
    /// Stream job status (`JOB_STATE_RUNNING`, `DOC_COUNT_EXCEEDED`, ...)
    pub job_status: Option<String>,
    /// Raw `data` object
    pub data: Value,
}

impl StreamInfo {
    fn from_body(body: &Value) -> Result<Self> {
        let data = body
            .get("data")
            .ok_or_else(|| Error::missing_field("/data"))?
            .clone();
        Ok(Self {
            id: str_at(&data, "/id")?.to_string(),
            stream_type: data.get("type").and_then(Value::as_str).map(str::to_string),
            job_status: data
                .pointer("/attributes/job_status")
                .and_then(Value::as_str)
                .map(str::to_string),
            data,
        })
    }

    /// Dotted-key view of the raw data (`attributes.job_status`, ...)
    pub fn flattened(&self) -> BTreeMap<String, Value> {
        flatten_json(&self.data)
    }

    /// `(id, type)` of the subscriptions embedded in the stream
    fn subscription_refs(&self) -> Vec<(String, Option<String>)> {
        self.data
            .pointer("/relationships/subscriptions/data")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let id = entry.get("id")?.as_str()?.to_string();
                        let kind = entry.get("type").and_then(Value::as_str).map(str::to_string);
                        Some((id, kind))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A stream and its subscription registry
pub struct Stream {
    api: ApiClient,
    settings: StreamingConfig,
    stream_id: Option<String>,
    source: Option<StreamSource>,
    connector: Option<Arc<dyn ChannelConnector>>,
    subscriptions: HashMap<String, Subscription>,
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("stream_id", &self.stream_id)
            .field("source", &self.source)
            .field("connected", &self.connector.is_some())
            .field("subscriptions", &self.subscription_ids())
            .finish()
    }
}

impl Stream {
    fn new(client: &Client, stream_id: Option<String>, source: Option<StreamSource>) -> Self {
        Self {
            api: client.api.clone(),
            settings: client.config.streaming.clone(),
            stream_id,
            source,
            connector: None,
            subscriptions: HashMap::new(),
        }
    }

    /// Attach a messaging connector and bind an engine to every registered subscription
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn ChannelConnector>) -> Self {
        self.connector = Some(connector);
        let ids: Vec<String> = self.subscriptions.keys().cloned().collect();
        for id in ids {
            if let Some(mut subscription) = self.subscriptions.remove(&id) {
                self.bind(&mut subscription);
                self.subscriptions.insert(id, subscription);
            }
        }
        self
    }

    /// Stream id, once created or opened
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Seed of a stream built for creation
    pub fn source(&self) -> Option<&StreamSource> {
        self.source.as_ref()
    }

    /// Registered subscription ids, sorted
    pub fn subscription_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.subscriptions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Registered subscription by id
    pub fn subscription(&self, id: &str) -> Option<&Subscription> {
        self.subscriptions.get(id)
    }

    /// All registered subscriptions
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    fn bind(&self, subscription: &mut Subscription) {
        if let Some(connector) = &self.connector {
            subscription.bind(ConsumptionEngine::new(
                subscription.id().to_string(),
                subscription.stream_id().to_string(),
                self.api.clone(),
                connector.clone(),
                self.settings.clone(),
            ));
        }
    }

    fn register(&mut self, mut subscription: Subscription) {
        self.bind(&mut subscription);
        self.subscriptions
            .insert(subscription.id().to_string(), subscription);
    }

    fn register_embedded(&mut self, info: &StreamInfo) {
        for (id, kind) in info.subscription_refs() {
            if !self.subscriptions.contains_key(&id) {
                self.register(Subscription::new(id, info.id.clone(), kind));
            }
        }
    }

    fn require_stream_id(&self) -> Result<&str> {
        self.stream_id.as_deref().ok_or(Error::UndefinedStreamId)
    }

    /// Create the stream on the platform
    ///
    /// Records the new stream id and registers the subscriptions the platform
    /// created along with it.
    ///
    /// # Errors
    /// - [`Error::Construction`] when the stream has neither a snapshot id nor a query
    /// - [`Error::UnexpectedResponse`] for any status other than 201
    pub async fn create(&mut self) -> Result<StreamInfo> {
        let response = match &self.source {
            Some(StreamSource::Snapshot(snapshot_id)) => {
                self.api
                    .post(&self.api.endpoints().snapshot_streams(snapshot_id), None)
                    .await?
            }
            Some(StreamSource::Query(query)) => {
                let payload = json!({"data": {"attributes": query, "type": "stream"}});
                self.api
                    .post(&self.api.endpoints().streams(), Some(&payload))
                    .await?
            }
            None => {
                return Err(Error::Construction(
                    "a snapshot id or a query is required to create a stream".into(),
                ));
            }
        };
        if response.status != 201 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
                body: response.body,
            });
        }

        let info = StreamInfo::from_body(&response.json()?)?;
        self.stream_id = Some(info.id.clone());
        self.register_embedded(&info);
        tracing::info!(
            stream_id = %info.id,
            subscriptions = self.subscriptions.len(),
            "stream created"
        );
        Ok(info)
    }

    /// Fetch the stream's current state
    pub async fn get_info(&self) -> Result<StreamInfo> {
        let stream_id = self.require_stream_id()?;
        let response = self.api.get(&self.api.endpoints().stream(stream_id)).await?;
        stream_response(stream_id, response)
    }

    /// Delete the stream on the platform
    pub async fn delete(&self) -> Result<StreamInfo> {
        let stream_id = self.require_stream_id()?;
        let response = self
            .api
            .delete(&self.api.endpoints().stream(stream_id))
            .await?;
        let info = stream_response(stream_id, response)?;
        tracing::info!(stream_id, job_status = ?info.job_status, "stream deleted");
        Ok(info)
    }

    /// Register the subscriptions the platform lists for this stream
    ///
    /// Already-registered subscriptions are kept. Returns the registry size.
    pub async fn load_subscriptions(&mut self) -> Result<usize> {
        let info = self.get_info().await?;
        self.register_embedded(&info);
        Ok(self.subscriptions.len())
    }

    /// Add a subscription to the stream and register it
    ///
    /// # Errors
    /// Every failure is reported as [`Error::SubscriptionCreation`].
    pub async fn create_subscription(&mut self) -> Result<String> {
        let created = match self.require_stream_id() {
            Ok(stream_id) => Subscription::create(&self.api, stream_id).await,
            Err(e) => Err(e),
        };
        let subscription = created.map_err(|e| Error::SubscriptionCreation(e.to_string()))?;
        let id = subscription.id().to_string();
        self.register(subscription);
        Ok(id)
    }

    /// Delete a registered subscription
    ///
    /// The registry entry is removed only after the platform confirms.
    ///
    /// # Errors
    /// [`Error::InvalidSubscription`] when `id` is not registered.
    pub async fn delete_subscription(&mut self, id: &str) -> Result<()> {
        let subscription = self
            .subscriptions
            .get(id)
            .ok_or_else(|| Error::InvalidSubscription(id.to_string()))?;
        subscription.delete(&self.api).await?;
        self.subscriptions.remove(id);
        Ok(())
    }

    /// Consume a registered subscription
    ///
    /// # Errors
    /// [`Error::InvalidSubscription`] when `subscription_id` is not registered,
    /// plus everything [`ConsumptionEngine::consume`] reports.
    pub async fn consume(
        &self,
        subscription_id: &str,
        handler: Arc<dyn MessageHandler>,
        mode: ConsumeMode,
    ) -> Result<Consumption> {
        self.subscriptions
            .get(subscription_id)
            .ok_or_else(|| Error::InvalidSubscription(subscription_id.to_string()))?
            .consume(handler, mode)
            .await
    }
}

fn stream_response(stream_id: &str, response: ApiResponse) -> Result<StreamInfo> {
    match response.status {
        200 => StreamInfo::from_body(&response.json()?),
        404 => Err(Error::StreamNotFound(stream_id.to_string())),
        status => Err(Error::UnexpectedResponse {
            status,
            body: response.body,
        }),
    }
}

impl Client {
    /// Stream to be created from a snapshot or a query
    pub fn stream(&self, source: StreamSource) -> Stream {
        Stream::new(self, None, Some(source))
    }

    /// Open an existing stream and register its subscriptions
    pub async fn open_stream(&self, stream_id: &str) -> Result<Stream> {
        if stream_id.is_empty() {
            return Err(Error::UndefinedStreamId);
        }
        let mut stream = Stream::new(self, Some(stream_id.to_string()), None);
        stream.load_subscriptions().await?;
        Ok(stream)
    }

    /// Engine for a subscription known only by id
    ///
    /// The stream the watchdog checks is derived from the subscription id.
    pub fn subscription_engine(
        &self,
        subscription_id: &str,
        connector: Arc<dyn ChannelConnector>,
    ) -> Result<ConsumptionEngine> {
        let stream_id = stream_id_from_subscription(subscription_id);
        if stream_id.is_empty() {
            return Err(Error::Construction(format!(
                "cannot derive a stream id from subscription `{subscription_id}`"
            )));
        }
        Ok(ConsumptionEngine::new(
            subscription_id.to_string(),
            stream_id,
            self.api.clone(),
            connector,
            self.config.streaming.clone(),
        ))
    }
}
