//! Stream subscriptions

use std::fmt;
use std::sync::Arc;

use super::engine::{ConsumeMode, Consumption, ConsumptionEngine};
use super::message::MessageHandler;
use crate::api::{ApiClient, str_at};
use crate::error::{Error, Result};

/// One consumable channel binding within a stream
#[derive(Debug)]
pub struct Subscription {
    id: String,
    stream_id: String,
    subscription_type: Option<String>,
    engine: Option<ConsumptionEngine>,
}

impl Subscription {
    pub(crate) fn new(id: String, stream_id: String, subscription_type: Option<String>) -> Self {
        Self {
            id,
            stream_id,
            subscription_type,
            engine: None,
        }
    }

    /// Server-assigned subscription id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning stream id
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Server-assigned subscription category
    pub fn subscription_type(&self) -> Option<&str> {
        self.subscription_type.as_deref()
    }

    pub(crate) fn bind(&mut self, engine: ConsumptionEngine) {
        self.engine = Some(engine);
    }

    /// Consumption engine bound to this subscription
    ///
    /// # Errors
    /// [`Error::UninitializedListener`] when no messaging connector was
    /// available at the time the subscription was registered.
    pub fn engine(&self) -> Result<&ConsumptionEngine> {
        self.engine
            .as_ref()
            .ok_or_else(|| Error::UninitializedListener(self.id.clone()))
    }

    /// Consume this subscription's messages
    pub async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        mode: ConsumeMode,
    ) -> Result<Consumption> {
        self.engine()?.consume(handler, mode).await
    }

    /// Ask the platform for an additional subscription on `stream_id`
    pub(crate) async fn create(api: &ApiClient, stream_id: &str) -> Result<Self> {
        let response = api
            .post(&api.endpoints().subscriptions(stream_id), None)
            .await?;
        if response.status != 201 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
                body: response.body,
            });
        }
        let body = response.json()?;
        let id = str_at(&body, "/data/0/id")?.to_string();
        let subscription_type = body
            .pointer("/data/0/type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        tracing::info!(stream_id, subscription_id = %id, "subscription created");
        Ok(Self::new(id, stream_id.to_string(), subscription_type))
    }

    /// Delete this subscription on the platform
    pub(crate) async fn delete(&self, api: &ApiClient) -> Result<()> {
        let response = api
            .delete(&api.endpoints().subscription(&self.stream_id, &self.id))
            .await?;
        if response.status != 200 {
            return Err(Error::UnexpectedResponse {
                status: response.status,
                body: response.body,
            });
        }
        tracing::info!(stream_id = %self.stream_id, subscription_id = %self.id, "subscription deleted");
        Ok(())
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subscription(id={}, type={})",
            self.id,
            self.subscription_type.as_deref().unwrap_or("unknown")
        )
    }
}
