//! Stream message envelope and handler trait

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// One news document delivered on a stream subscription
#[derive(Clone, Debug, PartialEq)]
pub struct NewsMessage {
    /// Document id (`an`-style accession number)
    pub id: String,
    /// Document payload (title, body, source, dates, action, ...)
    pub attributes: Value,
}

#[derive(Deserialize)]
struct Envelope {
    data: Vec<EnvelopeItem>,
}

#[derive(Deserialize)]
struct EnvelopeItem {
    id: String,
    attributes: Value,
}

impl NewsMessage {
    /// Decode a channel payload (`{"data": [{"id": ..., "attributes": {...}}]}`)
    ///
    /// Only the first element of `data` is used.
    pub fn from_envelope(data: &[u8]) -> Result<Self> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| Error::MalformedMessage(e.to_string()))?;
        let item = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedMessage("envelope `data` is empty".into()))?;
        Ok(Self {
            id: item.id,
            attributes: item.attributes,
        })
    }

    /// Top-level string attribute, if present
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Document action (`add`, `rep`, `del`)
    pub fn action(&self) -> Option<&str> {
        self.attribute_str("action")
    }
}

/// Caller-supplied processing for stream messages
///
/// Returning `false` asks pull-mode consumption to stop after the current
/// message has been acknowledged. Push mode ignores the return value.
///
/// Any `Fn(&NewsMessage, &str) -> bool` closure is a handler.
pub trait MessageHandler: Send + Sync {
    /// Process one message received on `subscription_id`
    fn handle(&self, message: &NewsMessage, subscription_id: &str) -> bool;
}

impl<F> MessageHandler for F
where
    F: Fn(&NewsMessage, &str) -> bool + Send + Sync,
{
    fn handle(&self, message: &NewsMessage, subscription_id: &str) -> bool {
        self(message, subscription_id)
    }
}

/// Handler that logs every message and keeps consuming
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn handle(&self, message: &NewsMessage, subscription_id: &str) -> bool {
        tracing::info!(
            subscription_id,
            id = %message.id,
            action = message.action().unwrap_or("unknown"),
            title = message.attribute_str("title").unwrap_or_default(),
            "stream message"
        );
        true
    }
}
