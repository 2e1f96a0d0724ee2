//! Google Pub/Sub REST adapter for the messaging channel
//!
//! Talks to `{endpoint}/v1/{subscription}:pull` and `:acknowledge`. Push
//! mode is a channel-owned task that pulls and dispatches until stopped.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::channel::{
    ChannelConnector, MessageChannel, MessageDispatch, PushSubscription, ReceivedMessage,
};
use crate::config::StreamingConfig;
use crate::error::{ChannelError, Error, Result};
use crate::retry::{IsRetryable, classify_channel_status};

/// Connector producing REST channel handles for one messaging project
#[derive(Clone, Debug)]
pub struct RestPubSubConnector {
    channel: RestPubSubChannel,
    project_id: String,
}

impl RestPubSubConnector {
    /// Build a connector from the streaming settings
    ///
    /// `access_token` is the OAuth token for the messaging service, sent as a
    /// bearer token on every call.
    ///
    /// # Errors
    /// [`Error::Construction`] when no messaging project is configured.
    pub fn new(settings: &StreamingConfig, access_token: Option<String>) -> Result<Self> {
        let project_id = settings.project_id.clone().ok_or_else(|| {
            Error::Construction("streaming.project_id must be set to consume messages".into())
        })?;
        Ok(Self {
            channel: RestPubSubChannel {
                http: reqwest::Client::new(),
                endpoint: settings.pubsub_endpoint.trim_end_matches('/').to_string(),
                access_token,
                push_batch_size: settings.default_batch_size,
                idle_delay: settings.idle_pull_delay,
                retry_delay: settings.transport_retry_delay,
            },
            project_id,
        })
    }
}

#[async_trait]
impl ChannelConnector for RestPubSubConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn MessageChannel>, ChannelError> {
        Ok(Arc::new(self.channel.clone()))
    }

    fn project_id(&self) -> &str {
        &self.project_id
    }
}

/// Channel handle over the Pub/Sub REST API
///
/// Message payloads arrive base64-encoded and are decoded on pull. A payload
/// that is not valid base64 is handed on as its raw bytes, so the consumer
/// rejects it as a malformed message instead of the pull being retried.
#[derive(Clone)]
pub struct RestPubSubChannel {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
    push_batch_size: usize,
    idle_delay: Duration,
    retry_delay: Duration,
}

impl std::fmt::Debug for RestPubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestPubSubChannel")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    data: String,
}

impl RestPubSubChannel {
    async fn call(
        &self,
        subscription_path: &str,
        action: &str,
        body: Value,
    ) -> std::result::Result<String, ChannelError> {
        let url = format!("{}/v1/{subscription_path}:{action}", self.endpoint);
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChannelError::Transient(format!("{action} request failed: {e}")))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChannelError::Transient(format!("{action} body unreadable: {e}")))?;

        if !status.is_success() {
            return Err(classify_channel_status(status.as_u16(), &text));
        }
        Ok(text)
    }
}

#[async_trait]
impl MessageChannel for RestPubSubChannel {
    /// Pull up to `max_messages` without waiting for new ones
    ///
    /// Non-base64 payloads are returned raw; see [`RestPubSubChannel`].
    async fn pull(
        &self,
        subscription_path: &str,
        max_messages: usize,
    ) -> std::result::Result<Vec<ReceivedMessage>, ChannelError> {
        let body = json!({"maxMessages": max_messages, "returnImmediately": true});
        let text = self.call(subscription_path, "pull", body).await?;
        let response: PullResponse = if text.trim().is_empty() {
            PullResponse::default()
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ChannelError::Transient(format!("invalid pull response: {e}")))?
        };

        Ok(response
            .received_messages
            .into_iter()
            .map(|received| {
                let data = STANDARD.decode(&received.message.data).unwrap_or_else(|e| {
                    tracing::warn!(
                        ack_id = %received.ack_id,
                        error = %e,
                        "message data is not base64, passing it through raw"
                    );
                    received.message.data.clone().into_bytes()
                });
                ReceivedMessage {
                    ack_id: received.ack_id,
                    data,
                }
            })
            .collect())
    }

    async fn acknowledge(
        &self,
        subscription_path: &str,
        ack_ids: &[String],
    ) -> std::result::Result<(), ChannelError> {
        self.call(subscription_path, "acknowledge", json!({"ackIds": ack_ids}))
            .await
            .map(|_| ())
    }

    async fn subscribe(
        &self,
        subscription_path: &str,
        dispatch: Arc<dyn MessageDispatch>,
    ) -> std::result::Result<PushSubscription, ChannelError> {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let channel = self.clone();
        let path = subscription_path.to_string();

        let task = tokio::spawn(async move {
            loop {
                let pulled = tokio::select! {
                    _ = token.cancelled() => break,
                    pulled = channel.pull(&path, channel.push_batch_size) => pulled,
                };
                let pause = match pulled {
                    Ok(messages) if messages.is_empty() => channel.idle_delay,
                    Ok(messages) => {
                        for message in messages {
                            dispatch.dispatch(message).await;
                        }
                        continue;
                    }
                    Err(e) if e.is_retryable() => {
                        tracing::warn!(subscription = %path, error = %e, "push pull failed, retrying");
                        channel.retry_delay
                    }
                    Err(e) => {
                        tracing::error!(subscription = %path, error = %e, "push dispatch stopped");
                        break;
                    }
                };
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        });

        Ok(PushSubscription::new(cancel, task))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUB_PATH: &str = "projects/p1/subscriptions/sub-1";

    fn connector(server: &MockServer) -> RestPubSubConnector {
        let settings = StreamingConfig {
            project_id: Some("p1".into()),
            pubsub_endpoint: server.uri(),
            idle_pull_delay: Duration::from_millis(5),
            transport_retry_delay: Duration::from_millis(5),
            ..Default::default()
        };
        RestPubSubConnector::new(&settings, Some("tok".into())).unwrap()
    }

    fn encoded(payload: &str) -> String {
        STANDARD.encode(payload)
    }

    #[test]
    fn project_id_is_required() {
        let err = RestPubSubConnector::new(&StreamingConfig::default(), None).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[tokio::test]
    async fn pull_decodes_base64_payloads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:pull")))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"maxMessages": 4, "returnImmediately": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "receivedMessages": [
                    {"ackId": "a1", "message": {"data": encoded(r#"{"data":[]}"#), "messageId": "1"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = connector(&server).connect().await.unwrap();
        let messages = channel.pull(SUB_PATH, 4).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].ack_id, "a1");
        assert_eq!(messages[0].data, br#"{"data":[]}"#);
    }

    #[tokio::test]
    async fn non_base64_payload_is_passed_through_raw() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:pull")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "receivedMessages": [
                    {"ackId": "a1", "message": {"data": "not-base64!!"}}
                ]
            })))
            .mount(&server)
            .await;

        let channel = connector(&server).connect().await.unwrap();
        let messages = channel.pull(SUB_PATH, 1).await.unwrap();
        assert_eq!(messages[0].data, b"not-base64!!");
        assert!(matches!(
            crate::stream::NewsMessage::from_envelope(&messages[0].data),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn empty_pull_response_means_no_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:pull")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let channel = connector(&server).connect().await.unwrap();
        assert!(channel.pull(SUB_PATH, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_codes_map_to_channel_error_classes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:pull")))
            .respond_with(ResponseTemplate::new(404).set_body_string("Resource not found"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:acknowledge")))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let channel = connector(&server).connect().await.unwrap();
        assert!(matches!(
            channel.pull(SUB_PATH, 1).await,
            Err(ChannelError::NotFound(_))
        ));
        assert!(matches!(
            channel.acknowledge(SUB_PATH, &["a1".to_string()]).await,
            Err(ChannelError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn acknowledge_sends_ack_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1/{SUB_PATH}:acknowledge")))
            .and(body_json(json!({"ackIds": ["a1", "a2"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = connector(&server).connect().await.unwrap();
        channel
            .acknowledge(SUB_PATH, &["a1".to_string(), "a2".to_string()])
            .await
            .unwrap();
    }
}
