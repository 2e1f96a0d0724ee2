use super::*;
use crate::error::ChannelError;
use crate::test_helpers::{TEST_PROJECT, test_client};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


const STREAM_ID: &str = "dj-synhub-stream-testkey-s1";
const SUB_ID: &str = "dj-synhub-stream-testkey-s1-filtered-abc";

/// One scripted answer to a pull
enum Step {
    Batch(Vec<ReceivedMessage>),
    /// Returned as is, ignoring the requested maximum
    Oversized(Vec<ReceivedMessage>),
    Fail(ChannelError),
}

#[derive(Default)]
struct ChannelState {
    script: Mutex<VecDeque<Step>>,
    ack_failures: Mutex<VecDeque<ChannelError>>,
    pulls: Mutex<Vec<usize>>,
    acked: Mutex<Vec<String>>,
}

/// In-memory channel replaying a script; an exhausted script yields empty pulls
#[derive(Clone, Default)]
struct MockChannel {
    state: Arc<ChannelState>,
}

impl MockChannel {
    fn scripted(steps: Vec<Step>) -> Self {
        let channel = Self::default();
        channel.state.script.lock().unwrap().extend(steps);
        channel
    }

    fn fail_next_ack(&self, error: ChannelError) {
        self.state.ack_failures.lock().unwrap().push_back(error);
    }

    fn pulls(&self) -> Vec<usize> {
        self.state.pulls.lock().unwrap().clone()
    }

    fn acked(&self) -> Vec<String> {
        self.state.acked.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageChannel for MockChannel {
    async fn pull(
        &self,
        _subscription_path: &str,
        max_messages: usize,
    ) -> std::result::Result<Vec<ReceivedMessage>, ChannelError> {
        self.state.pulls.lock().unwrap().push(max_messages);
        match self.state.script.lock().unwrap().pop_front() {
            Some(Step::Batch(mut batch)) => {
                batch.truncate(max_messages);
                Ok(batch)
            }
            Some(Step::Oversized(batch)) => Ok(batch),
            Some(Step::Fail(e)) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    async fn acknowledge(
        &self,
        _subscription_path: &str,
        ack_ids: &[String],
    ) -> std::result::Result<(), ChannelError> {
        if let Some(e) = self.state.ack_failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.state.acked.lock().unwrap().extend_from_slice(ack_ids);
        Ok(())
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
                    pulled = channel.pull(&path, 10) => pulled,
                };
                for message in pulled.unwrap_or_default() {
                    dispatch.dispatch(message).await;
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_millis(2)) => {}
                }
            }
        });
        Ok(PushSubscription::new(cancel, task))
    }
}

/// Connector handing out the same scripted channel and counting connects
struct MockConnector {
    channel: MockChannel,
    connects: AtomicUsize,
}

impl MockConnector {
    fn new(channel: MockChannel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            connects: AtomicUsize::new(0),
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn MessageChannel>, ChannelError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.channel.clone()))
    }

    fn project_id(&self) -> &str {
        TEST_PROJECT
    }
}

fn message(n: usize) -> ReceivedMessage {
    ReceivedMessage {
        ack_id: format!("ack-{n}"),
        data: json!({"data": [{
            "id": format!("doc-{n}"),
            "type": "article",
            "attributes": {"action": "add", "title": format!("Headline {n}")}
        }]})
        .to_string()
        .into_bytes(),
    }
}

fn batch(range: std::ops::Range<usize>) -> Step {
    Step::Batch(range.map(message).collect())
}

fn stream_body(job_status: &str) -> serde_json::Value {
    json!({"data": {
        "id": STREAM_ID,
        "type": "stream",
        "attributes": {"job_status": job_status},
        "relationships": {"subscriptions": {"data": [
            {"id": SUB_ID, "type": "subscription"}
        ]}}
    }})
}

/// Answer the watchdog's stream status checks
async fn mount_stream_status(server: &MockServer, job_status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/alpha/streams/{STREAM_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(stream_body(job_status)))
        .mount(server)
        .await;
}
