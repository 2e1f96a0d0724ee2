//! Platform and Pub/Sub response bodies

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::{TEST_KEY, TEST_PROJECT};

/// Full extraction resource id for a short snapshot id
pub fn extraction_resource(snapshot_id: &str) -> String {
    format!("dj-synhub-extraction-{TEST_KEY}-{snapshot_id}")
}

/// Job status body; `attributes` are merged next to the state
pub fn job_status(state: &str, attributes: Value) -> Value {
    let mut attrs = json!({ "current_state": state });
    if let (Some(target), Some(extra)) = (attrs.as_object_mut(), attributes.as_object()) {
        target.extend(extra.clone());
    }
    json!({ "data": { "attributes": attrs } })
}

/// Stream body listing the given subscriptions
pub fn stream_body(stream_id: &str, job_status: &str, subscriptions: &[&str]) -> Value {
    let subscriptions: Vec<Value> = subscriptions
        .iter()
        .map(|id| json!({ "id": id, "type": "subscription" }))
        .collect();
    json!({ "data": {
        "id": stream_id,
        "type": "stream",
        "attributes": { "job_status": job_status },
        "relationships": { "subscriptions": { "data": subscriptions } }
    }})
}

/// Pub/Sub REST path for an action on a subscription
pub fn pubsub_path(subscription_id: &str, action: &str) -> String {
    format!("/v1/projects/{TEST_PROJECT}/subscriptions/{subscription_id}:{action}")
}

/// Pub/Sub pull response carrying one news document per id
pub fn pull_response(document_ids: &[&str]) -> Value {
    let received: Vec<Value> = document_ids
        .iter()
        .map(|id| {
            let envelope = json!({ "data": [{
                "id": id,
                "type": "article",
                "attributes": { "an": id, "action": "add", "title": format!("Story {id}") }
            }]});
            json!({
                "ackId": format!("ack-{id}"),
                "message": { "data": STANDARD.encode(envelope.to_string()), "messageId": id }
            })
        })
        .collect();
    json!({ "receivedMessages": received })
}
