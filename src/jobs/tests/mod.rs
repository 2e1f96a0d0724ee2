use super::*;
use crate::test_helpers::{TEST_KEY, test_client};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod construction;
mod lifecycle;

/// Status body in the platform's JSON:API envelope
fn status_body(state: &str, attributes: serde_json::Value) -> serde_json::Value {
    let mut attributes = attributes;
    attributes["current_state"] = json!(state);
    json!({"data": {"id": "job", "type": "job", "attributes": attributes}})
}
