//! Shared test helpers for building clients against a mock platform.

use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

use crate::auth::AuthContext;
use crate::config::Config;
use crate::Client;

/// API key used by every test client
pub(crate) const TEST_KEY: &str = "TESTKEY";

/// Messaging project used by every test client
pub(crate) const TEST_PROJECT: &str = "test-project";

/// Config pointing at the mock server, with millisecond timings
pub(crate) fn test_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.api.host = server.uri();
    config.jobs.poll_interval = Duration::from_millis(10);
    config.jobs.download_dir = temp_dir.path().join("downloads");
    config.streaming.project_id = Some(TEST_PROJECT.to_string());
    config.streaming.pubsub_endpoint = server.uri();
    config.streaming.transport_retry_delay = Duration::from_millis(10);
    config.streaming.quota_check_interval = Duration::from_millis(20);
    config.streaming.idle_pull_delay = Duration::from_millis(5);
    config
}

/// Client bound to the mock server. Keep the tempdir alive for the test's duration.
pub(crate) fn test_client(server: &MockServer) -> (Client, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(server, &temp_dir);
    let client = Client::new(config, AuthContext::api_key(TEST_KEY).unwrap()).unwrap();
    (client, temp_dir)
}
