//! Client construction for mock and live platform tests

use factiva_news::{AuthContext, Client, Config};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// API key used against the mock platform
pub const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

/// Messaging project used against the mock Pub/Sub endpoint
pub const TEST_PROJECT: &str = "factiva-test";

/// Config that sends platform and Pub/Sub traffic to `server`, with millisecond timings
pub fn mock_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.api.host = server.uri();
    config.jobs.poll_interval = Duration::from_millis(10);
    config.jobs.download_dir = temp_dir.path().to_path_buf();
    config.streaming.project_id = Some(TEST_PROJECT.to_string());
    config.streaming.pubsub_endpoint = server.uri();
    config.streaming.transport_retry_delay = Duration::from_millis(10);
    config.streaming.quota_check_interval = Duration::from_millis(25);
    config.streaming.idle_pull_delay = Duration::from_millis(5);
    config
}

/// Client bound to the mock server. Keep the tempdir alive for the test's duration.
pub fn mock_client(server: &MockServer) -> (Client, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = mock_config(server, &temp_dir);
    let client = Client::new(config, AuthContext::api_key(TEST_KEY).unwrap()).unwrap();
    (client, temp_dir)
}

/// Check whether live platform credentials are available
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var("FACTIVA_USERKEY").is_ok()
}

/// Client for the real platform, configured from `.env`
///
/// - `FACTIVA_USERKEY` - account API key (required)
/// - `FACTIVA_HOST` - platform host (optional)
pub fn live_client() -> (Client, TempDir) {
    dotenvy::dotenv().ok();
    let key = std::env::var("FACTIVA_USERKEY").unwrap();
    let temp_dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    if let Ok(host) = std::env::var("FACTIVA_HOST") {
        config.api.host = host;
    }
    config.jobs.download_dir = temp_dir.path().to_path_buf();
    let client = Client::new(config, AuthContext::api_key(key).unwrap()).unwrap();
    (client, temp_dir)
}

/// Skip test if credentials are not available
#[macro_export]
macro_rules! skip_if_no_credentials {
    () => {
        if !$crate::common::has_live_credentials() {
            eprintln!("Skipping test: FACTIVA_USERKEY not found in .env");
            return;
        }
    };
}
