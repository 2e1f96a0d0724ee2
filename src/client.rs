//! Entry point tying configuration, transport and credentials together

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthContext;
use crate::config::Config;
use crate::error::Result;
use crate::jobs::{Job, UpdateRequest};

/// Platform client
///
/// Builds jobs and streams bound to one set of credentials and drives their
/// lifecycles. Cloning is cheap and clones share the HTTP connection pool.
#[derive(Clone, Debug)]
pub struct Client {
    pub(crate) api: ApiClient,
    pub(crate) config: Arc<Config>,
}

impl Client {
    /// Create a client from configuration and credentials
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: Config, auth: AuthContext) -> Result<Self> {
        let api = ApiClient::new(&config.api, auth)?;
        tracing::debug!(host = %api.endpoints().host(), "client created");
        Ok(Self {
            api,
            config: Arc::new(config),
        })
    }

    /// Create a client with default configuration
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(Config::default(), AuthContext::api_key(api_key)?)
    }

    /// HTTP transport used for platform requests
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Credentials jobs and streams are created with
    pub fn auth(&self) -> &AuthContext {
        self.api.auth()
    }

    /// New explain job
    pub fn explain_job(&self) -> Job {
        Job::explain(self.auth().clone())
    }

    /// New analytics job
    pub fn analytics_job(&self) -> Job {
        Job::analytics(self.auth().clone())
    }

    /// New extraction job
    pub fn extraction_job(&self) -> Job {
        Job::extraction(self.auth().clone())
    }

    /// New or rebuilt update job
    ///
    /// # Errors
    /// [`Error::Construction`](crate::Error::Construction) when the request
    /// mixes or omits identity forms.
    pub fn update_job(&self, request: UpdateRequest) -> Result<Job> {
        let target = request.resolve()?;
        Ok(Job::update(
            target,
            self.auth().clone(),
            self.api.endpoints(),
        ))
    }
}
