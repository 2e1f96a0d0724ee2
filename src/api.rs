//! Thin HTTP transport for the platform API
//!
//! Every platform call goes through [`ApiClient::send`], which attaches the
//! authentication headers and hands back the status code and raw body. Status
//! interpretation is left to the caller, because each operation accepts a
//! different success code.

use reqwest::Method;
use serde_json::Value;

use crate::auth::AuthContext;
use crate::config::ApiConfig;
use crate::endpoints::Endpoints;
use crate::error::{Error, Result};

/// Status code and raw body of a platform response
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl ApiResponse {
    /// Parse the body as JSON
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Authenticated HTTP client bound to one platform host
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    auth: AuthContext,
}

impl ApiClient {
    /// Create a client for the configured host
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &ApiConfig, auth: AuthContext) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            endpoints: Endpoints::new(config.host.clone()),
            auth,
        })
    }

    /// URL resolver for this client's host
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Authentication handle used for every request
    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Same connection pool and host, different credentials
    pub fn with_auth(&self, auth: AuthContext) -> Self {
        Self {
            http: self.http.clone(),
            endpoints: self.endpoints.clone(),
            auth,
        }
    }

    /// Underlying HTTP client (shared with file downloads)
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send a request and return the status and body without interpreting them
    pub async fn send(&self, method: Method, url: &str, payload: Option<&Value>) -> Result<ApiResponse> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .headers(self.auth.headers()?);

        if let Some(payload) = payload {
            request = request.json(payload);
        } else if method == Method::POST {
            request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(method = %method, url = %url, status, "API request completed");
        Ok(ApiResponse { status, body })
    }

    /// GET a resource
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::GET, url, None).await
    }

    /// POST to a resource, optionally with a JSON body
    pub async fn post(&self, url: &str, payload: Option<&Value>) -> Result<ApiResponse> {
        self.send(Method::POST, url, payload).await
    }

    /// DELETE a resource
    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, url, None).await
    }
}

/// Read a string at a JSON pointer, failing with the pointer name when absent
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::missing_field(pointer))
}

/// Read any value at a JSON pointer, failing with the pointer name when absent
pub(crate) fn value_at<'a>(value: &'a Value, pointer: &str) -> Result<&'a Value> {
    value
        .pointer(pointer)
        .ok_or_else(|| Error::missing_field(pointer))
}
