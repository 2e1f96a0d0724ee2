//! Opaque authentication handle passed to jobs and streams

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::fmt;

use crate::error::{Error, Result};

/// Header carrying the account API key
const USER_KEY_HEADER: &str = "user-key";

/// Authentication context for platform requests
///
/// Either an account API key (sent as `user-key`) or an OAuth bearer token
/// tied to a client id. Jobs keep a clone of this handle and nothing else from
/// the client that created them.
#[derive(Clone)]
pub struct AuthContext {
    api_key: String,
    bearer: Option<Bearer>,
}

#[derive(Clone)]
struct Bearer {
    token: String,
    client_id: String,
}

impl AuthContext {
    /// Authenticate with an account API key
    pub fn api_key(key: impl Into<String>) -> Result<Self> {
        let api_key = key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Construction("API key must not be empty".into()));
        }
        Ok(Self {
            api_key,
            bearer: None,
        })
    }

    /// Authenticate with an OAuth bearer token
    ///
    /// `api_key` is still required because extraction resource URLs embed it.
    pub fn bearer(
        api_key: impl Into<String>,
        token: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Result<Self> {
        let mut ctx = Self::api_key(api_key)?;
        ctx.bearer = Some(Bearer {
            token: token.into(),
            client_id: client_id.into(),
        });
        Ok(ctx)
    }

    /// Account API key embedded in extraction resource URLs
    pub fn key(&self) -> &str {
        &self.api_key
    }

    /// Key used for account-level lookups (client id for bearer auth, API key otherwise)
    pub fn account_key(&self) -> &str {
        match &self.bearer {
            Some(bearer) => &bearer.client_id,
            None => &self.api_key,
        }
    }

    /// Build the authentication headers for a platform request
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        match &self.bearer {
            Some(bearer) => {
                let value = HeaderValue::from_str(&format!("Bearer {}", bearer.token))
                    .map_err(|e| Error::InvalidArgument(format!("invalid bearer token: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                let value = HeaderValue::from_str(&self.api_key)
                    .map_err(|e| Error::InvalidArgument(format!("invalid API key: {e}")))?;
                headers.insert(HeaderName::from_static(USER_KEY_HEADER), value);
            }
        }
        Ok(headers)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the last four characters of the key are ever printed
        let visible = self
            .api_key
            .char_indices()
            .rev()
            .nth(3)
            .map(|(i, _)| &self.api_key[i..])
            .unwrap_or("");
        f.debug_struct("AuthContext")
            .field("api_key", &format!("****{visible}"))
            .field("bearer", &self.bearer.is_some())
            .finish()
    }
}
