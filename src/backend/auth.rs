//! Bearer credentials for the record backend.
//!
//! A token is fetched per call and scoped to the backend's base URL
//! (the audience). A failed fetch fails the operation; requests are never
//! sent unauthenticated.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::BackendError;

/// Default address of the instance metadata server.
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, audience: &str) -> Result<SecretString, BackendError>;
}

/// Identity tokens from the instance metadata server.
pub struct MetadataTokenProvider {
    metadata_url: String,
    client: reqwest::Client,
}

impl MetadataTokenProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_metadata_url(client, DEFAULT_METADATA_URL)
    }

    pub fn with_metadata_url(client: reqwest::Client, metadata_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn token(&self, audience: &str) -> Result<SecretString, BackendError> {
        let auth_failure = |reason: String| BackendError::AuthFailure {
            audience: audience.to_string(),
            reason,
        };

        if audience.is_empty() {
            return Err(auth_failure("audience is empty".to_string()));
        }

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/identity",
            self.metadata_url
        );
        let resp = self
            .client
            .get(url)
            .query(&[("audience", audience)])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| auth_failure(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(auth_failure(format!("metadata server returned {}", resp.status())));
        }

        let token = resp.text().await.map_err(|e| auth_failure(e.to_string()))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(auth_failure("metadata server returned an empty token".to_string()));
        }
        Ok(SecretString::from(token.to_string()))
    }
}

/// A fixed token, for local development against an unauthenticated stub.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self, _audience: &str) -> Result<SecretString, BackendError> {
        Ok(SecretString::from(self.token.expose_secret().to_string()))
    }
}
