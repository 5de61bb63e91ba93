//! Client authentication for the token, revocation and introspection endpoints.
//!
//! Credentials are looked for in order:
//! 1. `Authorization: Basic base64(client_id:client_secret)`
//! 2. `client_id` / `client_secret` in the request body
//!
//! Whatever goes wrong after credentials are found, the caller sees the same
//! "invalid client credentials" message.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::error::OAuthError;
use crate::oauth2::models::ClientRegistration;
use crate::oauth2::store::ClientStore;

/// Credentials found in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
}

/// Client fields carried in a request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyCredentials<'a> {
    pub client_id: Option<&'a str>,
    pub client_secret: Option<&'a str>,
}

/// One way of pulling client credentials out of a request.
pub trait ClientCredentialExtractor: Send + Sync {
    /// `token_endpoint_auth_method` name of this strategy.
    fn method(&self) -> &'static str;

    fn extract(&self, headers: &HeaderMap, body: BodyCredentials<'_>) -> Option<ClientCredentials>;
}

/// `client_secret_basic`
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicAuthExtractor;

impl ClientCredentialExtractor for BasicAuthExtractor {
    fn method(&self) -> &'static str {
        "client_secret_basic"
    }

    fn extract(&self, headers: &HeaderMap, _body: BodyCredentials<'_>) -> Option<ClientCredentials> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (id, secret) = decoded.split_once(':')?;
        Some(ClientCredentials {
            client_id: id.to_string(),
            client_secret: Some(secret.to_string()),
        })
    }
}

/// `client_secret_post`
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestBodyExtractor;

impl ClientCredentialExtractor for RequestBodyExtractor {
    fn method(&self) -> &'static str {
        "client_secret_post"
    }

    fn extract(&self, _headers: &HeaderMap, body: BodyCredentials<'_>) -> Option<ClientCredentials> {
        let client_id = body.client_id.filter(|id| !id.is_empty())?;
        Some(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: body.client_secret.map(String::from),
        })
    }
}

/// Runs the extractors in order and checks the first credentials found.
#[derive(Clone)]
pub struct ClientAuthenticator {
    extractors: Vec<Arc<dyn ClientCredentialExtractor>>,
}

impl Default for ClientAuthenticator {
    fn default() -> Self {
        Self::new(vec![
            Arc::new(BasicAuthExtractor),
            Arc::new(RequestBodyExtractor),
        ])
    }
}

impl ClientAuthenticator {
    pub fn new(extractors: Vec<Arc<dyn ClientCredentialExtractor>>) -> Self {
        Self { extractors }
    }

    /// Names of the supported authentication methods, in priority order.
    pub fn methods(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.method()).collect()
    }

    pub fn extract(&self, headers: &HeaderMap, body: BodyCredentials<'_>) -> Option<ClientCredentials> {
        self.extractors
            .iter()
            .find_map(|extractor| extractor.extract(headers, body))
    }

    /// Authenticate the calling client, returning its registration.
    pub async fn authenticate(
        &self,
        clients: &dyn ClientStore,
        headers: &HeaderMap,
        body: BodyCredentials<'_>,
        now: OffsetDateTime,
    ) -> Result<ClientRegistration, OAuthError> {
        let credentials = self
            .extract(headers, body)
            .ok_or_else(OAuthError::missing_client_credentials)?;

        let Some(client) = clients.get(&credentials.client_id).await? else {
            tracing::debug!("client authentication failed: unknown client");
            return Err(OAuthError::invalid_client_credentials());
        };

        let provided = credentials.client_secret.as_deref().unwrap_or_default();
        if !secrets_match(provided, &client.client_secret) {
            tracing::debug!(client_id = %client.client_id, "client authentication failed: secret mismatch");
            return Err(OAuthError::invalid_client_credentials());
        }
        if client.client_secret_expires_at != 0
            && client.client_secret_expires_at <= now.unix_timestamp()
        {
            tracing::debug!(client_id = %client.client_id, "client authentication failed: secret expired");
            return Err(OAuthError::invalid_client_credentials());
        }

        Ok(client)
    }
}

/// Compare fixed-length digests so timing says nothing about the stored secret.
fn secrets_match(provided: &str, stored: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let stored = Sha256::digest(stored.as_bytes());
    provided.as_slice().ct_eq(stored.as_slice()).into()
}
