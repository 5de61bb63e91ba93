//! Shared state of the authorization server.

use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::config::{AppConfig, TokenLifetimes};
use crate::error::StoreError;
use crate::oauth2::client_auth::ClientAuthenticator;
use crate::oauth2::memory::{
    MemoryClientStore, MemoryCodeStore, MemoryRefreshTokenStore, MemoryRevocationStore,
};
use crate::oauth2::store::{ClientStore, CodeStore, RefreshTokenStore, RevocationStore};
use crate::oauth2::subject::{DemoSubjectResolver, SubjectResolver};
use crate::oauth2::token::{AccessTokenClaims, AccessTokenIssuer, JwtAccessTokenIssuer};

/// Everything the OAuth2 endpoints need, injected at construction.
#[derive(Clone)]
pub struct AuthorizationServerState {
    pub clients: Arc<dyn ClientStore>,
    pub codes: Arc<dyn CodeStore>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub revocations: Arc<dyn RevocationStore>,
    pub access_tokens: Arc<dyn AccessTokenIssuer>,
    pub subjects: Arc<dyn SubjectResolver>,
    pub client_auth: ClientAuthenticator,
    pub lifetimes: TokenLifetimes,
    /// Base URL of the server, without trailing slash.
    pub issuer_url: String,
}

impl AuthorizationServerState {
    /// State backed by the process-local stores and HS256 access tokens.
    pub fn in_memory(config: &AppConfig) -> Self {
        let issuer_url = config.issuer_base().to_string();
        Self {
            clients: Arc::new(MemoryClientStore::new()),
            codes: Arc::new(MemoryCodeStore::new()),
            refresh_tokens: Arc::new(MemoryRefreshTokenStore::new()),
            revocations: Arc::new(MemoryRevocationStore::new()),
            access_tokens: Arc::new(JwtAccessTokenIssuer::new(
                issuer_url.clone(),
                config.token_signing_secret.as_bytes(),
            )),
            subjects: Arc::new(DemoSubjectResolver),
            client_auth: ClientAuthenticator::default(),
            lifetimes: config.tokens.clone(),
            issuer_url,
        }
    }

    pub fn with_subject_resolver(mut self, subjects: Arc<dyn SubjectResolver>) -> Self {
        self.subjects = subjects;
        self
    }

    pub fn with_access_token_issuer(mut self, issuer: Arc<dyn AccessTokenIssuer>) -> Self {
        self.access_tokens = issuer;
        self
    }

    /// Verify an access token, refusing anything on the revocation list.
    ///
    /// `Ok(None)` means the token is not acceptable; `Err` is a backend failure.
    pub async fn verify_access_token(
        &self,
        token: &str,
    ) -> Result<Option<AccessTokenClaims>, StoreError> {
        if self.revocations.is_revoked(token).await? {
            return Ok(None);
        }
        Ok(self.access_tokens.verify(token).ok())
    }

    /// Drop expired codes and refresh tokens. Returns `(codes, refresh_tokens)` removed.
    pub async fn compact(&self, now: OffsetDateTime) -> (usize, usize) {
        let codes = self.codes.purge_expired(now).await;
        let refresh = self.refresh_tokens.purge_expired(now).await;
        (codes, refresh)
    }
}

/// Lowercase hex of `bytes` random bytes from the thread-local CSPRNG.
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Periodically purge expired codes and refresh tokens.
///
/// Reads check expiry on their own; this only bounds memory. Does nothing when
/// `interval_secs` is 0.
pub fn spawn_compaction_task(state: AuthorizationServerState, interval_secs: u64) {
    if interval_secs == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let (codes, refresh_tokens) = state.compact(OffsetDateTime::now_utc()).await;
            if codes + refresh_tokens > 0 {
                tracing::debug!(codes, refresh_tokens, "purged expired grants");
            }
        }
    });
}
