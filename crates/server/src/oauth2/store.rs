//! Storage interfaces for the authorization server.
//!
//! Endpoint and grant logic only talk to these traits, so a durable backend can
//! replace the in-memory maps in [`super::memory`] without touching them.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::{OAuthError, StoreError};
use crate::oauth2::models::{AuthorizationCode, ClientRegistration, RefreshToken};

/// Binding checks run against a stored code while it is locked for redemption.
pub type RedemptionCheck<'a> =
    dyn Fn(&AuthorizationCode) -> Result<(), OAuthError> + Send + Sync + 'a;

#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Store a new client. Fails with [`StoreError::Duplicate`] if the id is taken.
    async fn insert(&self, client: ClientRegistration) -> Result<(), StoreError>;

    async fn get(&self, client_id: &str) -> Result<Option<ClientRegistration>, StoreError>;
}

#[async_trait]
pub trait CodeStore: Send + Sync {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError>;

    /// Atomically validate and consume a code.
    ///
    /// While the code is held exclusively:
    /// - an unknown code is `invalid_grant`;
    /// - an expired code is removed and rejected with `invalid_grant`;
    /// - `check` runs against the stored record and its error is returned as is,
    ///   leaving the code in place;
    /// - otherwise the code is removed and returned.
    ///
    /// At most one caller can ever receive `Ok` for a given code.
    async fn redeem(
        &self,
        code: &str,
        now: OffsetDateTime,
        check: &RedemptionCheck<'_>,
    ) -> Result<AuthorizationCode, OAuthError>;

    /// Drop every code that expired before `now`. Returns how many were removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> usize;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<(), StoreError>;

    /// Look up a live token. An expired token is removed and reported as absent.
    async fn get_valid(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<RefreshToken>, StoreError>;

    /// Remove a token, returning whether it existed.
    async fn remove(&self, token: &str) -> Result<bool, StoreError>;

    async fn purge_expired(&self, now: OffsetDateTime) -> usize;
}

#[async_trait]
pub trait RevocationStore: Send + Sync {
    async fn revoke(&self, token: &str) -> Result<(), StoreError>;

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError>;

    async fn len(&self) -> usize;
}
