//! Process-local store backends.
//!
//! Everything lives in sharded concurrent maps and is lost on restart. Expiry is
//! enforced on read; [`purge_expired`](CodeStore::purge_expired) only reclaims memory.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::error::{OAuthError, StoreError};
use crate::oauth2::models::{AuthorizationCode, ClientRegistration, RefreshToken};
use crate::oauth2::store::{
    ClientStore, CodeStore, RedemptionCheck, RefreshTokenStore, RevocationStore,
};

#[derive(Clone, Default)]
pub struct MemoryClientStore {
    clients: Arc<DashMap<String, ClientRegistration>>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn insert(&self, client: ClientRegistration) -> Result<(), StoreError> {
        match self.clients.entry(client.client_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                store: "clients",
                key: client.client_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(client);
                Ok(())
            }
        }
    }

    async fn get(&self, client_id: &str) -> Result<Option<ClientRegistration>, StoreError> {
        Ok(self.clients.get(client_id).map(|c| c.value().clone()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryCodeStore {
    codes: Arc<DashMap<String, AuthorizationCode>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn insert(&self, code: AuthorizationCode) -> Result<(), StoreError> {
        match self.codes.entry(code.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                store: "authorization_codes",
                key: "<redacted>".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(code);
                Ok(())
            }
        }
    }

    async fn redeem(
        &self,
        code: &str,
        now: OffsetDateTime,
        check: &RedemptionCheck<'_>,
    ) -> Result<AuthorizationCode, OAuthError> {
        // The entry holds the shard write lock until it is dropped, so lookup,
        // checks and removal form one step with respect to other redeemers.
        match self.codes.entry(code.to_string()) {
            Entry::Vacant(_) => Err(OAuthError::invalid_grant(
                "authorization code is invalid or has already been used",
            )),
            Entry::Occupied(entry) => {
                if entry.get().is_expired_at(now) {
                    entry.remove();
                    return Err(OAuthError::invalid_grant("authorization code expired"));
                }
                check(entry.get())?;
                Ok(entry.remove())
            }
        }
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let mut removed = 0;
        self.codes.retain(|_, code| {
            let keep = !code.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

#[derive(Clone, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Arc<DashMap<String, RefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, token: RefreshToken) -> Result<(), StoreError> {
        match self.tokens.entry(token.token.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                store: "refresh_tokens",
                key: "<redacted>".to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn get_valid(
        &self,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<Option<RefreshToken>, StoreError> {
        self.tokens.remove_if(token, |_, t| t.is_expired_at(now));
        Ok(self.tokens.get(token).map(|t| t.value().clone()))
    }

    async fn remove(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.tokens.remove(token).is_some())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> usize {
        let mut removed = 0;
        self.tokens.retain(|_, token| {
            let keep = !token.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }
}

/// Append-only set of revoked bearer token strings.
#[derive(Clone, Default)]
pub struct MemoryRevocationStore {
    revoked: Arc<DashSet<String>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        self.revoked.insert(token.to_string());
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.revoked.contains(token))
    }

    async fn len(&self) -> usize {
        self.revoked.len()
    }
}
