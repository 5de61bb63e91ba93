//! Grant handlers behind the token endpoint (RFC 6749 §4.1.3, §6 and §4.3).

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;

use crate::error::OAuthError;
use crate::oauth2::client_auth::BodyCredentials;
use crate::oauth2::models::{AuthorizationCode, ClientRegistration, RefreshToken};
use crate::oauth2::pkce::verify_code_verifier;
use crate::oauth2::scope;
use crate::oauth2::state::{AuthorizationServerState, random_hex};
use crate::oauth2::subject::password_subject;

/// Minimum password length accepted by the password grant.
const MIN_PASSWORD_LEN: usize = 6;

/// Token endpoint parameters for every supported grant.
#[derive(Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// `authorization_code`, `refresh_token` or `password`
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// PKCE verifier matching the challenge sent to `/authorize`
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl TokenRequest {
    pub fn body_credentials(&self) -> BodyCredentials<'_> {
        BodyCredentials {
            client_id: self.client_id.as_deref(),
            client_secret: self.client_secret.as_deref(),
        }
    }
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

/// A present, non-empty request parameter, or `invalid_request`.
pub(crate) fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, OAuthError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OAuthError::invalid_request(format!("{name} is required")))
}

/// Dispatch on `grant_type`.
pub async fn exchange(
    state: &AuthorizationServerState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    match required(&request.grant_type, "grant_type")? {
        "authorization_code" => authorization_code_grant(state, headers, request).await,
        "refresh_token" => refresh_token_grant(state, headers, request).await,
        "password" => password_grant(state, request).await,
        other => Err(OAuthError::UnsupportedGrantType(format!(
            "grant_type '{other}' is not supported"
        ))),
    }
}

async fn authenticate_client(
    state: &AuthorizationServerState,
    headers: &HeaderMap,
    request: &TokenRequest,
    now: OffsetDateTime,
) -> Result<ClientRegistration, OAuthError> {
    state
        .client_auth
        .authenticate(
            state.clients.as_ref(),
            headers,
            request.body_credentials(),
            now,
        )
        .await
}

/// Exchange an authorization code and PKCE verifier for an access and refresh token.
pub async fn authorization_code_grant(
    state: &AuthorizationServerState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let code = required(&request.code, "code")?;
    let redirect_uri = required(&request.redirect_uri, "redirect_uri")?;
    let client_id = required(&request.client_id, "client_id")?;
    let code_verifier = required(&request.code_verifier, "code_verifier")?;

    let now = OffsetDateTime::now_utc();
    let client = authenticate_client(state, headers, request, now).await?;
    if client.client_id != client_id {
        tracing::warn!(
            client_id = %client.client_id,
            "client_id parameter does not match the authenticated client"
        );
        return Err(OAuthError::InvalidClient(
            "client_id does not match the authenticated client".into(),
        ));
    }

    // Runs under the code store's lock; on failure the code stays redeemable.
    let check = |stored: &AuthorizationCode| -> Result<(), OAuthError> {
        if stored.client_id != client.client_id {
            return Err(OAuthError::invalid_grant(
                "authorization code was issued to another client",
            ));
        }
        if stored.redirect_uri != redirect_uri {
            return Err(OAuthError::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }
        if !verify_code_verifier(
            code_verifier,
            &stored.code_challenge,
            &stored.code_challenge_method,
        ) {
            return Err(OAuthError::invalid_grant("PKCE verification failed"));
        }
        Ok(())
    };

    let grant = match state.codes.redeem(code, now, &check).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!(
                client_id = %client.client_id,
                error = e.code(),
                reason = e.description().unwrap_or_default(),
                "authorization code redemption rejected"
            );
            return Err(e);
        }
    };

    let access_token = state.access_tokens.issue(
        &grant.user_id,
        &grant.user_name,
        &grant.scope,
        state.lifetimes.access_token_lifetime,
    )?;

    let refresh_token = RefreshToken {
        token: random_hex(32),
        client_id: client.client_id.clone(),
        user_id: grant.user_id,
        user_name: grant.user_name,
        scope: grant.scope.clone(),
        issued_at: now,
        expires_at: now + Duration::seconds(state.lifetimes.refresh_token_lifetime),
    };
    let refresh_token_value = refresh_token.token.clone();
    state.refresh_tokens.insert(refresh_token).await?;

    tracing::info!(client_id = %client.client_id, "authorization code exchanged");
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.lifetimes.access_token_lifetime,
        refresh_token: Some(refresh_token_value),
        scope: grant.scope,
    })
}

/// Mint a new access token from a refresh token. The refresh token is not rotated.
pub async fn refresh_token_grant(
    state: &AuthorizationServerState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let token = required(&request.refresh_token, "refresh_token")?;

    let now = OffsetDateTime::now_utc();
    let client = authenticate_client(state, headers, request, now).await?;

    let Some(stored) = state.refresh_tokens.get_valid(token, now).await? else {
        tracing::warn!(client_id = %client.client_id, "unknown or expired refresh token");
        return Err(OAuthError::invalid_grant(
            "refresh token is invalid or expired",
        ));
    };
    if stored.client_id != client.client_id {
        tracing::warn!(
            client_id = %client.client_id,
            "refresh token presented by a different client"
        );
        return Err(OAuthError::invalid_grant(
            "refresh token was issued to another client",
        ));
    }

    let granted = scope::narrow(&stored.scope, request.scope.as_deref());
    let access_token = state.access_tokens.issue(
        &stored.user_id,
        &stored.user_name,
        &granted,
        state.lifetimes.access_token_lifetime,
    )?;

    tracing::debug!(client_id = %client.client_id, "access token refreshed");
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.lifetimes.access_token_lifetime,
        refresh_token: None,
        scope: granted,
    })
}

/// Legacy resource owner password grant.
///
/// There is no credential store behind this: any non-empty username with a
/// password of at least six characters is accepted. No refresh token is issued.
pub async fn password_grant(
    state: &AuthorizationServerState,
    request: &TokenRequest,
) -> Result<TokenResponse, OAuthError> {
    let username = request
        .username
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("username is required"))?;
    let password = request
        .password
        .as_deref()
        .ok_or_else(|| OAuthError::invalid_request("password is required"))?;

    if username.is_empty() || password.chars().count() < MIN_PASSWORD_LEN {
        tracing::warn!("password grant rejected");
        return Err(OAuthError::invalid_grant("invalid username or password"));
    }

    let subject = password_subject(username);
    let granted = scope::all_recognized();
    let access_token = state.access_tokens.issue(
        &subject.id,
        &subject.display_name,
        &granted,
        state.lifetimes.access_token_lifetime,
    )?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.lifetimes.access_token_lifetime,
        refresh_token: None,
        scope: granted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_missing_and_empty() {
        assert_eq!(required(&Some("x".into()), "code").unwrap(), "x");
        let err = required(&None, "code").unwrap_err();
        assert_eq!(err, OAuthError::invalid_request("code is required"));
        assert!(required(&Some(String::new()), "code").is_err());
    }

    #[test]
    fn body_credentials_borrow_request_fields() {
        let request = TokenRequest {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..Default::default()
        };
        let creds = request.body_credentials();
        assert_eq!(creds.client_id, Some("id"));
        assert_eq!(creds.client_secret, Some("secret"));
    }
}
