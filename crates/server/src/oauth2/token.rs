//! Access tokens: minting, verification and the bearer extractor.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{ErrorResponse, TokenError};
use crate::oauth2::state::AuthorizationServerState;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub name: String,
    /// Space-delimited granted scopes.
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|s| s == scope)
    }
}

/// Mints and checks opaque bearer tokens.
pub trait AccessTokenIssuer: Send + Sync {
    fn issue(
        &self,
        subject: &str,
        display_name: &str,
        scopes: &str,
        lifetime_secs: i64,
    ) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError>;
}

/// HS256 JWT access tokens.
pub struct JwtAccessTokenIssuer {
    issuer: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtAccessTokenIssuer {
    pub fn new(issuer: impl Into<String>, secret: &[u8]) -> Self {
        Self {
            issuer: issuer.into(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl AccessTokenIssuer for JwtAccessTokenIssuer {
    fn issue(
        &self,
        subject: &str,
        display_name: &str,
        scopes: &str,
        lifetime_secs: i64,
    ) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            name: display_name.to_string(),
            scope: scopes.to_string(),
            iat: now,
            exp: now + lifetime_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<AccessTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        decode::<AccessTokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

/// Rejection for [`BearerAuth`], shaped per RFC 6750 §3.1.
#[derive(Debug)]
pub struct BearerError {
    status: StatusCode,
    body: ErrorResponse,
}

impl BearerError {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorResponse {
                error: "invalid_token".to_string(),
                error_description: Some(description.into()),
            },
        }
    }

    pub fn insufficient_scope(required: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            body: ErrorResponse {
                error: "insufficient_scope".to_string(),
                error_description: Some(format!("Token requires '{required}' scope")),
            },
        }
    }

    fn server_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: "server_error".to_string(),
                error_description: None,
            },
        }
    }
}

impl IntoResponse for BearerError {
    fn into_response(self) -> Response {
        let challenge = format!("Bearer error=\"{}\"", self.body.error);
        (
            self.status,
            [(axum::http::header::WWW_AUTHENTICATE, challenge)],
            Json(self.body),
        )
            .into_response()
    }
}

/// Axum extractor accepting `Authorization: Bearer <access token>`.
///
/// Tokens that fail signature or expiry checks, or that have been revoked, are refused.
///
/// ```ignore
/// async fn handler(BearerAuth(claims): BearerAuth) -> impl IntoResponse {
///     format!("Hello, {}", claims.name)
/// }
/// ```
pub struct BearerAuth(pub AccessTokenClaims);

impl BearerAuth {
    /// Refuse the request with `insufficient_scope` unless `scope` was granted.
    pub fn require_scope(&self, scope: &str) -> Result<(), BearerError> {
        if self.0.has_scope(scope) {
            Ok(())
        } else {
            Err(BearerError::insufficient_scope(scope))
        }
    }
}

impl FromRequestParts<AuthorizationServerState> for BearerAuth {
    type Rejection = BearerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthorizationServerState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BearerError::invalid_token("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| BearerError::invalid_token("Authorization header must use Bearer scheme"))?;

        match state.verify_access_token(token).await {
            Ok(Some(claims)) => Ok(BearerAuth(claims)),
            Ok(None) => Err(BearerError::invalid_token("Token is not valid")),
            Err(e) => {
                tracing::error!(error = %e, "failed to verify bearer token");
                Err(BearerError::server_error())
            }
        }
    }
}
