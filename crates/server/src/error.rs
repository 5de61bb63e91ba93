use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Protocol-level failures (RFC 6749 §5.2, §4.1.2.1 and RFC 7591 §3.2.2).
///
/// Each variant carries the human-readable `error_description`. `Server` carries
/// internal detail that is logged but never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("invalid_client: {0}")]
    InvalidClient(String),
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),
    #[error("access_denied: {0}")]
    AccessDenied(String),
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),
    #[error("invalid_scope: {0}")]
    InvalidScope(String),
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),
    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(String),
    #[error("invalid_redirect_uri: {0}")]
    InvalidRedirectUri(String),
    #[error("server_error: {0}")]
    Server(String),
}

impl OAuthError {
    /// The registered error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::AccessDenied(_) => "access_denied",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidClientMetadata(_) => "invalid_client_metadata",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::Server(_) => "server_error",
        }
    }

    /// Description safe to show to the client.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Server(_) => None,
            Self::InvalidRequest(d)
            | Self::InvalidClient(d)
            | Self::InvalidGrant(d)
            | Self::UnauthorizedClient(d)
            | Self::AccessDenied(d)
            | Self::UnsupportedGrantType(d)
            | Self::InvalidScope(d)
            | Self::UnsupportedResponseType(d)
            | Self::InvalidClientMetadata(d)
            | Self::InvalidRedirectUri(d) => Some(d.as_str()),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClient(_) => StatusCode::UNAUTHORIZED,
            Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn to_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.code().to_string(),
            error_description: self.description().map(String::from),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::InvalidRequest(description.into())
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::InvalidGrant(description.into())
    }

    /// The only message ever returned for failed client authentication, so that
    /// an unknown client and a wrong secret are indistinguishable.
    pub fn invalid_client_credentials() -> Self {
        Self::InvalidClient("invalid client credentials".to_string())
    }

    pub fn missing_client_credentials() -> Self {
        Self::InvalidClient("missing client credentials".to_string())
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        if let Self::Server(detail) = &self {
            tracing::error!(error = %detail, "internal failure while handling OAuth request");
        }
        (self.status_code(), Json(self.to_body())).into_response()
    }
}

/// Wire shape of every JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Failures of a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key in {store}: {key}")]
    Duplicate { store: &'static str, key: String },
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the access-token signing collaborator.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to sign access token: {0}")]
    Signing(String),
    #[error("Access token rejected: {0}")]
    Invalid(String),
}

impl From<StoreError> for OAuthError {
    fn from(err: StoreError) -> Self {
        OAuthError::Server(err.to_string())
    }
}

impl From<TokenError> for OAuthError {
    fn from(err: TokenError) -> Self {
        OAuthError::Server(err.to_string())
    }
}
