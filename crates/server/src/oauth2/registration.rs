//! Dynamic client registration (RFC 7591).

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::error::{ErrorResponse, OAuthError};
use crate::oauth2::models::ClientRegistration;
use crate::oauth2::state::{AuthorizationServerState, random_hex};
use crate::oauth2::{OAUTH2_TAG, scope};

const DEFAULT_AUTH_METHOD: &str = "client_secret_basic";
const DEFAULT_GRANT_TYPES: [&str; 2] = ["authorization_code", "refresh_token"];
const DEFAULT_RESPONSE_TYPES: [&str; 1] = ["code"];

/// Client metadata submitted for registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegistrationRequest {
    /// Human-readable client name. Required.
    pub client_name: Option<String>,
    /// Redirect URIs the client may use. At least one is required.
    pub redirect_uris: Option<Vec<String>>,
    pub client_uri: Option<String>,
    pub logo_uri: Option<String>,
    pub tos_uri: Option<String>,
    pub policy_uri: Option<String>,
    pub software_id: Option<String>,
    pub software_version: Option<String>,
    /// Defaults to `client_secret_basic`.
    pub token_endpoint_auth_method: Option<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    /// Space-delimited scopes the client intends to request.
    pub scope: Option<String>,
}

/// Creates the registration router.
pub fn router() -> OpenApiRouter<AuthorizationServerState> {
    OpenApiRouter::new().routes(routes!(register_client))
}

/// Validate metadata, mint credentials and store a new client.
pub async fn register(
    state: &AuthorizationServerState,
    request: RegistrationRequest,
) -> Result<ClientRegistration, OAuthError> {
    let client_name = request
        .client_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| OAuthError::InvalidClientMetadata("client_name is required".into()))?;

    let redirect_uris = request.redirect_uris.unwrap_or_default();
    if redirect_uris.is_empty() {
        return Err(OAuthError::InvalidClientMetadata(
            "redirect_uris must contain at least one URI".into(),
        ));
    }
    for uri in &redirect_uris {
        validate_redirect_uri(uri)?;
    }

    let scope = match request.scope.as_deref().map(str::trim) {
        Some(requested) if !requested.is_empty() => {
            let granted = scope::filter_recognized(requested);
            if granted.is_empty() {
                return Err(OAuthError::InvalidScope(
                    "none of the requested scopes are supported".into(),
                ));
            }
            scope::join(&granted)
        }
        _ => String::new(),
    };

    let token_endpoint_auth_method = match request.token_endpoint_auth_method {
        Some(method) => {
            if !state.client_auth.methods().iter().any(|m| *m == method) {
                return Err(OAuthError::InvalidClientMetadata(format!(
                    "unsupported token_endpoint_auth_method '{method}'"
                )));
            }
            method
        }
        None => DEFAULT_AUTH_METHOD.to_string(),
    };

    let now = OffsetDateTime::now_utc();
    let client = ClientRegistration {
        client_id: random_hex(8),
        client_secret: random_hex(16),
        client_name,
        client_uri: request.client_uri,
        logo_uri: request.logo_uri,
        tos_uri: request.tos_uri,
        policy_uri: request.policy_uri,
        software_id: request.software_id,
        software_version: request.software_version,
        redirect_uris,
        token_endpoint_auth_method,
        grant_types: request
            .grant_types
            .unwrap_or_else(|| DEFAULT_GRANT_TYPES.map(String::from).to_vec()),
        response_types: request
            .response_types
            .unwrap_or_else(|| DEFAULT_RESPONSE_TYPES.map(String::from).to_vec()),
        scope,
        client_id_issued_at: now.unix_timestamp(),
        client_secret_expires_at: (now + Duration::seconds(state.lifetimes.client_secret_lifetime))
            .unix_timestamp(),
    };

    state.clients.insert(client.clone()).await?;
    tracing::info!(
        client_id = %client.client_id,
        client_name = %client.client_name,
        "registered OAuth client"
    );
    Ok(client)
}

/// Redirect URIs must be absolute, printable ASCII and carry no fragment (RFC 6749 §3.1.2).
///
/// They are echoed verbatim into `Location` headers.
fn validate_redirect_uri(uri: &str) -> Result<(), OAuthError> {
    let parsed = url::Url::parse(uri).map_err(|_| {
        OAuthError::InvalidRedirectUri(format!("redirect URI is not an absolute URL: {uri}"))
    })?;
    if !uri.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(OAuthError::InvalidRedirectUri(format!(
            "redirect URI must be ASCII without whitespace: {uri}"
        )));
    }
    if parsed.fragment().is_some() {
        return Err(OAuthError::InvalidRedirectUri(format!(
            "redirect URI must not contain a fragment: {uri}"
        )));
    }
    Ok(())
}

/// Dynamic client registration endpoint.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/register",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Register Client",
    summary = "Register a new OAuth2 client",
    description = "Registers a client per RFC 7591 and returns its credentials.\n\n\
                   `client_name` and at least one absolute `redirect_uris` entry are required. \
                   Unsupported scopes are dropped; if a scope was supplied and none of it is supported \
                   the request fails with `invalid_scope`.\n\n\
                   The returned `client_secret` is shown only once.",
    request_body(
        content = RegistrationRequest,
        content_type = "application/json",
        description = "Client metadata"
    ),
    responses(
        (status = 201, description = "Client registered", body = ClientRegistration),
        (status = 400, description = "Invalid client metadata, redirect URI or scope", body = ErrorResponse),
    )
)]
pub async fn register_client(
    State(state): State<AuthorizationServerState>,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return OAuthError::InvalidClientMetadata(rejection.body_text()).into_response();
        }
    };

    match register(&state, request).await {
        Ok(client) => (StatusCode::CREATED, Json(client)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, TokenLifetimes};

    fn state() -> AuthorizationServerState {
        AuthorizationServerState::in_memory(&AppConfig {
            bind_address: "127.0.0.1:0".into(),
            issuer_url: "https://auth.example".into(),
            token_signing_secret: "0123456789abcdef0123456789abcdef".into(),
            tokens: TokenLifetimes::default(),
            compaction_interval_secs: 0,
        })
    }

    fn minimal() -> RegistrationRequest {
        RegistrationRequest {
            client_name: Some("Wallet".into()),
            redirect_uris: Some(vec!["https://app.example/cb".into()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fills_defaults_and_stores_client() {
        let state = state();
        let client = register(&state, minimal()).await.unwrap();

        assert_eq!(client.client_id.len(), 16);
        assert_eq!(client.client_secret.len(), 32);
        assert_eq!(client.token_endpoint_auth_method, "client_secret_basic");
        assert_eq!(client.grant_types, vec!["authorization_code", "refresh_token"]);
        assert_eq!(client.response_types, vec!["code"]);
        assert_eq!(client.scope, "");
        assert_eq!(
            client.client_secret_expires_at - client.client_id_issued_at,
            TokenLifetimes::default().client_secret_lifetime
        );
        assert_eq!(state.clients.get(&client.client_id).await.unwrap(), Some(client));
    }

    #[tokio::test]
    async fn missing_name_or_redirects_is_invalid_metadata() {
        let state = state();
        let mut req = minimal();
        req.client_name = Some("   ".into());
        assert_eq!(
            register(&state, req).await.unwrap_err().code(),
            "invalid_client_metadata"
        );

        let mut req = minimal();
        req.redirect_uris = Some(vec![]);
        assert_eq!(
            register(&state, req).await.unwrap_err().code(),
            "invalid_client_metadata"
        );
    }

    #[tokio::test]
    async fn relative_or_fragment_redirect_is_rejected() {
        let state = state();
        for uri in [
            "/cb",
            "https://app.example/cb#frag",
            "https://app.example/caf\u{e9}",
            "https://app.example/c b",
        ] {
            let mut req = minimal();
            req.redirect_uris = Some(vec![uri.into()]);
            assert_eq!(
                register(&state, req).await.unwrap_err().code(),
                "invalid_redirect_uri"
            );
        }
    }

    #[tokio::test]
    async fn scope_is_filtered_or_rejected() {
        let state = state();
        let mut req = minimal();
        req.scope = Some(format!("openid {}", scope::CREDENTIAL_READONLY));
        let client = register(&state, req).await.unwrap();
        assert_eq!(client.scope, scope::CREDENTIAL_READONLY);

        let mut req = minimal();
        req.scope = Some("openid email".into());
        assert_eq!(register(&state, req).await.unwrap_err().code(), "invalid_scope");
    }

    #[tokio::test]
    async fn unknown_auth_method_is_rejected() {
        let state = state();
        let mut req = minimal();
        req.token_endpoint_auth_method = Some("private_key_jwt".into());
        assert_eq!(
            register(&state, req).await.unwrap_err().code(),
            "invalid_client_metadata"
        );
    }
}
