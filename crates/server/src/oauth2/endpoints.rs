//! OAuth2 HTTP endpoints.
//!
//! Implements the authorization server endpoints:
//! - Authorization endpoint (code flow with mandatory PKCE)
//! - Token endpoint
//! - Token revocation
//! - Token introspection
//! - Authorization server metadata

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::error::{ErrorResponse, OAuthError};
use crate::oauth2::client_auth::BodyCredentials;
use crate::oauth2::extract::FormOrJson;
use crate::oauth2::grants::{self, TokenRequest, TokenResponse, required};
use crate::oauth2::models::AuthorizationCode;
use crate::oauth2::pkce::CodeChallengeMethod;
use crate::oauth2::scope;
use crate::oauth2::state::{AuthorizationServerState, random_hex};
use crate::oauth2::{OAUTH2_TAG, registration};

/// Creates the OAuth2 router.
pub fn router(state: AuthorizationServerState) -> OpenApiRouter {
    OpenApiRouter::new()
        .merge(registration::router())
        .routes(routes!(authorize))
        .routes(routes!(token))
        .routes(routes!(revoke))
        .routes(routes!(introspect))
        .routes(routes!(authorization_server_metadata))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// OAuth2 authorization request parameters.
///
/// Everything is optional at the type level so that missing parameters can be
/// reported in the OAuth error shape.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Default, Deserialize, ToSchema)]
pub struct RevokeRequest {
    pub token: Option<String>,
    /// `access_token` or `refresh_token`
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Default, Deserialize, ToSchema)]
pub struct IntrospectRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// RFC 7662 §2.2 response. Only `active` is present for inactive tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// RFC 8414 authorization server metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
}

// =============================================================================
// Endpoints
// =============================================================================

/// OAuth2 Authorization endpoint.
///
/// Every request is approved for whatever subject the configured
/// [`SubjectResolver`](crate::oauth2::subject::SubjectResolver) returns; there is no
/// consent step.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start the OAuth2 authorization code flow",
    description = "Issues an authorization code bound to the client, redirect URI, granted scope and PKCE challenge, \
                   and redirects back to the client.\n\n\
                   **Error delivery:** until `client_id` and `redirect_uri` have been validated, errors are returned \
                   as a JSON body. After that they are delivered as a redirect carrying `error`, \
                   `error_description` and `state`.\n\n\
                   **PKCE is mandatory.** `code_challenge_method` defaults to `S256`.",
    params(
        ("response_type" = String, Query, description = "Must be `code`."),
        ("client_id" = String, Query, description = "The client identifier issued during registration."),
        ("redirect_uri" = String, Query, description = "Must exactly match one of the client's registered redirect URIs."),
        ("scope" = Option<String>, Query, description = "Space-separated scopes. Unsupported values are dropped."),
        ("state" = Option<String>, Query, description = "Opaque value returned unchanged in the redirect."),
        ("code_challenge" = String, Query, description = "PKCE code challenge."),
        ("code_challenge_method" = Option<String>, Query, description = "`S256` (default) or `plain`."),
    ),
    responses(
        (status = 303, description = "Redirect back to the client with a code or an error"),
        (status = 400, description = "Missing parameters, unknown client or unregistered redirect_uri", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<AuthorizationServerState>,
    headers: HeaderMap,
    params: Result<Query<AuthorizeRequest>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return OAuthError::invalid_request(rejection.body_text()).into_response();
        }
    };

    let (Some(response_type), Some(client_id), Some(redirect_uri)) = (
        params.response_type.as_deref().filter(|v| !v.is_empty()),
        params.client_id.as_deref().filter(|v| !v.is_empty()),
        params.redirect_uri.as_deref().filter(|v| !v.is_empty()),
    ) else {
        return OAuthError::invalid_request("response_type, client_id and redirect_uri are required")
            .into_response();
    };

    if response_type != "code" {
        return OAuthError::UnsupportedResponseType(
            "only the 'code' response type is supported".into(),
        )
        .into_response();
    }

    let client = match state.clients.get(client_id).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(OAuthError::InvalidClient("unknown client".into()).to_body()),
            )
                .into_response();
        }
        Err(e) => return OAuthError::from(e).into_response(),
    };

    if !client.is_redirect_uri_allowed(redirect_uri) {
        return OAuthError::invalid_request("redirect_uri is not registered for this client")
            .into_response();
    }

    // The redirect target is trusted from here on.
    let client_state = params.state.as_deref();

    let Some(code_challenge) = params.code_challenge.filter(|c| !c.is_empty()) else {
        return error_redirect(
            redirect_uri,
            client_state,
            &OAuthError::invalid_request("code_challenge is required"),
        );
    };

    let method = params
        .code_challenge_method
        .as_deref()
        .unwrap_or(CodeChallengeMethod::S256.as_str());
    if CodeChallengeMethod::parse(method).is_none() {
        return error_redirect(
            redirect_uri,
            client_state,
            &OAuthError::invalid_request("unsupported code_challenge_method"),
        );
    }

    let requested = params.scope.as_deref().unwrap_or_default();
    let granted = scope::filter_recognized(requested);
    if !requested.is_empty() && granted.is_empty() {
        return error_redirect(
            redirect_uri,
            client_state,
            &OAuthError::InvalidScope("none of the requested scopes are supported".into()),
        );
    }
    let granted = scope::join(&granted);

    let Some(subject) = state.subjects.current_subject(&headers) else {
        return error_redirect(
            redirect_uri,
            client_state,
            &OAuthError::AccessDenied("no authenticated user".into()),
        );
    };

    let code = AuthorizationCode {
        code: random_hex(32),
        client_id: client.client_id.clone(),
        redirect_uri: redirect_uri.to_string(),
        scope: granted.clone(),
        state: params.state.clone(),
        code_challenge,
        code_challenge_method: method.to_string(),
        user_id: subject.id,
        user_name: subject.display_name,
        expires_at: OffsetDateTime::now_utc()
            + Duration::seconds(state.lifetimes.authorization_code_lifetime),
    };
    let code_value = code.code.clone();
    if let Err(e) = state.codes.insert(code).await {
        return error_redirect(redirect_uri, client_state, &OAuthError::from(e));
    }

    tracing::info!(client_id = %client.client_id, "authorization code issued");

    let mut query = vec![("code", code_value.as_str())];
    if let Some(s) = client_state {
        query.push(("state", s));
    }
    if !granted.is_empty() {
        query.push(("scope", granted.as_str()));
    }
    match with_query(redirect_uri, &query) {
        Some(location) => Redirect::to(&location).into_response(),
        None => OAuthError::Server(format!("registered redirect_uri is not a URL: {redirect_uri}"))
            .into_response(),
    }
}

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange a grant for an access token",
    description = "Issues access tokens.\n\n\
                   **Supported grant types:**\n\
                   - `authorization_code`: requires `code`, `redirect_uri`, `client_id`, `code_verifier` and client \
                     authentication. Returns an access token and a refresh token.\n\
                   - `refresh_token`: requires `refresh_token` and client authentication. An optional `scope` can only \
                     narrow the original grant. The refresh token is not rotated.\n\
                   - `password`: legacy demo grant, requires `username` and `password`. No refresh token.\n\n\
                   **Client authentication:** HTTP Basic, or `client_id` and `client_secret` in the body.\n\n\
                   Bodies may be form-encoded or JSON.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Invalid request, grant or grant type", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
        (status = 500, description = "Internal failure", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<AuthorizationServerState>,
    headers: HeaderMap,
    FormOrJson(params): FormOrJson<TokenRequest>,
) -> Response {
    match grants::exchange(&state, &headers, &params).await {
        Ok(response) => (
            StatusCode::OK,
            [
                (axum::http::header::CACHE_CONTROL, "no-store"),
                (axum::http::header::PRAGMA, "no-cache"),
            ],
            Json(response),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Token revocation endpoint (RFC 7009).
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/revoke",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Revoke Token",
    summary = "Revoke an access or refresh token",
    description = "Marks the token as revoked so it no longer verifies, and deletes it if it is a refresh token.\n\n\
                   Returns 200 even if the token was never issued or is already invalid (RFC 7009 §2.2).",
    request_body(
        content = RevokeRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token revocation request"
    ),
    responses(
        (status = 200, description = "Token revoked (or was already invalid)"),
        (status = 400, description = "Missing token parameter", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
pub async fn revoke(
    State(state): State<AuthorizationServerState>,
    headers: HeaderMap,
    FormOrJson(params): FormOrJson<RevokeRequest>,
) -> Response {
    let token = match required(&params.token, "token") {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };

    let body = BodyCredentials {
        client_id: params.client_id.as_deref(),
        client_secret: params.client_secret.as_deref(),
    };
    let client = match state
        .client_auth
        .authenticate(
            state.clients.as_ref(),
            &headers,
            body,
            OffsetDateTime::now_utc(),
        )
        .await
    {
        Ok(client) => client,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = state.revocations.revoke(token).await {
        return OAuthError::from(e).into_response();
    }
    let refresh_token_removed = match state.refresh_tokens.remove(token).await {
        Ok(removed) => removed,
        Err(e) => return OAuthError::from(e).into_response(),
    };

    tracing::info!(
        client_id = %client.client_id,
        hint = params.token_type_hint.as_deref().unwrap_or("none"),
        refresh_token_removed,
        "token revoked"
    );

    (StatusCode::OK, Json(serde_json::json!({}))).into_response()
}

/// Token introspection endpoint (RFC 7662).
#[tracing::instrument(skip(state, headers, params))]
#[utoipa::path(
    post,
    path = "/introspect",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Introspect Token",
    summary = "Check whether a token is active",
    description = "Returns `{\"active\": false}` for unknown, expired, malformed or revoked tokens. \
                   Active access and refresh tokens are described with their scope, subject and expiry.",
    request_body(
        content = IntrospectRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token introspection request"
    ),
    responses(
        (status = 200, description = "Token state", body = IntrospectionResponse),
        (status = 400, description = "Missing token parameter", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
pub async fn introspect(
    State(state): State<AuthorizationServerState>,
    headers: HeaderMap,
    FormOrJson(params): FormOrJson<IntrospectRequest>,
) -> Response {
    match introspect_token(&state, &headers, &params).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn introspect_token(
    state: &AuthorizationServerState,
    headers: &HeaderMap,
    params: &IntrospectRequest,
) -> Result<IntrospectionResponse, OAuthError> {
    let token = required(&params.token, "token")?;
    let now = OffsetDateTime::now_utc();
    let body = BodyCredentials {
        client_id: params.client_id.as_deref(),
        client_secret: params.client_secret.as_deref(),
    };
    state
        .client_auth
        .authenticate(state.clients.as_ref(), headers, body, now)
        .await?;

    if let Some(claims) = state.verify_access_token(token).await? {
        return Ok(IntrospectionResponse {
            active: true,
            scope: Some(claims.scope),
            client_id: None,
            sub: Some(claims.sub),
            username: Some(claims.name),
            token_type: Some("Bearer".to_string()),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            iss: Some(claims.iss),
        });
    }

    if !state.revocations.is_revoked(token).await?
        && let Some(refresh) = state.refresh_tokens.get_valid(token, now).await?
    {
        return Ok(IntrospectionResponse {
            active: true,
            scope: Some(refresh.scope),
            client_id: Some(refresh.client_id),
            sub: Some(refresh.user_id),
            username: Some(refresh.user_name),
            token_type: Some("refresh_token".to_string()),
            exp: Some(refresh.expires_at.unix_timestamp()),
            iat: Some(refresh.issued_at.unix_timestamp()),
            iss: Some(state.issuer_url.clone()),
        });
    }

    Ok(IntrospectionResponse::default())
}

/// OAuth 2.0 Authorization Server Metadata (RFC 8414).
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/.well-known/oauth-authorization-server",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorization Server Metadata",
    summary = "Authorization server metadata document",
    description = "Endpoint URLs, supported grant and response types, scopes, client authentication methods \
                   and PKCE methods of this server.",
    responses(
        (status = 200, description = "Metadata document", body = AuthorizationServerMetadata),
    )
)]
pub async fn authorization_server_metadata(
    State(state): State<AuthorizationServerState>,
) -> Json<AuthorizationServerMetadata> {
    let base = &state.issuer_url;
    let auth_methods: Vec<String> = state
        .client_auth
        .methods()
        .into_iter()
        .map(String::from)
        .collect();
    Json(AuthorizationServerMetadata {
        issuer: base.clone(),
        authorization_endpoint: format!("{base}/authorize"),
        token_endpoint: format!("{base}/token"),
        registration_endpoint: format!("{base}/register"),
        revocation_endpoint: format!("{base}/revoke"),
        introspection_endpoint: format!("{base}/introspect"),
        response_types_supported: vec!["code".to_string()],
        grant_types_supported: vec![
            "authorization_code".to_string(),
            "refresh_token".to_string(),
            "password".to_string(),
        ],
        scopes_supported: scope::RECOGNIZED_SCOPES.map(String::from).to_vec(),
        token_endpoint_auth_methods_supported: auth_methods.clone(),
        revocation_endpoint_auth_methods_supported: auth_methods,
        code_challenge_methods_supported: vec![
            CodeChallengeMethod::S256.as_str().to_string(),
            CodeChallengeMethod::Plain.as_str().to_string(),
        ],
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Append query parameters to `base`, keeping any it already has.
///
/// The registered URI is reused as written rather than re-serialized, so the
/// client gets back exactly the string it registered. Returns `None` if `base`
/// is not an absolute URL or cannot be sent as a header value.
fn with_query(base: &str, params: &[(&str, &str)]) -> Option<String> {
    let parsed = url::Url::parse(base).ok()?;
    let (base, fragment) = match base.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (base, None),
    };

    let mut encoded = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        encoded.append_pair(key, value);
    }
    let encoded = encoded.finish();

    let separator = match parsed.query() {
        None => "?",
        Some("") => "",
        Some(_) if base.ends_with('&') => "",
        Some(_) => "&",
    };
    let mut location = format!("{base}{separator}{encoded}");
    if let Some(fragment) = fragment {
        location.push('#');
        location.push_str(fragment);
    }
    location.bytes().all(|b| b.is_ascii_graphic()).then_some(location)
}

/// Deliver an authorization error to the client's redirect URI (RFC 6749 §4.1.2.1).
fn error_redirect(redirect_uri: &str, state: Option<&str>, error: &OAuthError) -> Response {
    if let OAuthError::Server(detail) = error {
        tracing::error!(error = %detail, "authorization request failed");
    } else {
        tracing::debug!(error = error.code(), "authorization request rejected");
    }

    let mut params = vec![("error", error.code())];
    if let Some(description) = error.description() {
        params.push(("error_description", description));
    }
    if let Some(s) = state {
        params.push(("state", s));
    }

    match with_query(redirect_uri, &params) {
        Some(location) => Redirect::to(&location).into_response(),
        None => (StatusCode::BAD_REQUEST, Json(error.to_body())).into_response(),
    }
}
