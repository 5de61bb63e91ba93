//! OAuth2 Authorization Server module.
//!
//! Issues access tokens for the Open Badges credential and profile APIs.
//!
//! ## Supported Flows
//!
//! - Authorization Code with mandatory PKCE
//! - Refresh Token (not rotated)
//! - Resource Owner Password (legacy, demo only)
//!
//! ## Endpoints
//!
//! - `POST /register` - Dynamic client registration (RFC 7591)
//! - `GET /authorize` - Authorization endpoint
//! - `POST /token` - Token endpoint
//! - `POST /revoke` - Token revocation (RFC 7009)
//! - `POST /introspect` - Token introspection (RFC 7662)
//! - `GET /.well-known/oauth-authorization-server` - Server metadata (RFC 8414)
//!
//! All state lives behind the store traits in [`store`]; the in-memory backends in
//! [`memory`] are not durable across restarts.

pub mod client_auth;
pub mod endpoints;
pub mod extract;
pub mod grants;
pub mod memory;
pub mod models;
pub mod pkce;
pub mod registration;
pub mod scope;
pub mod state;
pub mod store;
pub mod subject;
pub mod token;

pub use endpoints::router;
pub use models::{AuthorizationCode, ClientRegistration, RefreshToken};
pub use state::{AuthorizationServerState, spawn_compaction_task};
pub use subject::{DemoSubjectResolver, Subject, SubjectResolver};
pub use token::{AccessTokenClaims, AccessTokenIssuer, BearerAuth, JwtAccessTokenIssuer};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
