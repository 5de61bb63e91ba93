//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::scope::{
    CREDENTIAL_READONLY, CREDENTIAL_UPSERT, OFFLINE_ACCESS, PROFILE_READONLY, PROFILE_UPDATE,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, OAuth2, Scopes, SecurityScheme,
    },
};

/// Security schemes advertised in the OpenAPI document.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let bearer = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "Access token obtained from the `/token` endpoint.",
                ))
                .build();
            components.add_security_scheme("bearer_auth", SecurityScheme::Http(bearer));

            let oauth2 = OAuth2::new([Flow::AuthorizationCode(AuthorizationCode::new(
                "/authorize",
                "/token",
                Scopes::from_iter([
                    (CREDENTIAL_READONLY, "Read Open Badges credentials"),
                    (CREDENTIAL_UPSERT, "Create or update Open Badges credentials"),
                    (PROFILE_READONLY, "Read the profile"),
                    (PROFILE_UPDATE, "Update the profile"),
                    (OFFLINE_ACCESS, "Obtain a refresh token"),
                ]),
            ))]);
            components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
        }
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Open Badges OAuth2 Authorization Server",
        version = "1.0.0",
        description = "Client registration, authorization code flow with PKCE, token issuance, revocation and introspection."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 authorization server endpoints")
    )
)]
pub struct ApiDoc;
