//! HTTP surface of the authorization server.
//!
//! This module is organized into submodules:
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! The OAuth2 endpoints themselves live in [`crate::oauth2::endpoints`].

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::config::AppConfig;
use crate::oauth2::{self, AuthorizationServerState};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Builds the complete application router, including the API docs at `/api-docs`.
pub fn app(state: AuthorizationServerState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .merge(oauth2::router(state))
        .routes(routes!(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server with all configured routes.
#[tracing::instrument(skip(state, config), fields(addr = %config.bind_address))]
pub async fn start_webserver(
    state: AuthorizationServerState,
    config: &AppConfig,
) -> color_eyre::Result<()> {
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(addr = %config.bind_address, issuer = %config.issuer_url, "Server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
