use open_badges_oauth::api::start_webserver;
use open_badges_oauth::config::load_config;
use open_badges_oauth::oauth2::{AuthorizationServerState, spawn_compaction_task};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "open_badges_oauth=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let layer = fmt::layer().with_target(true).with_level(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(layer)
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = load_config()?;
    tracing::info!(
        issuer = %config.issuer_url,
        access_token_lifetime = config.tokens.access_token_lifetime,
        authorization_code_lifetime = config.tokens.authorization_code_lifetime,
        refresh_token_lifetime = config.tokens.refresh_token_lifetime,
        compaction_interval_secs = config.compaction_interval_secs,
        "authorization server configuration"
    );

    // Process-local stores: every client, code and token is lost on restart.
    let state = AuthorizationServerState::in_memory(&config);
    tracing::warn!("using the demo subject resolver; every authorization request is auto-approved");

    spawn_compaction_task(state.clone(), config.compaction_interval_secs);

    start_webserver(state, &config).await?;
    Ok(())
}
