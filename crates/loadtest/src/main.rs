use goose::prelude::*;
use serde_json::{Value, json};

/// Credentials obtained by each simulated user on start.
struct RegisteredClient {
    client_id: String,
    client_secret: String,
}

async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user.get("/healthz").await?;
    Ok(())
}

async fn get_metadata(user: &mut GooseUser) -> TransactionResult {
    let _goose_metrics = user
        .get("/.well-known/oauth-authorization-server")
        .await?;
    Ok(())
}

async fn register_client(user: &mut GooseUser) -> TransactionResult {
    let body = json!({
        "client_name": "Load Test",
        "redirect_uris": ["https://loadtest.example/cb"],
        "scope": "offline_access",
    });
    let goose = user.post_json("/register", &body).await?;
    let registered = match goose.response {
        Ok(response) => response.json::<Value>().await.ok(),
        Err(_) => None,
    };
    if let Some(registered) = registered {
        if let (Some(id), Some(secret)) = (
            registered["client_id"].as_str(),
            registered["client_secret"].as_str(),
        ) {
            user.set_session_data(RegisteredClient {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            });
        }
    }
    Ok(())
}

async fn password_grant_and_revoke(user: &mut GooseUser) -> TransactionResult {
    let params = [
        ("grant_type", "password"),
        ("username", "loadtest"),
        ("password", "loadtest-password"),
    ];
    let goose = user.post_form("/token", &params).await?;
    let access_token = match goose.response {
        Ok(response) => response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["access_token"].as_str().map(String::from)),
        Err(_) => None,
    };

    let credentials = user
        .get_session_data::<RegisteredClient>()
        .map(|c| (c.client_id.clone(), c.client_secret.clone()));
    let (Some(token), Some((client_id, client_secret))) = (access_token, credentials) else {
        return Ok(());
    };
    let params = [
        ("token", token.as_str()),
        ("client_id", client_id.as_str()),
        ("client_secret", client_secret.as_str()),
    ];
    let _goose_metrics = user.post_form("/revoke", &params).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("HealthCheck")
                .register_transaction(transaction!(health_check))
                .register_transaction(transaction!(get_metadata)),
        )
        .register_scenario(
            scenario!("TokenLifecycle")
                .register_transaction(transaction!(register_client).set_on_start())
                .register_transaction(transaction!(password_grant_and_revoke)),
        )
        .execute()
        .await?;

    Ok(())
}
