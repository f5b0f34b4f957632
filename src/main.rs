use anyhow::{Context, Result};
use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use ls_apply::application::DraftStore;
use ls_apply::config::Config;
use ls_apply::discord::DiscordClient;
use ls_apply::interactions::interactions_router;
use ls_apply::sweep::startup_sweep;
use ls_apply::AppState;

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "ls-apply"
    })))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Lone Samurai application bot");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");
    let port = config.port;

    let discord = DiscordClient::new(config.bot_token.clone());

    // Who we are; needed to recognise our welcome prompt and to register
    // commands. Failing here means the token is bad, so failing hard is right.
    let me = discord
        .current_user()
        .await
        .context("Failed to fetch the bot's own user")?;
    let application = discord
        .current_application()
        .await
        .context("Failed to fetch the application id")?;
    info!("Logged in as {} ({})", me.username, me.id);

    let app_state = Arc::new(AppState {
        config,
        discord,
        bot_user_id: me.id,
        application_id: application.id,
        drafts: DraftStore::new(),
    });

    // Command registration and the welcome prompt happen off the serving
    // path, so a slow Discord never delays the interactions endpoint.
    tokio::spawn(startup_sweep(app_state.clone()));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(interactions_router(app_state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Server listening on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
