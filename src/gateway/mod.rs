pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Json, Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use utoipa::OpenApi;

use state::AppState;

/// Build the HTTP router over shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Accounts
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route("/accounts/{id}", get(handlers::get_account))
        .route(
            "/accounts/{id}/{balance}",
            put(handlers::update_account_balance),
        )
        // Transfers
        .route("/transfers", post(handlers::create_transfer))
        .with_state(state)
        // OpenAPI document (stateless, added after with_state)
        .route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}

/// Start HTTP Gateway server; returns after Ctrl-C
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
