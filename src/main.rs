//! simple_bank - HTTP ledger service
//!
//! Usage:
//!   simple_bank [--env dev] [--port 8080]
//!
//! Runs on PostgreSQL when `postgres_url` (or `DATABASE_URL`) is set,
//! otherwise on the in-memory store.

use std::sync::Arc;

use anyhow::Context;
use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::ledger::{MemoryStore, PgStore, Store};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let lock_timeout = config.transfer.lock_timeout();

    match &config.postgres_url {
        Some(url) => {
            let db = Database::connect(url, config.db_max_connections)
                .await
                .context("Failed to connect to PostgreSQL")?;
            db.migrate().await.context("Failed to run migrations")?;
            Ok(Arc::new(PgStore::with_lock_timeout(
                db.pool().clone(),
                lock_timeout,
            )))
        }
        None => {
            tracing::warn!("No postgres_url configured; balances live in memory only");
            Ok(Arc::new(MemoryStore::with_lock_timeout(lock_timeout)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = simple_bank::logging::init_logging(&app_config);

    tracing::info!(
        git_hash = env!("GIT_HASH"),
        "Starting simple_bank in {} mode",
        env
    );

    let store = open_store(&app_config).await?;
    tracing::info!(store = store.name(), "Ledger store ready");

    let state = Arc::new(AppState::new(store, app_config.transfer.retry_policy()));

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    gateway::run_server(&app_config.gateway.host, port, state).await
}
