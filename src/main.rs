//! SmartWaste assignment engine entry point.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use smartwaste_engine::api;
use smartwaste_engine::config::Config;
use smartwaste_engine::engine::{Engine, TriggerLoop};
use smartwaste_engine::store::TaskStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let store = Arc::new(TaskStore::open(&config.db_path).with_context(|| {
        format!("failed to open database at {}", config.db_path.display())
    })?);

    let engine = Arc::new(Engine::new(Arc::clone(&store), config.ga.clone()));
    let (trigger, handle) = TriggerLoop::new(engine, Arc::clone(&store), config.poll_interval);
    tokio::spawn(trigger.run());

    let state = Arc::new(api::AppState::new(store, handle));
    let app = api::router(state);

    tracing::info!("assignment engine listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
