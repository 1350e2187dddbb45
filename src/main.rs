mod api;
mod config;
mod db;
mod ledger;
mod pagination;
mod reducers;
mod store;
mod sync;

use std::env;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use api::AppState;
use config::AppConfig;
use db::DbPool;
use reducers::ReducerPipeline;
use store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load(Path::new("config/config.json"))?;
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL environment variable is not set")?;

    let pool = Arc::new(DbPool::new(&database_url).await?);
    pool.run_migrations(Path::new("migrations")).await?;
    tracing::info!(network = ?config.network, "migrations applied, starting services");

    let store = Arc::new(Store::new(pool));
    let pipeline = Arc::new(ReducerPipeline::new(store.clone()));
    let state = AppState {
        store,
        network: config.network,
        genesis_timestamp: config.genesis_timestamp,
    };

    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    let feed_listen = config.feed_listen.clone();
    tasks.spawn(async move {
        sync::run(&feed_listen, pipeline)
            .await
            .context("chain-sync feed failed")
    });

    let api_listen = config.api_listen.clone();
    tasks.spawn(async move { api::serve(&api_listen, state).await });

    // Either service exiting is fatal; surface the first result.
    while let Some(result) = tasks.join_next().await {
        result??;
    }
    Ok(())
}
