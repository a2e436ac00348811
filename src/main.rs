use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bbm_api::cache::DbCache;
use bbm_api::config::Config;
use bbm_api::store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!("loading database...");
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    db.bootstrap().await?;

    match db.integrity_check().await {
        Ok(()) => info!("database health check: ok"),
        Err(e) => error!("database health check: {e}"),
    }

    let cache = DbCache::new();
    cache.refresh_all(&db).await?;

    let refresh_task = cache.clone().spawn_refresh_task(&db, config.cache_refresh);
    let integrity_task = db.spawn_integrity_task(config.integrity_check);

    // The HTTP layer, uploads and auth live in their own services; this
    // process owns the store, the cache and the moderation queue.
    info!("store ready");
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    refresh_task.abort();
    integrity_task.abort();
    Ok(())
}
