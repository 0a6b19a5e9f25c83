use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::fmt::init;

use mockinterview_api::{
    config::{Config, StorageBackend},
    services::{
        clock::SystemClock,
        stats_service::StatsService,
        stats_worker::StatsWorker,
        store::{MongoStore, Stores},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::load()?;
    if config.storage_backend == StorageBackend::Memory {
        anyhow::bail!("stats worker needs a persistent storage backend");
    }

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
    let zone = config.calendar_zone();
    let store = Arc::new(MongoStore::new(
        mongo_client.database(&config.mongo_database),
        zone,
    ));
    let stores = Stores::mongo(store);

    let stats = StatsService::new(
        stores.sessions.clone(),
        stores.stats.clone(),
        Arc::new(SystemClock::new(zone)),
    );
    let worker = StatsWorker::new(
        stores.sessions,
        stats,
        Duration::from_secs(config.stats_worker_interval_secs),
    );

    worker.run().await?;

    Ok(())
}
