mod extension;
mod problem;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use jobtrack_core::clock::{system_clock, uuid_generator};
use jobtrack_storage::{Database, Repositories};
use jobtrack_util::{load_env_file, AppConfig, StorageBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let repositories = match &config.storage {
        StorageBackend::Memory => Repositories::in_memory(uuid_generator(), system_clock()),
        StorageBackend::Sqlite { url } => {
            let database = Database::connect(url).await?;
            database.run_migrations().await?;
            Repositories::sqlite(&database, uuid_generator(), system_clock())
        }
    };

    if config.extension_api_key.is_none() {
        tracing::warn!(
            stage = "app",
            "EXTENSION_API_KEY is not set; extension ingestion is disabled"
        );
    }

    let state = router::AppState::new(metrics, repositories, config.extension_api_key.clone());

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        storage = config.storage.as_str(),
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
