use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use trademark_search::config::{AppConfig, LoadMode, StoreBackend};
use trademark_search::core::store::{DocumentStore, ElasticsearchStore, MemoryStore};
use trademark_search::core::trademark::TrademarkService;
use trademark_search::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load();

    // Initialize logging
    let _log_guard = trademark_search::core::logging::init(&config.log);
    log::info!("{} v{} starting", trademark_search::NAME, trademark_search::VERSION);

    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Elasticsearch => {
            let es = ElasticsearchStore::from_config(&config.elasticsearch)
                .context("failed to build Elasticsearch client")?;
            Arc::new(es)
        }
        StoreBackend::Memory => {
            log::warn!("Using the in-memory store; documents are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    match store.info().await {
        Ok(info) => log::info!("Connected to {} {}", info.engine, info.version),
        Err(e) => log::error!("Search engine not reachable: {}", e),
    }

    let service = Arc::new(TrademarkService::new(store, &config));
    log::info!("Index init mode: {:?}", config.data.init_mode);
    if let Err(e) = service.ensure_index().await {
        log::error!("Index provisioning failed: {}", e);
    }

    if config.data.load_mode == LoadMode::Auto {
        let path = &config.data.file_path;
        if path.exists() {
            match service.auto_load(path).await {
                Ok(Some(summary)) => log::info!(
                    "Startup load: {} loaded, {} failed",
                    summary.success,
                    summary.failed
                ),
                Ok(None) => {}
                Err(e) => log::error!("Startup load from {} failed: {}", path.display(), e),
            }
        } else {
            log::error!("Data file not found: {}", path.display());
        }
    } else {
        log::info!("Manual load mode; use POST /api/trademarks/load-data");
    }

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind address '{}'", config.server.bind))?;
    server::serve(addr, AppState::new(service, &config.data))
        .await
        .context("HTTP server failed")?;

    log::info!("{} stopped", trademark_search::NAME);
    Ok(())
}
