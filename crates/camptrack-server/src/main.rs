mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use camptrack_fetcher::FetcherRegistry;
use camptrack_pipeline::{
    BatchAggregator, JobProcessor, JobQueue, PgCache, PgStore, ProcessorConfig, ResponseCache,
};
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, default_rate_limit_state, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = camptrack_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = camptrack_db::PoolConfig::from_app_config(&config);
    let pool = camptrack_db::connect_pool(&config.database_url, pool_config).await?;
    camptrack_db::run_migrations(&pool).await?;

    let registry = Arc::new(FetcherRegistry::from_config(&config)?);
    let cache: Arc<dyn ResponseCache> = Arc::new(PgCache::new(pool.clone()));
    let store = Arc::new(PgStore::new(pool.clone()));
    let aggregator = Arc::new(BatchAggregator::from_config(
        registry,
        Arc::clone(&cache),
        &config,
    ));

    let processor = Arc::new(JobProcessor::new(
        store.clone(),
        store.clone(),
        Arc::clone(&aggregator),
        ProcessorConfig::from_app_config(&config),
    ));
    let _scheduler = scheduler::build_scheduler(processor, cache, &config).await?;

    let state = AppState {
        pool,
        aggregator,
        queue: JobQueue::new(store.clone()),
        metrics: store,
    };
    let app = build_app(state, default_rate_limit_state());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "camptrack-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
