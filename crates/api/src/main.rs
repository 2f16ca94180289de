//! API server entry point.

use api::config::{Config, LogFormat};
use api::{AppState, AppStore, seed, sweeper};
use checkout::InMemoryCatalog;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (json, text) = match config.log_format {
        LogFormat::Json => (Some(tracing_subscriber::fmt::layer().json()), None),
        LogFormat::Text => (None, Some(tracing_subscriber::fmt::layer())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .init();
}

async fn serve<S: AppStore>(
    store: S,
    catalog: InMemoryCatalog,
    config: &Config,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = AppState::from_config(store, catalog, config);
    if state.dev_routes {
        tracing::warn!(environment = %config.environment, "payment simulation routes enabled");
    }
    if state.verifier.config().secret.is_none() && !state.verifier.config().unsigned_mode() {
        tracing::warn!("no PAYMENT_WEBHOOK_SECRET configured, payment notifications will be rejected");
    }

    let sweeper = sweeper::spawn_expiry_sweeper(state.clone(), config.expiry_sweep_interval);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Seed the catalog
    let catalog = match &config.catalog_seed_file {
        Some(path) => seed::load_catalog(path).await?,
        None => {
            tracing::info!("no CATALOG_SEED_FILE set, using the demo catalog");
            seed::demo_catalog()
        }
    };

    // 4. Pick the store and serve
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.run_migrations().await?;
            tracing::info!("connected to Postgres");
            serve(store, catalog, &config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            serve(InMemoryStore::new(), catalog, &config, metrics_handle).await
        }
    }
}
