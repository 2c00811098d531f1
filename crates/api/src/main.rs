//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use api::discount_client::HttpDiscountLookup;
use domain::{DiscountLookup, InMemoryRepository, Repository};
use metrics_exporter_prometheus::PrometheusHandle;
use store::PostgresRepository;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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

fn discount_source(config: &Config) -> Arc<dyn DiscountLookup> {
    match &config.discount_service_url {
        Some(url) => {
            let client = HttpDiscountLookup::new(url, config.discount_timeout)
                .expect("failed to create discount client");
            tracing::info!(%url, timeout_ms = config.discount_timeout.as_millis() as u64, "using discount service");
            Arc::new(client)
        }
        None => {
            tracing::info!(
                categories = config.static_discounts.len(),
                "using static discount table"
            );
            Arc::new(config.static_discounts.clone())
        }
    }
}

async fn serve<R: Repository>(
    config: &Config,
    repository: R,
    discounts: Arc<dyn DiscountLookup>,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(repository, discounts);
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let config = Config::from_env().expect("invalid configuration");

    // 2. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 3. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 4. Pick the discount source and the repository, then serve
    let discounts = discount_source(&config);

    match &config.database_url {
        Some(url) => {
            let repository = PostgresRepository::connect(url, config.database_max_connections)
                .await
                .expect("failed to connect to PostgreSQL");
            repository
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL repository");
            serve(&config, repository, discounts, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state is kept in memory only");
            serve(&config, InMemoryRepository::new(), discounts, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
