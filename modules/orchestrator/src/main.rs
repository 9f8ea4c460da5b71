use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use event_bus::{KeyStore, RedisKeyStore, RedisStreamBus, StreamBus};

use orchestrator::config::Config;
use orchestrator::handlers::Registry;
use orchestrator::health::{health, metrics};
use orchestrator::services::budget::Budget;
use orchestrator::services::ledger::{CostLedger, LoggingLedger};
use orchestrator::services::mock_providers::{MockContentFetcher, MockEmbeddingProvider};
use orchestrator::services::pulse::PulseChecker;
use orchestrator::{consumer::Worker, db};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().expect("failed to load configuration from environment");

    tracing::info!(host = %config.host, port = config.port, "starting orchestrator");

    let pool = db::init_pool(&config).await.expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let redis_client = redis::Client::open(config.bus_url.clone()).expect("invalid BUS_URL");
    let bus: Arc<dyn StreamBus> = Arc::new(RedisStreamBus::new(redis_client.clone()));
    let key_store: Arc<dyn KeyStore> = Arc::new(RedisKeyStore::new(redis_client));

    let ledger: Arc<dyn CostLedger> = Arc::new(LoggingLedger::new());
    let budget = Arc::new(Budget::with_max_dollars(config.max_dollars));
    let registry = Arc::new(Registry::with_default_handlers());
    let pulse_checker = Arc::new(PulseChecker::new(
        Arc::new(MockContentFetcher),
        Arc::new(MockEmbeddingProvider::new()),
    ));

    let worker = Arc::new(Worker::new(
        bus,
        key_store,
        pool,
        ledger,
        budget,
        registry,
        pulse_checker,
        format!("orchestrator-{}", Uuid::new_v4()),
    ));

    let stop = Arc::new(AtomicBool::new(false));
    let worker_handle = {
        let worker = worker.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            if let Err(err) = worker.run(stop, None).await {
                tracing::error!(error = %err, "worker loop exited with an error");
            }
        })
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "orchestrator HTTP surface listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");

    axum::serve(listener, app).await.expect("server failed to start");

    stop.store(true, std::sync::atomic::Ordering::SeqCst);
    let _ = worker_handle.await;
}
