//! Herald API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_common::db::create_pool;
use herald_common::redis_pool::create_redis_pool;
use herald_engine::grouping::GroupingEngine;
use herald_engine::handlers::PipelineHandler;
use herald_engine::router::DeliveryRouter;
use herald_events::{EventBus, EventKind};
use herald_fanout::{ConnectionRegistry, Fanout};
use herald_notifier::email::EmailAdapter;
use herald_notifier::push::PushAdapter;

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_api=debug,herald_engine=debug,herald_fanout=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting Herald API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Create Redis connection
    let redis = create_redis_pool(&config.redis_url).await?;

    // Real-time fanout: local registry + backplane subscriber
    let fanout = Arc::new(Fanout::new(Arc::new(ConnectionRegistry::new()), redis));
    tokio::spawn(Arc::clone(&fanout).run_subscriber(config.redis_url.clone()));

    // Delivery router with the configured channel adapters
    let mut router = DeliveryRouter::new(
        pool.clone(),
        Arc::clone(&fanout),
        Duration::from_secs(config.delivery_timeout_secs),
    );
    if let (Some(api_key), Some(from)) = (&config.resend_api_key, &config.email_from) {
        router = router.with_adapter(Arc::new(EmailAdapter::new(api_key.clone(), from.clone())));
        tracing::info!("Email delivery enabled");
    }
    if let Some(gateway_url) = &config.push_gateway_url {
        router = router.with_adapter(Arc::new(PushAdapter::new(gateway_url.clone())));
        tracing::info!("Push delivery enabled");
    }
    let router = Arc::new(router);

    // Event bus with the pipeline registered for every event kind
    let pipeline = Arc::new(PipelineHandler::new(
        pool.clone(),
        GroupingEngine::new(config.group_window_secs),
        router,
    ));
    let mut bus = EventBus::new();
    for kind in EventKind::ALL {
        bus.subscribe(kind, pipeline.clone());
    }
    let bus = Arc::new(bus);

    // Build application state
    let state = AppState::new(pool, config, bus, Arc::clone(&fanout));

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fanout))
        .await?;

    tracing::info!("Herald API server stopped.");
    Ok(())
}

/// Wait for ctrl-c, then close every live WebSocket before the server
/// stops accepting connections.
async fn shutdown_signal(fanout: Arc<Fanout>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
    fanout.registry().shutdown_all().await;
}
