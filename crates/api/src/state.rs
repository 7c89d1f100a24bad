//! Shared application state for the Axum API server.

use std::sync::Arc;

use sqlx::PgPool;

use herald_common::config::AppConfig;
use herald_events::EventBus;
use herald_fanout::Fanout;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub bus: Arc<EventBus>,
    pub fanout: Arc<Fanout>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, bus: Arc<EventBus>, fanout: Arc<Fanout>) -> Self {
        Self {
            pool,
            config,
            bus,
            fanout,
        }
    }
}
