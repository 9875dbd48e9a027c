pub mod auth;
pub mod db;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod realtime;

use axum::extract::FromRef;
use std::sync::Arc;

use db::DbPool;
use notifications::{FallbackSelector, PushService};
use realtime::RealtimeState;

/// Shared application state, split into substates via `FromRef` so each
/// handler extracts only what it needs.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: DbPool,
    pub realtime: Arc<RealtimeState>,
    pub push: Arc<PushService>,
    pub fallback: FallbackSelector,
}

impl AppState {
    pub fn new(db_pool: DbPool) -> Self {
        let realtime = Arc::new(RealtimeState::new());
        let fallback = FallbackSelector::new(realtime.registry.clone());
        Self {
            db_pool,
            realtime,
            push: Arc::new(PushService::new()),
            fallback,
        }
    }
}
