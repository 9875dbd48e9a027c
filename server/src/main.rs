use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bazaar_server::{db, handlers, health, metrics, realtime, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    tracing::info!("Starting Bazaar chat server");

    // Initialize metrics
    let metrics_recorder = metrics::MetricsRecorder::new();
    let metrics_handle = metrics_recorder.handle().clone();
    tracing::info!("Metrics initialized");

    // Initialize database
    let db_pool = db::init_db_default().await?;
    tracing::info!("Database initialized");

    // Presence registry, group tracker, router, push fallback
    let app_state = AppState::new(db_pool);
    tracing::info!("Realtime state initialized");

    // Build application router
    let metrics_router = Router::new()
        .route("/metrics", get(metrics::metrics_handler))
        .with_state(metrics_handle);

    let app = Router::new()
        // Health check endpoints
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // Chat socket
        .route("/ws/chat", get(realtime::chat_socket))
        // Direct messages
        .route("/api/chat/messages", post(handlers::send_message))
        .route("/api/chat/messages", get(handlers::get_messages))
        .route("/api/chat/messages/seen", post(handlers::mark_seen))
        .route("/api/chat/messages/delete", post(handlers::delete_messages))
        .route("/api/chat/messages/edit", post(handlers::edit_message))
        // Group chats
        .route("/api/chat/groups", post(handlers::create_group))
        .route("/api/chat/groups", get(handlers::get_groups))
        .route(
            "/api/chat/groups/{group_id}/messages",
            post(handlers::send_group_message),
        )
        .route(
            "/api/chat/groups/{group_id}/messages",
            get(handlers::get_group_messages),
        )
        .route(
            "/api/chat/groups/{group_id}/members",
            post(handlers::update_group_members),
        )
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let port = std::env::var("SERVER_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
