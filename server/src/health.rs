use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::{sync::Arc, time::SystemTime};

use crate::{db::DbPool, realtime::RealtimeState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: u64,
    version: String,
    checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    database: CheckStatus,
    realtime: RealtimeHealthStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
}

/// Health status for the realtime subsystem.
#[derive(Debug, Serialize)]
pub struct RealtimeHealthStatus {
    /// Users with a live connection right now
    online_users: usize,
    /// Groups with at least one live subscriber
    live_groups: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    ready: bool,
    database: bool,
}

/// Liveness probe - checks if the application is running
pub async fn liveness() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Readiness probe - checks if the application can serve traffic
pub async fn readiness(State(pool): State<DbPool>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await
        .is_ok();

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}

/// Full health report
pub async fn health(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&pool)
        .await
        .is_ok();

    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "unhealthy" }.to_string(),
        timestamp,
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database: if database_ok {
                CheckStatus::Healthy
            } else {
                CheckStatus::Unhealthy
            },
            realtime: RealtimeHealthStatus {
                online_users: realtime.registry.len(),
                live_groups: realtime.groups.live_group_count(),
            },
        },
    };

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
