use axum::{http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct MetricsRecorder {
    handle: PrometheusHandle,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder");

        // Initialize metrics
        metrics::describe_gauge!(
            "ws_connections_active",
            "Number of registered WebSocket connections"
        );
        metrics::describe_counter!(
            "realtime_events_delivered_total",
            "Total number of realtime events enqueued to connections"
        );
        metrics::describe_counter!(
            "realtime_events_dropped_total",
            "Total number of realtime events dropped on torn-down connections"
        );
        metrics::describe_counter!(
            "chat_messages_sent_total",
            "Total number of chat messages persisted"
        );
        metrics::describe_counter!(
            "push_notifications_sent_total",
            "Total number of push notifications delivered to the gateway"
        );

        Self { handle }
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handler for Prometheus metrics endpoint
pub async fn metrics_handler(handle: axum::extract::State<PrometheusHandle>) -> impl IntoResponse {
    let metrics = handle.render();
    (StatusCode::OK, metrics)
}
