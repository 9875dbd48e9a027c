//! Push notification dispatch for recipients without a live connection.
//!
//! The decision of *whether* to push lives in [`fallback::FallbackSelector`];
//! this service only performs the delivery, POSTing to an external push
//! gateway per device token. Disabled unless `ENABLE_PUSH_NOTIFICATIONS`
//! is set, in which case every call is a logged no-op.

pub mod fallback;

pub use fallback::FallbackSelector;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

const MAX_RETRIES: u8 = 3;

pub struct PushService {
    client: reqwest::Client,
    gateway_url: Option<String>,
    enabled: bool,
}

impl PushService {
    pub fn new() -> Self {
        let enabled = std::env::var("ENABLE_PUSH_NOTIFICATIONS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !enabled {
            info!("Push service disabled (set ENABLE_PUSH_NOTIFICATIONS=1 to enable)");
            return Self {
                client: reqwest::Client::new(),
                gateway_url: None,
                enabled: false,
            };
        }

        let gateway_url = match std::env::var("PUSH_GATEWAY_URL") {
            Ok(url) => Some(url),
            Err(_) => {
                warn!("PUSH_GATEWAY_URL not set; push notifications disabled");
                None
            }
        };
        let enabled = gateway_url.is_some();

        if enabled {
            info!("Push service enabled");
        }

        Self {
            client: reqwest::Client::new(),
            gateway_url,
            enabled,
        }
    }

    /// Notify an offline direct-message recipient on every registered
    /// device.
    pub async fn notify_direct_message(
        &self,
        pool: &PgPool,
        recipient_id: &str,
        sender_id: &str,
        preview: &str,
    ) -> Result<()> {
        if !self.enabled {
            debug!("Push disabled, skipping direct-message notification");
            return Ok(());
        }

        let tokens = crate::db::push_tokens_for(pool, recipient_id)
            .await
            .context("Failed to load device tokens")?;

        if tokens.is_empty() {
            debug!(recipient_id, "No device tokens registered, nothing to push");
            return Ok(());
        }

        let payload = json!({
            "kind": "directMessage",
            "senderId": sender_id,
            "preview": preview,
        });

        self.dispatch_to_tokens(&tokens, &payload).await;
        Ok(())
    }

    /// Notify the offline members of a group. The caller has already
    /// filtered the member list down to unreachable users and removed the
    /// sender.
    pub async fn notify_group_message(
        &self,
        pool: &PgPool,
        group_id: &str,
        sender_id: &str,
        offline_member_ids: &[String],
        preview: &str,
    ) -> Result<()> {
        if !self.enabled || offline_member_ids.is_empty() {
            return Ok(());
        }

        let payload = json!({
            "kind": "groupMessage",
            "groupId": group_id,
            "senderId": sender_id,
            "preview": preview,
        });

        for member_id in offline_member_ids {
            let tokens = crate::db::push_tokens_for(pool, member_id)
                .await
                .context("Failed to load device tokens")?;
            self.dispatch_to_tokens(&tokens, &payload).await;
        }
        Ok(())
    }

    /// Send one gateway request per device token, with bounded retries.
    /// A token that exhausts its retries is logged and skipped; the rest
    /// still get their notification.
    async fn dispatch_to_tokens(&self, tokens: &[String], payload: &serde_json::Value) {
        let Some(gateway_url) = self.gateway_url.as_deref() else {
            return;
        };

        let mut success_count = 0;
        let mut error_count = 0;

        for token in tokens {
            let body = json!({
                "to": token,
                "data": payload,
            });

            let mut backoff_ms = 100;
            let mut delivered = false;
            for attempt in 1..=MAX_RETRIES {
                match self.client.post(gateway_url).json(&body).send().await {
                    Ok(response) if response.status().is_success() => {
                        delivered = true;
                        break;
                    }
                    Ok(response) => {
                        warn!(
                            status = %response.status(),
                            attempt,
                            "Push gateway returned non-success status"
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, attempt, "Push gateway request failed");
                    }
                }
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }

            if delivered {
                success_count += 1;
                metrics::counter!("push_notifications_sent_total", 1);
            } else {
                error_count += 1;
                error!("Push notification failed after maximum retries");
            }
        }

        info!(
            success = success_count,
            errors = error_count,
            "Push notifications dispatched"
        );
    }
}

impl Default for PushService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_service_is_disabled_without_env() {
        let service = PushService::new();
        assert!(!service.enabled);
    }
}
