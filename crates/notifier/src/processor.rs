//! Webhook delivery
//!
//! Pushes booking events to the configured webhook with exponential
//! backoff. Delivery is at-least-once: a message is only deleted from the
//! queue after the webhook acknowledged it, so a crash between delivery
//! and deletion replays the message.

use backoff::{future::retry, ExponentialBackoff};
use seatwise_common::errors::{AppError, Result};
use seatwise_common::notify::NotificationMessage;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delivery tuning
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Webhook endpoint; None means log-only delivery
    pub webhook_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Give up after this much total elapsed retry time
    pub max_elapsed: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

/// Delivers notification messages to the webhook
pub struct DeliveryProcessor {
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl DeliveryProcessor {
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Deliver one message, retrying transient failures with backoff
    pub async fn deliver(&self, message: &NotificationMessage) -> Result<()> {
        let Some(url) = self.config.webhook_url.as_deref() else {
            info!(
                kind = message.kind(),
                user_id = %message.user_id(),
                "No webhook configured, notification logged only"
            );
            seatwise_common::metrics::record_notification(message.kind(), true);
            return Ok(());
        };

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.config.max_elapsed),
            ..Default::default()
        };

        let outcome = retry(policy, || async {
            self.post_once(url, message).await.map_err(|err| {
                warn!(kind = message.kind(), error = %err, "Webhook delivery attempt failed");
                backoff::Error::transient(err)
            })
        })
        .await;

        match outcome {
            Ok(()) => {
                seatwise_common::metrics::record_notification(message.kind(), true);
                debug!(kind = message.kind(), "Notification delivered");
                Ok(())
            }
            Err(err) => {
                seatwise_common::metrics::record_notification(message.kind(), false);
                Err(err)
            }
        }
    }

    async fn post_once(&self, url: &str, message: &NotificationMessage) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| AppError::NotificationError {
                message: format!("Webhook request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(AppError::NotificationError {
                message: format!("Webhook returned {}", response.status()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_log_only_delivery_succeeds() {
        let processor = DeliveryProcessor::new(DeliveryConfig::default()).unwrap();
        let message = NotificationMessage::BookingCancelled {
            user_id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            movie_title: "Ran".to_string(),
            start_time: Utc::now(),
        };

        processor.deliver(&message).await.unwrap();
    }
}
