//! Seatwise Notification Worker
//!
//! Consumes booking events from the SQS queue and delivers them to the
//! configured webhook:
//! 1. Receives a batch of messages (long poll)
//! 2. Delivers each to the webhook with backoff
//! 3. Deletes delivered messages; failures are redelivered or land in
//!    the DLQ per queue policy
//!
//! Delivery is at-least-once and unordered.

mod processor;

use crate::processor::{DeliveryConfig, DeliveryProcessor};
use seatwise_common::{
    config::AppConfig,
    notify::{NotificationMessage, Queue, QueueSettings},
    VERSION,
};
use std::time::Duration;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Seatwise Notification Worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let processor = DeliveryProcessor::new(DeliveryConfig {
        webhook_url: config.notifications.webhook_url.clone(),
        timeout: Duration::from_secs(config.notifications.webhook_timeout_secs),
        ..Default::default()
    })?;

    // Connect to the notification queue
    let queue = match QueueSettings::from_config(&config.notifications) {
        Some(settings) => {
            info!(url = %settings.url, "Connecting to notification queue...");
            Queue::new(settings).await?
        }
        None => {
            warn!("No notification queue configured, waiting for shutdown signal...");
            tokio::signal::ctrl_c().await?;
            info!("Notification worker shutting down");
            return Ok(());
        }
    };

    info!("Notification worker ready, starting queue polling...");

    // Circuit breaker state
    let mut consecutive_failures = 0;
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: Duration = Duration::from_secs(30);

    // Start polling loop
    loop {
        // Circuit breaker check
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = queue.receive() => {
                match result {
                    Ok(messages) => {
                        for raw in messages {
                            let receipt_handle = raw.receipt_handle.clone().unwrap_or_default();

                            let message: NotificationMessage =
                                match Queue::parse_message(&raw) {
                                    Ok(message) => message,
                                    Err(e) => {
                                        // Poison message; drop it rather than
                                        // redeliver forever
                                        error!(error = %e, "Unparseable message, deleting");
                                        if let Err(e) = queue.delete(&receipt_handle).await {
                                            error!(error = %e, "Failed to delete message");
                                        }
                                        continue;
                                    }
                                };

                            info!(
                                kind = message.kind(),
                                user_id = %message.user_id(),
                                "Received notification"
                            );

                            match processor.deliver(&message).await {
                                Ok(()) => {
                                    consecutive_failures = 0;
                                    // Delete message on success
                                    if let Err(e) = queue.delete(&receipt_handle).await {
                                        error!(error = %e, "Failed to delete message");
                                    }
                                }
                                Err(e) => {
                                    consecutive_failures += 1;
                                    error!(
                                        kind = message.kind(),
                                        error = %e,
                                        failures = consecutive_failures,
                                        "Failed to deliver notification"
                                    );
                                    // Message will be re-delivered or moved to DLQ
                                }
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Notification worker shutting down");
    Ok(())
}
