//! SQS-backed notification transport
//!
//! Wraps the AWS SQS client for the gateway (producer) and the notifier
//! worker (consumer). Messages are JSON-encoded NotificationMessage values.

use crate::config::NotificationConfig;
use crate::errors::{AppError, Result};
use crate::notify::{NotificationMessage, Notifier};
use async_trait::async_trait;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client as SqsClient;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Queue tuning knobs
#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// Queue URL
    pub url: String,
    /// Dead letter queue URL (optional)
    pub dlq_url: Option<String>,
    /// Visibility timeout in seconds
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
    /// Maximum number of messages per poll
    pub max_messages: i32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            dlq_url: None,
            visibility_timeout: 300,
            wait_time_seconds: 20,
            max_messages: 10,
        }
    }
}

impl QueueSettings {
    /// Build settings from the notifications section of the app config.
    /// Returns None when no queue URL is configured.
    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        let url = config.queue_url.clone()?;
        Some(Self {
            url,
            dlq_url: config.dlq_url.clone(),
            visibility_timeout: config.visibility_timeout_secs as i32,
            wait_time_seconds: config.poll_timeout_secs as i32,
            max_messages: config.batch_size as i32,
        })
    }
}

/// SQS queue client wrapper
pub struct Queue {
    client: SqsClient,
    settings: QueueSettings,
}

impl Queue {
    /// Create a new queue client using ambient AWS credentials
    pub async fn new(settings: QueueSettings) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, settings })
    }

    /// Create with an existing SQS client
    pub fn with_client(client: SqsClient, settings: QueueSettings) -> Self {
        Self { client, settings }
    }

    /// Send a message to the queue
    pub async fn send<T: Serialize>(&self, message: &T) -> Result<String> {
        let body = serde_json::to_string(message).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.settings.url)
            .message_body(&body)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to send message: {}", e),
            })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, "Message sent to queue");

        Ok(message_id)
    }

    /// Receive messages from the queue (long poll)
    pub async fn receive(&self) -> Result<Vec<Message>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.settings.url)
            .max_number_of_messages(self.settings.max_messages)
            .visibility_timeout(self.settings.visibility_timeout)
            .wait_time_seconds(self.settings.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after successful processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.settings.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Extend the visibility timeout of an in-flight message
    pub async fn extend_visibility(&self, receipt_handle: &str, additional_seconds: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.settings.url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(additional_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to extend visibility: {}", e),
            })?;

        debug!(additional_seconds, "Extended message visibility");
        Ok(())
    }

    /// Parse a message body as JSON
    pub fn parse_message<T: DeserializeOwned>(message: &Message) -> Result<T> {
        let body = message.body.as_ref().ok_or_else(|| AppError::QueueError {
            message: "Message has no body".to_string(),
        })?;

        serde_json::from_str(body).map_err(|e| AppError::QueueError {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

/// Notifier that publishes booking events to SQS
pub struct SqsNotifier {
    queue: Queue,
}

impl SqsNotifier {
    pub fn new(queue: Queue) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl Notifier for SqsNotifier {
    async fn notify(&self, message: &NotificationMessage) -> Result<()> {
        self.queue.send(message).await?;
        crate::metrics::record_notification_enqueued(message.kind());
        Ok(())
    }
}
