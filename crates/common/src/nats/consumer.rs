use anyhow::{Context, Result};
use futures::{future::BoxFuture, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use async_nats::jetstream::{self, consumer::PullConsumer, AckKind};

/// What the consumer should do with a message after processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge the message, it will not be redelivered
    Ack,
    /// Reject the message for redelivery, with an optional reason for the logs
    Retry(Option<String>),
}

/// Owned view of an inbound message handed to the processor.
///
/// The processor never sees the JetStream message itself; acknowledgment
/// stays with the consumer.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: bytes::Bytes,
}

/// Per-message processor function. Deserialization and business logic live
/// here; fetching and acknowledgment live in the consumer.
pub type MessageProcessor =
    Box<dyn Fn(InboundMessage) -> BoxFuture<'static, Disposition> + Send + Sync>;

/// Durable JetStream pull consumer that feeds messages one at a time through
/// a processor and acks or naks based on its disposition.
pub struct NatsConsumer {
    consumer: PullConsumer,
    batch_size: usize,
    max_wait: Duration,
    processor: MessageProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: MessageProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .context("Failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    if let Err(e) = result {
                        error!(error = %e, "Error processing batch");
                        // Continue consuming despite errors
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        while let Some(result) = messages.next().await {
            let message = match result {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(error = %e, "Error receiving message from batch");
                    continue;
                }
            };

            let inbound = InboundMessage {
                subject: message.subject.to_string(),
                payload: message.payload.clone(),
            };

            match (self.processor)(inbound).await {
                Disposition::Ack => {
                    if let Err(e) = message.ack().await {
                        error!(error = %e, subject = %message.subject, "Failed to acknowledge message");
                    }
                }
                Disposition::Retry(reason) => {
                    warn!(
                        subject = %message.subject,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "Rejecting message for redelivery"
                    );
                    if let Err(e) = message.ack_with(AckKind::Nak(None)).await {
                        error!(error = %e, subject = %message.subject, "Failed to reject message");
                    }
                }
            }
        }

        Ok(())
    }
}
