use crate::nats::traits::JetStreamPublisher;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared NATS connection with a JetStream context.
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self { client, jetstream })
    }

    /// Create the stream if it does not already exist
    pub async fn ensure_stream(&self, stream_name: &str, subjects: Vec<String>) -> Result<()> {
        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => {
                info!(stream = %stream_name, "Stream already exists");
            }
            Err(_) => {
                self.jetstream
                    .create_stream(StreamConfig {
                        name: stream_name.to_string(),
                        subjects,
                        ..Default::default()
                    })
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %stream_name, "Created stream");
            }
        }

        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Core NATS client for request/reply traffic (directory lookups)
    pub fn core_client(&self) -> async_nats::Client {
        self.client.clone()
    }

    /// Create a JetStreamPublisher trait object from this client
    pub fn create_publisher_client(&self) -> Arc<dyn JetStreamPublisher> {
        Arc::new(NatsJetStreamPublisher::new(self.jetstream.clone()))
    }

    pub async fn close(self) {
        info!("Closing NATS connection");
        // Connection closes when the client is dropped
    }
}

/// Concrete implementation of JetStreamPublisher using async-nats
pub struct NatsJetStreamPublisher {
    context: jetstream::Context,
}

impl NatsJetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamPublisher for NatsJetStreamPublisher {
    #[instrument(skip(self, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish(&self, subject: String, payload: bytes::Bytes) -> Result<()> {
        let ack = self
            .context
            .publish(subject, payload)
            .await
            .context("Failed to publish message to JetStream")?;

        ack.await
            .context("Failed to receive JetStream acknowledgment")?;
        Ok(())
    }
}
