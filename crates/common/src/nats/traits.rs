use anyhow::Result;
use async_trait::async_trait;

/// JetStream publish operations needed by sink producers.
///
/// Abstracted behind a trait so producers can be tested against a mock
/// without a running NATS server.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamPublisher: Send + Sync {
    /// Publish a message to a subject and await the stream acknowledgment
    async fn publish(&self, subject: String, payload: bytes::Bytes) -> Result<()>;
}
