use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EnrichedEvent, EnrichedEventSink};
use common::nats::JetStreamPublisher;
use std::sync::Arc;
use tracing::debug;

/// Sink that durably records enriched events on a JetStream stream.
///
/// Events are published JSON-encoded to `{base_subject}.{device_id}`.
pub struct NatsEnrichedEventSink {
    publisher: Arc<dyn JetStreamPublisher>,
    base_subject: String,
}

impl NatsEnrichedEventSink {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, base_subject: String) -> Self {
        debug!(base_subject = %base_subject, "initialized NatsEnrichedEventSink");
        Self {
            publisher,
            base_subject,
        }
    }
}

#[async_trait]
impl EnrichedEventSink for NatsEnrichedEventSink {
    async fn log(&self, event: &EnrichedEvent) -> DomainResult<()> {
        let payload =
            serde_json::to_vec(event).map_err(|e| DomainError::SinkError(e.into()))?;

        let subject = format!("{}.{}", self.base_subject, event.event.device_id);

        self.publisher
            .publish(subject, payload.into())
            .await
            .map_err(DomainError::SinkError)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{RegistryLookupResult, RuleType, TelemetryEvent};
    use common::nats::MockJetStreamPublisher;
    use std::collections::HashMap;

    fn enriched_event() -> EnrichedEvent {
        EnrichedEvent {
            event: TelemetryEvent {
                device_id: "test-device-001".to_string(),
                client_id: "test-device-001".to_string(),
                occurred_at: chrono::Utc::now(),
                rule_type: RuleType::DescribeThing,
                payload: serde_json::Map::new(),
            },
            result: RegistryLookupResult::Attributes(HashMap::from([(
                "deviceType".to_string(),
                "sensor".to_string(),
            )])),
            enriched_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publishes_to_device_scoped_subject() {
        // Arrange
        let mut mock_publisher = MockJetStreamPublisher::new();
        mock_publisher
            .expect_publish()
            .withf(|subject: &String, payload: &bytes::Bytes| {
                subject == "enriched.test-device-001" && !payload.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let sink = NatsEnrichedEventSink::new(Arc::new(mock_publisher), "enriched".to_string());

        // Act
        let result = sink.log(&enriched_event()).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_publish_failure_maps_to_sink_error() {
        // Arrange
        let mut mock_publisher = MockJetStreamPublisher::new();
        mock_publisher
            .expect_publish()
            .times(1)
            .return_once(|_, _| Err(anyhow::anyhow!("stream unavailable")));

        let sink = NatsEnrichedEventSink::new(Arc::new(mock_publisher), "enriched".to_string());

        // Act
        let result = sink.log(&enriched_event()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::SinkError(_))));
    }

    #[tokio::test]
    async fn test_published_payload_round_trips() {
        // Arrange
        let event = enriched_event();
        let expected = event.clone();

        let mut mock_publisher = MockJetStreamPublisher::new();
        mock_publisher
            .expect_publish()
            .withf(move |_subject: &String, payload: &bytes::Bytes| {
                let decoded: EnrichedEvent = serde_json::from_slice(payload).unwrap();
                decoded.result == expected.result
                    && decoded.event.device_id == expected.event.device_id
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let sink = NatsEnrichedEventSink::new(Arc::new(mock_publisher), "enriched".to_string());

        // Act & Assert
        assert!(sink.log(&event).await.is_ok());
    }
}
