use common::domain::{
    DeviceRegistry, EnrichedEvent, EnrichedEventSink, LookupFailureReason, RegistryLookupResult,
    RuleType, TelemetryEvent,
};
use common::validation::validate_struct;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Design default for the directory-service call bound
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Domain service that enriches telemetry events with registry metadata
///
/// Flow:
/// 1. Validate the event and dispatch on its rule type
/// 2. Query the directory service (attributes or group memberships),
///    bounded by the lookup timeout
/// 3. Attach the result, or an explicit failure marker, to the event
/// 4. Forward the enriched event to the sink, best-effort
///
/// `enrich` is structurally infallible: every event in produces exactly one
/// enriched event out, and lookup failures are encoded as data.
pub struct EnrichmentService {
    registry: Arc<dyn DeviceRegistry>,
    sink: Arc<dyn EnrichedEventSink>,
    lookup_timeout: Duration,
}

impl EnrichmentService {
    /// Create a new EnrichmentService with dependencies
    pub fn new(registry: Arc<dyn DeviceRegistry>, sink: Arc<dyn EnrichedEventSink>) -> Self {
        Self {
            registry,
            sink,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Enrich an event with registry data and forward it to the sink
    #[instrument(skip(self, event), fields(device_id = %event.device_id, rule_type = %event.rule_type))]
    pub async fn enrich(&self, event: TelemetryEvent) -> EnrichedEvent {
        let result = self.lookup(&event).await;

        if let RegistryLookupResult::Failure { reason } = &result {
            debug!(reason = ?reason, "lookup failed, encoding failure into event");
        }

        let enriched = EnrichedEvent {
            event,
            result,
            enriched_at: chrono::Utc::now(),
        };

        // Best-effort sink delivery: a failure here is reported but never
        // alters the enriched event already produced
        if let Err(e) = self.sink.log(&enriched).await {
            warn!(
                error = %e,
                device_id = %enriched.event.device_id,
                "failed to deliver enriched event to sink"
            );
        }

        enriched
    }

    async fn lookup(&self, event: &TelemetryEvent) -> RegistryLookupResult {
        // Fail closed before issuing any directory call
        if let Err(e) = validate_struct(event) {
            warn!(error = %e, "rejecting event that failed validation");
            return RegistryLookupResult::failure(LookupFailureReason::Unknown);
        }

        match event.rule_type {
            RuleType::DescribeThing => {
                match tokio::time::timeout(
                    self.lookup_timeout,
                    self.registry.describe_device(&event.device_id),
                )
                .await
                {
                    Err(_) => {
                        warn!(
                            timeout_secs = self.lookup_timeout.as_secs(),
                            "directory lookup timed out"
                        );
                        RegistryLookupResult::failure(LookupFailureReason::Throttled)
                    }
                    Ok(Ok(attributes)) => RegistryLookupResult::Attributes(attributes),
                    Ok(Err(e)) => {
                        warn!(error = %e, "describe_device lookup failed");
                        RegistryLookupResult::failure((&e).into())
                    }
                }
            }
            RuleType::ListThingGroups => {
                match tokio::time::timeout(
                    self.lookup_timeout,
                    self.registry.list_groups(&event.device_id),
                )
                .await
                {
                    Err(_) => {
                        warn!(
                            timeout_secs = self.lookup_timeout.as_secs(),
                            "directory lookup timed out"
                        );
                        RegistryLookupResult::failure(LookupFailureReason::Throttled)
                    }
                    Ok(Ok(groups)) => RegistryLookupResult::Groups(groups),
                    Ok(Err(e)) => {
                        warn!(error = %e, "list_groups lookup failed");
                        RegistryLookupResult::failure((&e).into())
                    }
                }
            }
            RuleType::Unknown => {
                warn!("unrecognized rule type, failing closed without directory call");
                RegistryLookupResult::failure(LookupFailureReason::Unknown)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{MockDeviceRegistry, MockEnrichedEventSink, RegistryError};
    use common::DomainError;
    use std::collections::HashMap;
    use std::str::FromStr;

    fn telemetry_event(device_id: &str, rule_type: RuleType) -> TelemetryEvent {
        let mut payload = serde_json::Map::new();
        payload.insert(
            "timestamp".to_string(),
            serde_json::json!(1_700_000_000_000_i64),
        );
        TelemetryEvent {
            device_id: device_id.to_string(),
            client_id: device_id.to_string(),
            occurred_at: chrono::Utc::now(),
            rule_type,
            payload,
        }
    }

    fn accepting_sink() -> MockEnrichedEventSink {
        let mut sink = MockEnrichedEventSink::new();
        sink.expect_log().times(1).returning(|_| Ok(()));
        sink
    }

    #[tokio::test]
    async fn test_describe_thing_attaches_attributes() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_describe_device()
            .withf(|id: &str| id == "test-device-001")
            .times(1)
            .return_once(|_| {
                Ok(HashMap::from([(
                    "deviceType".to_string(),
                    "sensor".to_string(),
                )]))
            });

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::DescribeThing))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::Attributes(HashMap::from([(
                "deviceType".to_string(),
                "sensor".to_string()
            )]))
        );
        assert_eq!(enriched.event.device_id, "test-device-001");
    }

    #[tokio::test]
    async fn test_list_thing_groups_attaches_groups() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_list_groups()
            .withf(|id: &str| id == "test-device-001")
            .times(1)
            .return_once(|_| Ok(vec!["production-devices".to_string()]));

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::ListThingGroups))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::Groups(vec!["production-devices".to_string()])
        );
    }

    #[tokio::test]
    async fn test_device_not_found_encodes_failure() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_describe_device()
            .withf(|id: &str| id == "ghost-001")
            .times(1)
            .return_once(|id| Err(RegistryError::NotFound(id.to_string())));

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("ghost-001", RuleType::DescribeThing))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::NotFound)
        );
    }

    #[tokio::test]
    async fn test_access_denied_encodes_failure() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_list_groups()
            .times(1)
            .return_once(|id| Err(RegistryError::AccessDenied(id.to_string())));

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::ListThingGroups))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::AccessDenied)
        );
    }

    #[tokio::test]
    async fn test_unclassified_registry_error_encodes_unknown() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_describe_device()
            .times(1)
            .return_once(|_| Err(RegistryError::Lookup(anyhow::anyhow!("connection reset"))));

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::DescribeThing))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::Unknown)
        );
    }

    #[tokio::test]
    async fn test_unrecognized_rule_type_fails_closed_without_directory_call() {
        // Arrange: no expectations on the registry, any call would panic the mock
        let mock_registry = MockDeviceRegistry::new();

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        let rule_type = RuleType::from_str("FOO").unwrap();

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", rule_type))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::Unknown)
        );
    }

    #[tokio::test]
    async fn test_empty_device_id_fails_closed_without_directory_call() {
        // Arrange: registry must not be called for invalid input
        let mock_registry = MockDeviceRegistry::new();

        let service =
            EnrichmentService::new(Arc::new(mock_registry), Arc::new(accepting_sink()));

        // Act
        let enriched = service
            .enrich(telemetry_event("", RuleType::DescribeThing))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::Unknown)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_timeout_classifies_as_throttled() {
        // A registry that answers slower than the lookup timeout
        struct SlowRegistry;

        #[async_trait::async_trait]
        impl DeviceRegistry for SlowRegistry {
            async fn describe_device(
                &self,
                _device_id: &str,
            ) -> Result<HashMap<String, String>, RegistryError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(HashMap::new())
            }

            async fn list_groups(&self, _device_id: &str) -> Result<Vec<String>, RegistryError> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
        }

        let service = EnrichmentService::new(Arc::new(SlowRegistry), Arc::new(accepting_sink()))
            .with_lookup_timeout(Duration::from_secs(5));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::DescribeThing))
            .await;

        // Assert
        assert_eq!(
            enriched.result,
            RegistryLookupResult::failure(LookupFailureReason::Throttled)
        );
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_alter_enriched_event() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry.expect_describe_device().times(1).return_once(|_| {
            Ok(HashMap::from([(
                "location".to_string(),
                "Tokyo".to_string(),
            )]))
        });

        let mut mock_sink = MockEnrichedEventSink::new();
        mock_sink
            .expect_log()
            .times(1)
            .return_once(|_| Err(DomainError::SinkError(anyhow::anyhow!("sink unavailable"))));

        let service = EnrichmentService::new(Arc::new(mock_registry), Arc::new(mock_sink));

        // Act
        let enriched = service
            .enrich(telemetry_event("test-device-001", RuleType::DescribeThing))
            .await;

        // Assert: the lookup result survives the sink failure untouched
        assert_eq!(
            enriched.result,
            RegistryLookupResult::Attributes(HashMap::from([(
                "location".to_string(),
                "Tokyo".to_string()
            )]))
        );
    }

    #[tokio::test]
    async fn test_sink_receives_the_enriched_event() {
        // Arrange
        let mut mock_registry = MockDeviceRegistry::new();
        mock_registry
            .expect_list_groups()
            .times(1)
            .return_once(|_| Ok(vec!["production-devices".to_string()]));

        let mut mock_sink = MockEnrichedEventSink::new();
        mock_sink
            .expect_log()
            .withf(|event: &EnrichedEvent| {
                event.event.device_id == "test-device-001"
                    && event.result
                        == RegistryLookupResult::Groups(vec!["production-devices".to_string()])
            })
            .times(1)
            .returning(|_| Ok(()));

        let service = EnrichmentService::new(Arc::new(mock_registry), Arc::new(mock_sink));

        // Act
        service
            .enrich(telemetry_event("test-device-001", RuleType::ListThingGroups))
            .await;
    }
}
