use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, EnrichedEvent, EnrichedEventSink};
use tracing::info;

/// Sink that records enriched events to the structured log stream.
///
/// Emits a rule-type banner followed by the full serialized event, so each
/// record shows which rule produced it.
pub struct LogEventSink;

#[async_trait]
impl EnrichedEventSink for LogEventSink {
    async fn log(&self, event: &EnrichedEvent) -> DomainResult<()> {
        let body =
            serde_json::to_string(event).map_err(|e| DomainError::SinkError(e.into()))?;

        info!(
            rule_type = %event.event.rule_type,
            device_id = %event.event.device_id,
            event = %body,
            "========== {} ==========",
            event.event.rule_type
        );

        Ok(())
    }
}
