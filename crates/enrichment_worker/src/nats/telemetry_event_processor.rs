use crate::domain::EnrichmentService;
use common::domain::{DomainError, RuleType, TelemetryEvent};
use common::nats::{Disposition, InboundMessage, MessageProcessor};
use std::sync::Arc;
use tracing::{debug, error};

/// Create a MessageProcessor that turns inbound telemetry messages into
/// TelemetryEvents tagged with the bound rule type and runs them through the
/// enrichment service.
///
/// Enrichment is structurally infallible, so decoded events are always
/// ACK'd; only messages that cannot become a TelemetryEvent at all are NAK'd
/// for redelivery.
pub fn create_telemetry_event_processor(
    service: Arc<EnrichmentService>,
    rule_type: RuleType,
) -> MessageProcessor {
    Box::new(move |message: InboundMessage| {
        let service = Arc::clone(&service);

        Box::pin(async move {
            let event = match parse_telemetry_message(&message.subject, &message.payload, rule_type)
            {
                Ok(event) => event,
                Err(e) => {
                    error!(
                        error = %e,
                        subject = %message.subject,
                        "failed to decode telemetry message"
                    );
                    return Disposition::Retry(Some(e.to_string()));
                }
            };

            debug!(
                device_id = %event.device_id,
                rule_type = %event.rule_type,
                "processing telemetry event"
            );

            service.enrich(event).await;
            Disposition::Ack
        })
    })
}

/// Build a TelemetryEvent from a telemetry subject and JSON payload.
///
/// Subjects follow `device.<device_id>.telemetry` (the MQTT topic
/// `device/+/telemetry`, NATS-mapped); the device identifier doubles as the
/// client identifier, matching how devices connect under their own name.
/// The payload is an arbitrary JSON object; a `timestamp` field carries
/// epoch milliseconds, defaulting to the receive time when absent.
pub fn parse_telemetry_message(
    subject: &str,
    payload: &[u8],
    rule_type: RuleType,
) -> Result<TelemetryEvent, DomainError> {
    let device_id = device_id_from_subject(subject)?;

    let fields: serde_json::Map<String, serde_json::Value> = if payload.is_empty() {
        serde_json::Map::new()
    } else {
        serde_json::from_slice(payload)
            .map_err(|e| DomainError::MalformedMessage(format!("invalid JSON payload: {e}")))?
    };

    let occurred_at = fields
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .and_then(chrono::DateTime::from_timestamp_millis)
        .unwrap_or_else(chrono::Utc::now);

    Ok(TelemetryEvent {
        client_id: device_id.clone(),
        device_id,
        occurred_at,
        rule_type,
        payload: fields,
    })
}

fn device_id_from_subject(subject: &str) -> Result<String, DomainError> {
    let mut tokens = subject.split('.');
    match (tokens.next(), tokens.next(), tokens.next(), tokens.next()) {
        (Some("device"), Some(device_id), Some("telemetry"), None) if !device_id.is_empty() => {
            Ok(device_id.to_string())
        }
        _ => Err(DomainError::MalformedMessage(format!(
            "unexpected telemetry subject: {subject}"
        ))),
    }
}
