use crate::domain::result::DomainResult;
use crate::domain::{RegistryLookupResult, TelemetryEvent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A telemetry event with its registry lookup result attached, ready for
/// sink delivery.
///
/// Every received `TelemetryEvent` produces exactly one of these; a failed
/// lookup is carried in `result`, never dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    pub event: TelemetryEvent,
    pub result: RegistryLookupResult,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enriched_at: chrono::DateTime<chrono::Utc>,
}

/// Destination that durably records enriched events.
///
/// Invoked best-effort by the router: a delivery failure is reported through
/// tracing and never alters the already-built enriched event.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EnrichedEventSink: Send + Sync {
    /// Record a single enriched event
    async fn log(&self, event: &EnrichedEvent) -> DomainResult<()>;
}
