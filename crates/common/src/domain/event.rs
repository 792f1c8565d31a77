use garde::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule type a telemetry event was tagged with by the ingestion layer.
///
/// A closed enum: any wire value outside the two known rule types maps to
/// `Unknown`, which the router fails closed on without touching the
/// directory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "DESCRIBE_THING")]
    DescribeThing,
    #[serde(rename = "LIST_THING_GROUPS")]
    ListThingGroups,
    #[serde(other)]
    Unknown,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::DescribeThing => "DESCRIBE_THING",
            RuleType::ListThingGroups => "LIST_THING_GROUPS",
            RuleType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "DESCRIBE_THING" => RuleType::DescribeThing,
            "LIST_THING_GROUPS" => RuleType::ListThingGroups,
            _ => RuleType::Unknown,
        })
    }
}

/// A device-reported telemetry message tagged with routing metadata.
///
/// Immutable once received; the router consumes it exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TelemetryEvent {
    #[garde(length(min = 1))]
    pub device_id: String,
    #[garde(skip)]
    pub client_id: String,
    /// Epoch milliseconds on the wire
    #[garde(skip)]
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub occurred_at: chrono::DateTime<chrono::Utc>,
    #[garde(skip)]
    pub rule_type: RuleType,
    #[garde(skip)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}
