use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default)]
    pub otel_enabled: bool,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream holding inbound device telemetry
    #[serde(default = "default_telemetry_stream")]
    pub telemetry_stream: String,

    /// Subject space captured by the telemetry stream
    #[serde(default = "default_telemetry_stream_subject")]
    pub telemetry_stream_subject: String,

    /// Subject filter the enrichment rules consume from
    #[serde(default = "default_telemetry_subject")]
    pub telemetry_subject: String,

    /// Batch size for consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // Directory service configuration
    /// Subject prefix for directory-service request/reply lookups
    #[serde(default = "default_registry_subject_prefix")]
    pub registry_subject_prefix: String,

    /// Per-lookup bound on directory calls in seconds
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,

    // Sink configuration
    /// When set, enriched events are published to JetStream under this base
    /// subject; left unset they go to the structured log sink
    #[serde(default)]
    pub enriched_subject: Option<String>,

    // Rule toggles, mirroring the two routing rule definitions
    #[serde(default = "default_true")]
    pub describe_rule_enabled: bool,

    #[serde(default = "default_true")]
    pub list_groups_rule_enabled: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(Environment::default())
            .build()?;

        config.try_deserialize()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_service_name() -> String {
    "registry-router".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_telemetry_stream() -> String {
    "device_telemetry".to_string()
}

fn default_telemetry_stream_subject() -> String {
    "device.>".to_string()
}

fn default_telemetry_subject() -> String {
    "device.*.telemetry".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_registry_subject_prefix() -> String {
    "registry.v1".to_string()
}

fn default_lookup_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}
