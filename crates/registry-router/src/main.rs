mod config;

use anyhow::Context;
use common::nats::NatsClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use enrichment_worker::{EnrichmentWorker, EnrichmentWorkerConfig, RuleBinding};
use registry_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        nats_url = %config.nats_url,
        "Starting registry-router service"
    );
    debug!("Configuration: {:?}", config);

    let exit_code = match run(config).await {
        Ok(code) => code,
        Err(e) => {
            error!("Service failed: {:#}", e);
            1
        }
    };

    shutdown_telemetry(telemetry_providers);
    std::process::exit(exit_code);
}

async fn run(config: ServiceConfig) -> anyhow::Result<i32> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    let nats_client = Arc::new(
        tokio::time::timeout(
            startup_timeout,
            NatsClient::connect(&config.nats_url, Duration::from_secs(10)),
        )
        .await
        .context("Timed out connecting to NATS")??,
    );

    nats_client
        .ensure_stream(
            &config.telemetry_stream,
            vec![config.telemetry_stream_subject.clone()],
        )
        .await?;

    let worker_config = EnrichmentWorkerConfig {
        telemetry_stream: config.telemetry_stream.clone(),
        rules: rule_bindings(&config),
        nats_batch_size: config.nats_batch_size,
        nats_batch_wait_secs: config.nats_batch_wait_secs,
        registry_subject_prefix: config.registry_subject_prefix.clone(),
        lookup_timeout_secs: config.lookup_timeout_secs,
        enriched_subject: config.enriched_subject.clone(),
    };

    let worker = tokio::time::timeout(
        startup_timeout,
        EnrichmentWorker::new(nats_client.clone(), worker_config),
    )
    .await
    .context("Timed out initializing enrichment worker")??;

    let mut runner = Runner::new().with_closer_timeout(Duration::from_secs(10));
    for process in worker.into_runner_processes() {
        runner = runner.with_boxed_process(process);
    }

    let runner = runner.with_closer(move || async move {
        if let Ok(client) = Arc::try_unwrap(nats_client) {
            client.close().await;
        }
        Ok(())
    });

    Ok(runner.run().await)
}

/// The two rule-based routing definitions: one enriches with identity
/// attributes, the other with group memberships, both reading the same
/// telemetry subject space.
fn rule_bindings(config: &ServiceConfig) -> Vec<RuleBinding> {
    let mut rules = Vec::new();

    if config.describe_rule_enabled {
        rules.push(RuleBinding {
            rule_name: "describe-thing-rule".to_string(),
            rule_type: "DESCRIBE_THING".to_string(),
            subject_filter: config.telemetry_subject.clone(),
        });
    }

    if config.list_groups_rule_enabled {
        rules.push(RuleBinding {
            rule_name: "list-thing-groups-rule".to_string(),
            rule_type: "LIST_THING_GROUPS".to_string(),
            subject_filter: config.telemetry_subject.clone(),
        });
    }

    rules
}
