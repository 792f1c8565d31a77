use crate::domain::EnrichmentService;
use crate::nats::{
    create_telemetry_event_processor, NatsDirectoryClient, NatsEnrichedEventSink,
};
use crate::sink::LogEventSink;
use common::domain::{EnrichedEventSink, RuleType};
use common::nats::{NatsClient, NatsConsumer};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A rule-based routing definition: events matching the subject filter are
/// tagged with the rule type and routed through the enrichment service.
#[derive(Debug, Clone)]
pub struct RuleBinding {
    /// Durable consumer name for this rule
    pub rule_name: String,
    /// Wire name of the rule type (DESCRIBE_THING, LIST_THING_GROUPS);
    /// anything else tags events as Unknown and they fail closed
    pub rule_type: String,
    pub subject_filter: String,
}

pub struct EnrichmentWorkerConfig {
    pub telemetry_stream: String,
    pub rules: Vec<RuleBinding>,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub registry_subject_prefix: String,
    pub lookup_timeout_secs: u64,
    /// When set, enriched events are published to JetStream under this base
    /// subject; otherwise they go to the structured log sink
    pub enriched_subject: Option<String>,
}

/// Registry Enrichment Router wiring: one durable consumer per rule binding,
/// all sharing a single enrichment service.
pub struct EnrichmentWorker {
    consumers: Vec<NatsConsumer>,
}

impl EnrichmentWorker {
    pub async fn new(
        nats_client: Arc<NatsClient>,
        config: EnrichmentWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing Registry Enrichment Router module");

        let registry = Arc::new(NatsDirectoryClient::new(
            nats_client.core_client(),
            config.registry_subject_prefix.clone(),
        ));

        let sink: Arc<dyn EnrichedEventSink> = match &config.enriched_subject {
            Some(subject) => Arc::new(NatsEnrichedEventSink::new(
                nats_client.create_publisher_client(),
                subject.clone(),
            )),
            None => Arc::new(LogEventSink),
        };

        let service = Arc::new(
            EnrichmentService::new(registry, sink)
                .with_lookup_timeout(Duration::from_secs(config.lookup_timeout_secs)),
        );

        let mut consumers = Vec::with_capacity(config.rules.len());
        for rule in &config.rules {
            let rule_type: RuleType = rule.rule_type.parse()?;
            if rule_type == RuleType::Unknown {
                warn!(
                    rule = %rule.rule_name,
                    rule_type = %rule.rule_type,
                    "rule bound to an unrecognized rule type, its events will fail closed"
                );
            }

            let processor = create_telemetry_event_processor(service.clone(), rule_type);
            let consumer = NatsConsumer::new(
                nats_client.jetstream(),
                &config.telemetry_stream,
                &rule.rule_name,
                &rule.subject_filter,
                config.nats_batch_size,
                config.nats_batch_wait_secs,
                processor,
            )
            .await?;

            info!(
                rule = %rule.rule_name,
                rule_type = %rule_type,
                subject = %rule.subject_filter,
                "bound enrichment rule"
            );
            consumers.push(consumer);
        }

        info!(rule_count = consumers.len(), "Registry Enrichment Router initialized");

        Ok(Self { consumers })
    }

    pub fn into_runner_processes(
        self,
    ) -> Vec<
        Box<
            dyn FnOnce(
                    CancellationToken,
                ) -> std::pin::Pin<
                    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                > + Send,
        >,
    > {
        self.consumers
            .into_iter()
            .map(|consumer| {
                Box::new(move |ctx: CancellationToken| {
                    Box::pin(async move { consumer.run(ctx).await })
                        as std::pin::Pin<
                            Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
                        >
                })
                    as Box<
                        dyn FnOnce(
                                CancellationToken,
                            ) -> std::pin::Pin<
                                Box<
                                    dyn std::future::Future<Output = anyhow::Result<()>>
                                        + Send,
                                >,
                            > + Send,
                    >
            })
            .collect()
    }
}
