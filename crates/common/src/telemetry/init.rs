use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, WithExportConfig};
use opentelemetry_sdk::{
    logs::LoggerProvider,
    propagation::TraceContextPropagator,
    runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider as SdkTracerProvider},
    Resource,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::{TelemetryConfig, TelemetryProviders};

/// Initialize telemetry with OpenTelemetry support
///
/// When OTEL is enabled:
/// - Sets up OTLP exporters for traces and logs
/// - Bridges tracing spans and events to OpenTelemetry
/// - Configures W3C Trace Context propagation
///
/// When OTEL is disabled:
/// - Falls back to standard JSON logging
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<TelemetryProviders>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.otel_enabled {
        // Set global propagator for W3C Trace Context
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

        // Resource shared between traces and logs
        let resource = Resource::new(vec![KeyValue::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
            config.service_name.clone(),
        )]);

        let trace_exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otel_endpoint)
            .build()?;

        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(trace_exporter, runtime::Tokio)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource.clone())
            .build();

        let log_exporter = LogExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otel_endpoint)
            .build()?;

        let logger_provider = LoggerProvider::builder()
            .with_batch_exporter(log_exporter, runtime::Tokio)
            .with_resource(resource)
            .build();

        let tracer = tracer_provider.tracer("registry-router");
        let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        let otel_log_layer = OpenTelemetryTracingBridge::new(&logger_provider);

        // Create fmt layer for stdout (standard JSON format)
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(true)
            .with_current_span(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(otel_trace_layer)
            .with(otel_log_layer)
            .with(fmt_layer)
            .init();

        Ok(Some(TelemetryProviders {
            tracer_provider,
            logger_provider,
        }))
    } else {
        // Standard JSON logging without OTel context
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_list(true)
            .with_current_span(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();

        Ok(None)
    }
}

/// Shutdown telemetry and flush any pending traces and logs
pub fn shutdown_telemetry(providers: Option<TelemetryProviders>) {
    if let Some(providers) = providers {
        if let Err(e) = providers.tracer_provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
        if let Err(e) = providers.logger_provider.shutdown() {
            eprintln!("Error shutting down logger provider: {:?}", e);
        }
    }
}
