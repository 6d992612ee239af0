//! Logging, tracing and metrics setup.
//!
//! Local output is a compact fmt layer filtered by `RUST_LOG`, or by the
//! configured level when `RUST_LOG` is unset. An OTLP endpoint adds trace,
//! metric and log export on top of the same subscriber.

pub mod metrics;
pub mod task;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::error::{Error, Result};

/// Instrumentation scope for spans emitted by this crate.
const TRACER_NAME: &str = "taskq";

pub struct TelemetryConfig {
    /// OTLP gRPC endpoint (e.g. "http://localhost:4317"). `None` keeps
    /// everything local.
    pub endpoint: Option<String>,
    /// Reported as `service.name` on exported signals.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info").
    pub log_level: String,
}

/// Keeps the OTLP pipelines alive; flushes and shuts them down on drop.
///
/// Hold it for the lifetime of the process.
pub struct TelemetryGuard {
    export: Option<Exporters>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(export) = self.export.take() {
            export.shutdown();
        }
    }
}

/// One provider per exported signal, sharing a resource.
struct Exporters {
    traces: SdkTracerProvider,
    metrics: SdkMeterProvider,
    logs: SdkLoggerProvider,
}

impl Exporters {
    fn build(endpoint: &str, service_name: String) -> Result<Self> {
        let resource = Resource::builder().with_service_name(service_name).build();

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(exporter_error("span"))?;
        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(exporter_error("metric"))?;
        let logs = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(exporter_error("log"))?;

        Ok(Self {
            traces: SdkTracerProvider::builder()
                .with_batch_exporter(spans)
                .with_resource(resource.clone())
                .build(),
            metrics: SdkMeterProvider::builder()
                .with_periodic_exporter(metrics)
                .with_resource(resource.clone())
                .build(),
            logs: SdkLoggerProvider::builder()
                .with_batch_exporter(logs)
                .with_resource(resource)
                .build(),
        })
    }

    fn shutdown(self) {
        // Logs first: their last batch may reference spans still open.
        let _ = self.logs.shutdown();
        let _ = self.metrics.shutdown();
        let _ = self.traces.shutdown();
    }
}

fn exporter_error<E: std::fmt::Display>(signal: &'static str) -> impl Fn(E) -> Error {
    move |e| Error::Other(format!("failed to create OTLP {signal} exporter: {e}"))
}

/// Install the global tracing subscriber, exporting over OTLP when
/// `config.endpoint` is set.
///
/// # Errors
///
/// An invalid `log_level`, an exporter that fails to build, or a global
/// subscriber that is already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::Config(format!("invalid log filter {:?}: {e}", config.log_level)))?;

    let export = config
        .endpoint
        .as_deref()
        .map(|endpoint| Exporters::build(endpoint, config.service_name.clone()))
        .transpose()?;

    if let Some(export) = &export {
        opentelemetry::global::set_meter_provider(export.metrics.clone());
    }
    let trace_layer = export
        .as_ref()
        .map(|e| tracing_opentelemetry::layer().with_tracer(e.traces.tracer(TRACER_NAME)));
    let log_layer = export.as_ref().map(|e| {
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&e.logs)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .with(trace_layer)
        .with(log_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { export })
}
