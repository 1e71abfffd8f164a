use std::time::Duration;

use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::Var;
use crate::var;

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

/// OTLP providers, present only when a collector endpoint is configured.
#[derive(Debug, Clone)]
struct Exporters {
    logger_provider: SdkLoggerProvider,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

#[derive(Debug, Clone)]
pub struct Telemetry {
    pub tracer_name: &'static str,
    pub log_filter: &'static str,
    exporters: Option<Exporters>,
}

impl Telemetry {
    pub async fn new() -> Result<Telemetry> {
        let collector_url = var!(Var::OtelExporterEndpoint).await?;
        let tracer_name = var!(Var::ApiTracerName).await?;
        let service_name = var!(Var::ApiServiceName).await?;
        let log_filter = var!(Var::LogFilter).await?;
        let service_version = env!("CARGO_PKG_VERSION");

        let exporters = if collector_url.is_empty() {
            None
        } else {
            let base_resource = base_attrs(service_name, service_version);
            Some(Exporters {
                logger_provider: build_logger_provider(collector_url, base_resource.clone())?,
                meter_provider: build_meter_provider(collector_url, base_resource.clone())?,
                tracer_provider: build_tracer_provider(collector_url, base_resource)?,
            })
        };

        Ok(Self {
            tracer_name,
            log_filter,
            exporters,
        })
    }

    pub fn register(self) -> Self {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        let registry = tracing_subscriber::registry()
            .with(EnvFilter::new(self.log_filter))
            .with(fmt_layer);

        match &self.exporters {
            Some(exporters) => {
                global::set_tracer_provider(exporters.tracer_provider.clone());
                let tracer = global::tracer(self.tracer_name);
                let trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);

                let log_layer = OpenTelemetryTracingBridge::new(&exporters.logger_provider);
                let meter_layer =
                    tracing_opentelemetry::MetricsLayer::new(exporters.meter_provider.clone());

                registry
                    .with(trace_layer)
                    .with(log_layer)
                    .with(meter_layer)
                    .init();
            }
            None => registry.init(),
        }

        self
    }

    pub fn shutdown(self) {
        let Some(exporters) = self.exporters else {
            return;
        };

        if let Err(e) = exporters.meter_provider.shutdown() {
            eprintln!("error during metering shutdown: {e:?}");
        }

        if let Err(e) = exporters.logger_provider.shutdown() {
            eprintln!("error during logging shutdown: {e:?}");
        }

        if let Err(e) = exporters.tracer_provider.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        }
    }
}

fn build_logger_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Logs.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_tracer_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Traces.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_meter_provider(
    collector_url: &str,
    base_resource: Resource,
) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(Endpoint::Metrics.to_url(collector_url))
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn base_attrs(name: &'static str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}

enum Endpoint {
    Logs,
    Traces,
    Metrics,
}

impl Endpoint {
    pub fn to_url(&self, collector_endpoint: &str) -> String {
        let location: &str = match self {
            Endpoint::Logs => "/v1/logs",
            Endpoint::Traces => "/v1/traces",
            Endpoint::Metrics => "/v1/metrics",
        };
        format!("{}{location}", collector_endpoint.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            Endpoint::Traces.to_url("http://collector:4317"),
            "http://collector:4317/v1/traces"
        );
        assert_eq!(
            Endpoint::Logs.to_url("http://collector:4317/"),
            "http://collector:4317/v1/logs"
        );
    }
}
