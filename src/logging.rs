use crate::app_env;
use anyhow::Context;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_http::HeaderExtractor;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::Tracer;
use opentelemetry_sdk::{Resource, runtime};
use std::env;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing::{Span, debug, debug_span, field, info};
use tracing_opentelemetry::{OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::{EnvFilter, prelude::*, registry};

/// Service name reported to the trace collector
const SERVICE_NAME: &str = "todo-assist";

/// Span for one inbound request, continuing the caller's trace when a `traceparent` header is sent
fn request_span(request: &Request<Body>) -> Span {
    let span = debug_span!(
        "request",
        method = request.method().as_str(),
        path = request.uri().path(),
        response_status = field::Empty,
    );
    span.set_parent(global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor(request.headers()))
    }));

    span
}

/// Wraps every route of [router] in a request span and logs the latency of each response
pub fn attach_tracing_http<T>(router: Router<T>) -> Router<T>
where
    T: Clone + Send + Sync + 'static,
{
    router.layer(TraceLayer::new_for_http().make_span_with(request_span).on_response(
        |response: &Response<Body>, latency: Duration, span: &Span| {
            span.record("response_status", field::display(response.status()));
            debug!(latency_ms = latency.as_millis() as u64, "request processing complete");
        },
    ))
}

/// Batch-exports spans over OTLP/gRPC to [otlp_endpoint], typically a collector sidecar on
/// http://localhost:4317
pub fn init_span_export(otlp_endpoint: &str) -> Result<Tracer, anyhow::Error> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(otlp_endpoint)
        .build()
        .context("building the span exporter")?;

    Ok(opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build()
        .tracer(SERVICE_NAME))
}

/// Span export is only enabled when [app_env::OTEL_SPAN_EXPORT_URL] is set
pub fn span_export_from_env() -> Result<Option<Tracer>, anyhow::Error> {
    match env::var(app_env::OTEL_SPAN_EXPORT_URL) {
        Ok(endpoint) => init_span_export(&endpoint).map(Some),
        Err(_) => Ok(None),
    }
}

/// Filter for the stdout logger, read from [app_env::LOG_LEVEL]. Defaults to "info".
pub fn init_env_filter() -> Result<EnvFilter, anyhow::Error> {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(app_env::LOG_LEVEL)
        .from_env()
        .context("building the logging filter")
}

/// Installs the global subscriber: JSON logs on stdout filtered by [env_filter], plus every
/// span at "debug" and above sent to [span_tracer] when one is configured
pub fn setup_logging_and_tracing(env_filter: EnvFilter, span_tracer: Option<Tracer>) {
    global::set_text_map_propagator(TraceContextPropagator::new());
    let exporting = span_tracer.is_some();

    registry()
        .with(LevelFilter::DEBUG)
        .with(span_tracer.map(OpenTelemetryLayer::new))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_filter(env_filter),
        )
        .init();

    if exporting {
        info!("OpenTelemetry span export enabled");
    }
}
