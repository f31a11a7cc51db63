use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Meter, MeterProvider},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of one loader attempt, as counted by `fav_load_total`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderOutcome {
    Success,
    /// The loader ran cleanly but found nothing
    Empty,
    Error,
}

impl LoaderOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

/// Instrumentation points for the resolution pipeline.
///
/// Components receive this as an injected dependency; tests use `NoopMetrics`.
pub trait ResolverMetrics: Send + Sync {
    fn target_parsed(&self, success: bool);
    fn cache_lookup(&self, hit: bool);
    fn loader_finished(&self, loader: &'static str, outcome: LoaderOutcome);
    fn download_finished(&self, success: bool);
    fn downloaded_bytes(&self, bytes: u64);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl ResolverMetrics for NoopMetrics {
    fn target_parsed(&self, _success: bool) {}
    fn cache_lookup(&self, _hit: bool) {}
    fn loader_finished(&self, _loader: &'static str, _outcome: LoaderOutcome) {}
    fn download_finished(&self, _success: bool) {}
    fn downloaded_bytes(&self, _bytes: u64) {}
}

/// OpenTelemetry counters backing `ResolverMetrics`
#[derive(Clone)]
pub struct OtelMetrics {
    query_parse: Counter<u64>,
    query_cache: Counter<u64>,
    load: Counter<u64>,
    download: Counter<u64>,
    download_bytes: Counter<u64>,
}

impl OtelMetrics {
    pub fn new(meter: &Meter) -> Self {
        let query_parse = meter
            .u64_counter("fav_query_parse_total")
            .with_description("Site parameters parsed, by outcome")
            .build();
        let query_cache = meter
            .u64_counter("fav_query_cache_total")
            .with_description("Icon cache lookups, by hit or miss")
            .build();
        let load = meter
            .u64_counter("fav_load_total")
            .with_description("Loader attempts, by loader and outcome")
            .build();
        let download = meter
            .u64_counter("fav_download_total")
            .with_description("Icon downloads, by outcome")
            .build();
        let download_bytes = meter
            .u64_counter("fav_download_bytes_total")
            .with_description("Icon bytes streamed from upstream")
            .with_unit("By")
            .build();

        Self {
            query_parse,
            query_cache,
            load,
            download,
            download_bytes,
        }
    }
}

fn outcome(success: bool) -> KeyValue {
    KeyValue::new("outcome", if success { "success" } else { "error" })
}

impl ResolverMetrics for OtelMetrics {
    fn target_parsed(&self, success: bool) {
        self.query_parse.add(1, &[outcome(success)]);
    }

    fn cache_lookup(&self, hit: bool) {
        self.query_cache
            .add(1, &[KeyValue::new("outcome", if hit { "hit" } else { "miss" })]);
    }

    fn loader_finished(&self, loader: &'static str, result: LoaderOutcome) {
        self.load.add(
            1,
            &[
                KeyValue::new("loader", loader),
                KeyValue::new("outcome", result.as_str()),
            ],
        );
    }

    fn download_finished(&self, success: bool) {
        self.download.add(1, &[outcome(success)]);
    }

    fn downloaded_bytes(&self, bytes: u64) {
        self.download_bytes.add(bytes, &[]);
    }
}

/// Process-wide metrics setup
#[derive(Clone)]
pub struct AppObservability {
    provider: SdkMeterProvider,
    pub meter: Meter,
}

impl AppObservability {
    pub fn new(service_name: &str) -> Self {
        // No exporter is attached; instruments are recorded in-process only
        let provider = SdkMeterProvider::builder().build();
        global::set_meter_provider(provider.clone());

        let meter = provider.meter("favicon-proxy");
        info!(service = service_name, "OpenTelemetry metrics initialized");

        Self { provider, meter }
    }

    pub fn resolver_metrics(&self) -> Arc<dyn ResolverMetrics> {
        Arc::new(OtelMetrics::new(&self.meter))
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            debug!(error = %e, "Meter provider shutdown reported an error");
        }
    }
}
