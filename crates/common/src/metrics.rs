use std::collections::HashMap;

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::GuardConfig;

lazy_static! {
    pub static ref GUARD_METRICS_REGISTRY: Registry =
        Registry::new_custom(Some("guard".to_string()), None).unwrap();
}

/// Puts the operator surface on its own port: Prometheus text on `/metrics`,
/// a liveness probe on `/status`. Serving failures are logged, not fatal;
/// the proxy keeps running without its metrics port.
pub fn start_metrics_server(config: &GuardConfig) {
    let addr = config.admin_addr.clone();
    tokio::spawn(async move {
        if let Err(err) = serve_admin(&addr).await {
            error!(%err, %addr, "admin server stopped");
        }
    });
}

async fn serve_admin(addr: &str) -> eyre::Result<()> {
    let router = axum::Router::new()
        .route("/metrics", get(render_metrics))
        .route("/status", get(|| async { StatusCode::OK }));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "admin server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn render_metrics() -> Response {
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&GUARD_METRICS_REGISTRY.gather()) {
        Ok(text) => ([(CONTENT_TYPE, encoder.format_type())], text).into_response(),
        Err(err) => {
            error!(%err, "could not encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Per-subsystem handle for creating and updating metrics by name.
///
/// Metric names are not known statically (outcome counters are created on
/// first touch), so lookup goes through a reader-writer lock: read-probe,
/// then write-lock, then re-probe in case another task created the metric
/// while we were upgrading. Increments on the returned handles are lock-free.
pub struct MetricsRegistry {
    subsystem: &'static str,
    counters: MetricsMap<IntCounter>,
    gauges: MetricsMap<IntGauge>,
    histograms: MetricsMap<Histogram>,
}

struct MetricsMap<M> {
    inner: RwLock<HashMap<String, M>>,
}

impl<M: Clone> MetricsMap<M> {
    fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    fn value(&self, name: &str, init: impl FnOnce() -> M) -> M {
        if let Some(metric) = self.inner.read().get(name) {
            return metric.clone();
        }

        let mut map = self.inner.write();
        if let Some(metric) = map.get(name) {
            // Someone else created the metric while we were upgrading.
            return metric.clone();
        }

        let metric = init();
        map.insert(name.to_string(), metric.clone());
        metric
    }
}

impl MetricsRegistry {
    pub fn new(subsystem: &'static str) -> Self {
        Self {
            subsystem,
            counters: MetricsMap::new(),
            gauges: MetricsMap::new(),
            histograms: MetricsMap::new(),
        }
    }

    pub fn counter(&self, name: &str) -> IntCounter {
        self.counters.value(name, || {
            let opts = Opts::new(name, format!("{} {} count", self.subsystem, name))
                .subsystem(self.subsystem);
            let counter = IntCounter::with_opts(opts).unwrap();
            // A second registry instance for the same subsystem keeps its
            // handle unexported rather than panicking the process.
            let _ = GUARD_METRICS_REGISTRY.register(Box::new(counter.clone()));
            counter
        })
    }

    pub fn gauge(&self, name: &str) -> IntGauge {
        self.gauges.value(name, || {
            let opts = Opts::new(name, format!("{} {} gauge", self.subsystem, name))
                .subsystem(self.subsystem);
            let gauge = IntGauge::with_opts(opts).unwrap();
            let _ = GUARD_METRICS_REGISTRY.register(Box::new(gauge.clone()));
            gauge
        })
    }

    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms.value(name, || {
            let opts = HistogramOpts::new(name, format!("{} {} seconds", self.subsystem, name))
                .subsystem(self.subsystem);
            let histogram = Histogram::with_opts(opts).unwrap();
            let _ = GUARD_METRICS_REGISTRY.register(Box::new(histogram.clone()));
            histogram
        })
    }
}
