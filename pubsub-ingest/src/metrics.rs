use std::sync::OnceLock;

use axum::Router;
use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::debug;

use crate::error::Error;

const SOURCE_ID_LABEL: &str = "source_id";

// Counter names carry no unit suffix; the prometheus client library infers
// the `_total` suffix from the metric type.
const ACKED_TOTAL: &str = "pubsub_acked";
const ACK_FAILED_TOTAL: &str = "pubsub_ack_failed";
const NACKED_TOTAL: &str = "pubsub_nacked";
const READ_BYTES_TOTAL: &str = "pubsub_read_bytes";
const PROCESSING_TIME: &str = "pubsub_processing_time";

/// The global register of all metrics.
#[derive(Default)]
struct GlobalRegistry {
    // Each metric family is registered exactly once, so contention on this
    // mutex is limited to startup and scrapes.
    registry: parking_lot::Mutex<Registry>,
}

static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(GlobalRegistry::default)
}

/// Metric families shared by every worker in the process, differentiated by
/// the `source_id` label value.
pub(crate) struct SourceMetrics {
    pub(crate) acked_total: Family<Vec<(String, String)>, Counter>,
    pub(crate) ack_failed_total: Family<Vec<(String, String)>, Counter>,
    pub(crate) nacked_total: Family<Vec<(String, String)>, Counter>,
    pub(crate) read_bytes_total: Family<Vec<(String, String)>, Counter>,
    pub(crate) processing_time: Family<Vec<(String, String)>, Histogram>,
}

impl SourceMetrics {
    fn new() -> Self {
        let metrics = Self {
            acked_total: Family::<Vec<(String, String)>, Counter>::default(),
            ack_failed_total: Family::<Vec<(String, String)>, Counter>::default(),
            nacked_total: Family::<Vec<(String, String)>, Counter>::default(),
            read_bytes_total: Family::<Vec<(String, String)>, Counter>::default(),
            processing_time: Family::<Vec<(String, String)>, Histogram>::new_with_constructor(
                || Histogram::new(exponential_buckets(100.0, 10.0, 9)),
            ),
        };

        let mut registry = global_registry().registry.lock();
        registry.register(
            ACKED_TOTAL,
            "A Counter to keep track of the total number of messages acknowledged to the source",
            metrics.acked_total.clone(),
        );
        registry.register(
            ACK_FAILED_TOTAL,
            "A Counter to keep track of the total number of deliveries the sink could not vouch for",
            metrics.ack_failed_total.clone(),
        );
        registry.register(
            NACKED_TOTAL,
            "A Counter to keep track of the total number of messages nacked due to sink rejection",
            metrics.nacked_total.clone(),
        );
        registry.register(
            READ_BYTES_TOTAL,
            "A Counter to keep track of the total number of payload bytes processed",
            metrics.read_bytes_total.clone(),
        );
        registry.register(
            PROCESSING_TIME,
            "A Histogram to keep track of publish-to-ack latency, in microseconds",
            metrics.processing_time.clone(),
        );
        metrics
    }
}

static SOURCE_METRICS: OnceLock<SourceMetrics> = OnceLock::new();

pub(crate) fn source_metrics() -> &'static SourceMetrics {
    SOURCE_METRICS.get_or_init(SourceMetrics::new)
}

/// Per-worker view over the shared families: one label set, increment and
/// observe helpers, and `close` to drop the label set when the worker stops.
pub(crate) struct WorkerMetrics {
    labels: Vec<(String, String)>,
}

impl WorkerMetrics {
    pub(crate) fn new(worker_id: &str) -> Self {
        Self {
            labels: vec![(SOURCE_ID_LABEL.to_string(), worker_id.to_string())],
        }
    }

    pub(crate) fn inc_acked(&self) {
        source_metrics().acked_total.get_or_create(&self.labels).inc();
    }

    pub(crate) fn inc_ack_failed(&self) {
        source_metrics()
            .ack_failed_total
            .get_or_create(&self.labels)
            .inc();
    }

    pub(crate) fn inc_nacked(&self) {
        source_metrics().nacked_total.get_or_create(&self.labels).inc();
    }

    pub(crate) fn add_read_bytes(&self, bytes: u64) {
        source_metrics()
            .read_bytes_total
            .get_or_create(&self.labels)
            .inc_by(bytes);
    }

    pub(crate) fn observe_processing_time(&self, micros: f64) {
        source_metrics()
            .processing_time
            .get_or_create(&self.labels)
            .observe(micros);
    }

    /// Removes this worker's label set from every family.
    pub(crate) fn close(&self) {
        let metrics = source_metrics();
        metrics.acked_total.remove(&self.labels);
        metrics.ack_failed_total.remove(&self.labels);
        metrics.nacked_total.remove(&self.labels);
        metrics.read_bytes_total.remove(&self.labels);
        metrics.processing_time.remove(&self.labels);
    }
}

/// Snapshot of the global registry in the text exposition format.
pub async fn metrics_handler() -> impl IntoResponse {
    let registry = global_registry().registry.lock();
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &registry) {
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::from(format!("encoding metrics: {e}")))
            .unwrap_or_default();
    }
    debug!("Exposing Metrics: {:?}", buffer);
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(buffer))
        .unwrap_or_default()
}

async fn livez() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

fn metrics_router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/livez", get(livez))
}

/// Serves the metrics and health endpoints over HTTP for the lifetime of
/// the process.
pub async fn start_metrics_http_server<A>(addr: A) -> crate::Result<()>
where
    A: ToSocketAddrs + std::fmt::Debug,
{
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Metrics(format!("Creating listener on {addr:?}: {e}")))?;

    debug!("metrics server started at addr: {:?}", addr);

    axum::serve(listener, metrics_router())
        .await
        .map_err(|e| Error::Metrics(format!("Starting web server for metrics: {e}")))?;
    Ok(())
}
