use {
    async_trait::async_trait,
    axum::{extract::State, routing::get, Router},
    prometheus_metric_storage::StorageRegistry,
    std::{net::SocketAddr, sync::Arc, sync::OnceLock},
};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();

/// Create the process-wide metric registry. Must be called exactly once,
/// before any `Metrics::get()` call in any crate. `namespace` is prefixed to
/// every metric name (e.g. `Some("indexer".into())` -> `indexer_<subsystem>_<name>`).
pub fn setup_registry(namespace: Option<String>, process_collector: Option<()>) {
    let registry = match namespace {
        Some(ns) => prometheus::Registry::new_custom(Some(ns), None).expect("valid namespace"),
        None => prometheus::Registry::new(),
    };
    if process_collector.is_some() {
        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(prometheus::process_collector::ProcessCollector::for_self()))
            .ok();
    }
    if REGISTRY.set(StorageRegistry::new(registry)).is_err() {
        tracing::debug!("metrics registry already initialized, ignoring repeat setup_registry call");
    }
}

/// Retrieve the registry set up by [`setup_registry`]. Panics if called
/// before `setup_registry`, which is a programming error, not a runtime one.
pub fn get_storage_registry() -> &'static StorageRegistry {
    REGISTRY
        .get()
        .expect("metrics registry not initialized; call observe::metrics::setup_registry first")
}

/// A component the `/health` endpoint polls to decide whether the process is alive.
#[async_trait]
pub trait LivenessChecking: Send + Sync {
    async fn is_alive(&self) -> bool;
}

struct HttpState {
    liveness: Arc<dyn LivenessChecking>,
}

async fn metrics_handler(State(state): State<Arc<HttpState>>) -> impl axum::response::IntoResponse {
    let _ = &state;
    let registry = get_storage_registry().registry();
    let metric_families = registry.gather();
    let encoder = prometheus::TextEncoder::new();
    let body = encoder.encode_to_string(&metric_families).unwrap_or_default();
    (
        [("content-type", prometheus::TEXT_FORMAT)],
        body,
    )
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl axum::response::IntoResponse {
    if state.liveness.is_alive().await {
        (axum::http::StatusCode::OK, "ok")
    } else {
        (axum::http::StatusCode::SERVICE_UNAVAILABLE, "not alive")
    }
}

/// Serve `/metrics` and `/health` on `addr` until the process exits. Intended
/// to be spawned as its own task and joined during shutdown.
pub async fn serve_metrics(
    liveness: Arc<dyn LivenessChecking>,
    addr: SocketAddr,
) -> Result<(), std::io::Error> {
    let state = Arc::new(HttpState { liveness });
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving metrics and health endpoints");
    axum::serve(listener, app).await
}
