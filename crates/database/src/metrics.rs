use prometheus_metric_storage::MetricStorage;

#[derive(MetricStorage)]
#[metric(subsystem = "database")]
pub struct Metrics {
    #[metric(labels("chain", "contract"))]
    pub rows_inserted: prometheus::IntCounterVec,

    #[metric(labels("chain", "contract"))]
    pub rows_deleted_reorg: prometheus::IntCounterVec,

    #[metric(labels("chain", "contract"))]
    pub rows_deleted_retention: prometheus::IntCounterVec,

    #[metric(labels("chain"))]
    pub queue_discards: prometheus::IntCounterVec,

    #[metric(labels("chain"))]
    pub write_errors: prometheus::IntCounterVec,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry()).expect("metrics registration")
    }
}
