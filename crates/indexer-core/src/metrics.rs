use prometheus_metric_storage::MetricStorage;

/// Counters and histograms for the core pipeline: decode outcomes, queue
/// discards, reorg handling, and reconnect/backoff behavior. Registered once
/// against the process-wide registry set up by `observe`.
#[derive(MetricStorage)]
#[metric(subsystem = "indexer_core")]
pub struct Metrics {
    /// Number of logs successfully decoded into a typed event.
    #[metric(labels("chain", "contract", "event"))]
    pub events_decoded: prometheus::IntCounterVec,

    /// Number of logs that failed to decode (topic/data shape mismatch).
    #[metric(labels("chain", "contract"))]
    pub decode_errors: prometheus::IntCounterVec,

    /// Number of logs seen for a contract with no matching event definition.
    #[metric(labels("chain", "contract"))]
    pub events_unmapped: prometheus::IntCounterVec,

    /// Number of events filtered out by a contract's event whitelist.
    #[metric(labels("chain", "contract"))]
    pub events_filtered: prometheus::IntCounterVec,

    /// Number of items dropped from a chain's bounded queue because it was full.
    #[metric(labels("chain"))]
    pub queue_discards: prometheus::IntCounterVec,

    /// Number of events redelivered with `removed=true` due to a detected reorg.
    #[metric(labels("chain", "contract"))]
    pub reorgs_handled: prometheus::IntCounterVec,

    /// Number of locally-detected parent-hash mismatches (variant B only), each
    /// of which forces the pipeline to reconnect.
    #[metric(labels("chain"))]
    pub reorg_errors: prometheus::IntCounterVec,

    /// Number of times a chain pipeline's upstream connection was reestablished.
    #[metric(labels("chain"))]
    pub reconnects: prometheus::IntCounterVec,

    /// Current backoff delay before the next reconnect attempt, in seconds.
    #[metric(labels("chain"))]
    pub backoff_seconds: prometheus::GaugeVec,

    /// Number of events declared for a contract in configuration, set once at
    /// startup per chain/contract.
    #[metric(labels("chain", "contract"))]
    pub configured_events: prometheus::IntGaugeVec,

    /// Number of addresses routed to a contract in configuration, set once at
    /// startup per chain/contract.
    #[metric(labels("chain", "contract"))]
    pub configured_addresses: prometheus::IntGaugeVec,
}

impl Metrics {
    pub fn get() -> &'static Self {
        Self::instance(observe::metrics::get_storage_registry()).expect("metrics registration")
    }
}
