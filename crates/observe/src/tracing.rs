use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the global `tracing` subscriber: a JSON-structured stderr writer
/// filtered by `log_filter` (an `EnvFilter` directive string, e.g.
/// `"warn,daemon=debug,indexer_core=debug"`), plus a coarser threshold applied
/// uniformly regardless of target so noisy crates can't bypass it.
///
/// Call once, at process start, before any other module logs.
pub fn initialize(log_filter: &str, stderr_threshold: tracing::level_filters::LevelFilter) {
    let env_filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_filter(stderr_threshold);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .ok();
}
