use {clap::Parser, std::path::PathBuf};

/// Blockchain event-log ingestion daemon.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct Args {
    /// Path to the YAML configuration file.
    #[clap(default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Minimum log level emitted to stderr, plus per-module overrides
    /// (e.g. "warn,indexer_core=debug").
    #[clap(long, env, default_value = "info")]
    pub log_filter: String,

    /// Log level threshold below which output is suppressed entirely.
    #[clap(long, env, default_value = "info")]
    pub log_stderr_threshold: tracing::level_filters::LevelFilter,
}
