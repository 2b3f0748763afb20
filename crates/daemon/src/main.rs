mod args;
mod rpc;
mod shutdown;
mod wiring;

use {args::Args, clap::Parser, tokio_util::sync::CancellationToken};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    observe::tracing::initialize(&args.log_filter, args.log_stderr_threshold);
    observe::panic_hook::install();
    observe::metrics::setup_registry(Some("indexer".to_string()), Some(()));

    tracing::info!(config = %args.config.display(), "starting indexer daemon");

    let config = match config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    shutdown::spawn_signal_listener(cancel.clone());

    if let Err(err) = wiring::run(config, cancel).await {
        tracing::error!(error = %err, "indexer daemon exited with an error");
        std::process::exit(1);
    }
}
