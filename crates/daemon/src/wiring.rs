//! Builds the supervised service set (chain pipelines, sinks, HTTP endpoint)
//! from a validated [`config::Config`] and hands it to
//! [`indexer_core::supervisor::Supervisor`].

use {
    crate::rpc::RpcClient,
    anyhow::Context,
    async_trait::async_trait,
    indexer_core::{
        pipeline::{ChainPipeline, ChainPipelineConfig, Variant},
        sink::{ConsoleSink, Sink, SinkSet},
        supervisor::{BackgroundService, Supervisor},
    },
    observe::metrics::LivenessChecking,
    std::{net::SocketAddr, sync::Arc},
    tokio::{sync::Mutex, task::JoinHandle},
    tokio_util::sync::CancellationToken,
};

const DEFAULT_WINDOW_DEPTH: usize = 64;
const RECONNECT_BASE_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
const RECONNECT_MAX_DELAY: std::time::Duration = std::time::Duration::from_secs(60);
const RELATIONAL_QUEUE_CAPACITY: usize = 4096;
const RETENTION_PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

struct AlwaysAlive;

#[async_trait]
impl LivenessChecking for AlwaysAlive {
    async fn is_alive(&self) -> bool {
        true
    }
}

/// Wraps one [`ChainPipeline`] and its connected [`RpcClient`] as a
/// [`BackgroundService`]. `ChainPipeline::run` consumes both by value, so they
/// are stashed behind a mutex until `spawn` takes them out.
struct PipelineService {
    chain: String,
    inner: Mutex<Option<(ChainPipeline, RpcClient)>>,
}

impl BackgroundService for PipelineService {
    fn name(&self) -> String {
        format!("chain-pipeline[{}]", self.chain)
    }

    fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (pipeline, client) = self
                .inner
                .lock()
                .await
                .take()
                .expect("PipelineService spawned more than once");
            let chain = self.chain.clone();
            if let Err(err) = pipeline.run(client, cancel).await {
                tracing::error!(chain, error = %err, "chain pipeline exited with a terminal error, aborting process");
                std::process::exit(1);
            }
        })
    }
}

struct HttpService {
    addr: SocketAddr,
}

impl BackgroundService for HttpService {
    fn name(&self) -> String {
        "http".to_string()
    }

    fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let addr = self.addr;
        tokio::spawn(async move {
            tokio::select! {
                result = observe::metrics::serve_metrics(Arc::new(AlwaysAlive), addr) => {
                    if let Err(err) = result {
                        tracing::error!(error = %err, "metrics/health endpoint exited");
                    }
                }
                _ = cancel.cancelled() => {}
            }
        })
    }
}

/// Connect to every configured chain, build its pipeline and sinks, and run
/// the supervisor until `cancel` fires.
pub async fn run(config: config::Config, cancel: CancellationToken) -> anyhow::Result<()> {
    let postgres_pool = match &config.postgres {
        Some(postgres) => Some(
            sqlx::postgres::PgPoolOptions::new()
                .connect(&postgres.url)
                .await
                .context("connecting to postgres")?,
        ),
        None => None,
    };

    let mut sinks: Vec<Arc<dyn BackgroundService>> = Vec::new();
    let mut pipelines: Vec<Arc<dyn BackgroundService>> = Vec::new();

    if let Some(pool) = &postgres_pool {
        if let Some(postgres) = &config.postgres {
            for chain in &config.chains {
                let contract_names: Vec<&str> = chain
                    .contracts
                    .contracts
                    .iter()
                    .map(|c| c.contract_name.as_str())
                    .collect();
                let mut tx = pool.begin().await.context("starting migration transaction")?;
                database::migration::migrate_chain(&mut tx, &chain.name, &contract_names)
                    .await
                    .with_context(|| format!("migrating schema for chain {}", chain.name))?;
                tx.commit().await.context("committing migration transaction")?;
            }

            let retention = database::retention::RetentionPruner::new(
                pool.clone(),
                config
                    .chains
                    .iter()
                    .map(|chain| database::retention::RetentionPolicy {
                        chain: chain.name.clone(),
                        contracts: chain
                            .contracts
                            .contracts
                            .iter()
                            .map(|c| c.contract_name.clone())
                            .collect(),
                        retention: postgres.retention,
                    })
                    .collect(),
                RETENTION_PRUNE_INTERVAL,
            );
            sinks.push(Arc::new(retention));
        }
    }

    let mut relational_sinks_by_chain = std::collections::HashMap::new();
    if let Some(pool) = &postgres_pool {
        for chain in &config.chains {
            let (sink, consumer) =
                database::sink::new(chain.name.clone(), pool.clone(), RELATIONAL_QUEUE_CAPACITY);
            sinks.push(consumer);
            relational_sinks_by_chain.insert(chain.name.clone(), sink);
        }
    }

    for chain in config.chains {
        let client = RpcClient::connect(&chain.rpc)
            .await
            .with_context(|| format!("connecting to RPC endpoint for chain {}", chain.name))?;

        for contract in &chain.contracts.contracts {
            indexer_core::metrics::Metrics::get()
                .configured_events
                .with_label_values(&[&chain.name, &contract.contract_name])
                .set(i64::try_from(contract.events.len()).unwrap_or(i64::MAX));
            indexer_core::metrics::Metrics::get()
                .configured_addresses
                .with_label_values(&[&chain.name, &contract.contract_name])
                .set(i64::try_from(contract.addresses.len()).unwrap_or(i64::MAX));
        }

        let mut chain_sinks: Vec<Arc<dyn Sink>> = Vec::new();
        if !config.console.disabled {
            chain_sinks.push(Arc::new(ConsoleSink));
        }
        if let Some(sink) = relational_sinks_by_chain.remove(&chain.name) {
            chain_sinks.push(sink);
        }

        let pipeline_config = ChainPipelineConfig {
            chain_name: chain.name.clone(),
            variant: Variant::LogSubscription,
            confirmations: chain.confirmations,
            window_depth: DEFAULT_WINDOW_DEPTH,
            reconnect_base_delay: RECONNECT_BASE_DELAY,
            reconnect_max_delay: RECONNECT_MAX_DELAY,
        };
        let pipeline = ChainPipeline::new(
            pipeline_config,
            Arc::new(chain.contracts),
            Arc::new(SinkSet::new(chain_sinks)),
        );
        pipelines.push(Arc::new(PipelineService {
            chain: chain.name,
            inner: Mutex::new(Some((pipeline, client))),
        }));
    }

    let http: Arc<dyn BackgroundService> = Arc::new(HttpService {
        addr: SocketAddr::from(([0, 0, 0, 0], config.server.port)),
    });

    Supervisor::new(cancel)
        .run(sinks, pipelines, Some(http))
        .await;
    Ok(())
}
