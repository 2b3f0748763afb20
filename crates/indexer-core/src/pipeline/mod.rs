//! The chain pipeline: one supervised task per configured chain that
//! subscribes to upstream logs, decodes them, and dispatches decoded events to
//! a [`SinkSet`](crate::sink::SinkSet), reconnecting with backoff on failure.
//!
//! Two variants implement the inner connect-and-consume loop behind the same
//! contract: [`variant_a`] subscribes directly to logs (the default, lowest
//! latency path); [`variant_b`] subscribes to block headers and only queries
//! for logs once a block is `confirmations` deep, trading latency for a
//! simpler reorg story. Both report through [`run_once`]'s `Result`, and the
//! outer loop in [`ChainPipeline::run`] is identical either way.

pub mod backoff;
pub mod variant_a;
pub mod variant_b;

use {
    crate::{
        contract::ChainContracts,
        decoder::{self, DecodeOutcome},
        event::TypedEvent,
        log::RawLog,
        metrics::Metrics,
        queue::BoundedQueue,
        sink::SinkSet,
        window::RecentBlockWindow,
    },
    alloy_primitives::{Address, B256},
    async_trait::async_trait,
    backoff::ExponentialBackoff,
    chrono::{DateTime, Utc},
    std::{sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("connecting to upstream node: {0}")]
    Connection(String),
    #[error("upstream RPC call failed: {0}")]
    Rpc(String),
    #[error("subscription ended unexpectedly")]
    SubscriptionEnded,
    #[error("parent hash mismatch at block {0}, reorg suspected")]
    Reorg(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: DateTime<Utc>,
}

/// A live stream of logs from an active subscription.
#[async_trait]
pub trait LogSource: Send {
    async fn next_log(&mut self) -> Result<Option<RawLog>, PipelineError>;
}

/// A live stream of new block headers from an active subscription.
#[async_trait]
pub trait HeaderSource: Send {
    async fn next_header(&mut self) -> Result<Option<BlockHeader>, PipelineError>;
}

/// Everything a chain pipeline needs from an upstream node. Implemented for
/// the real JSON-RPC/WS client in the daemon crate and for in-memory fakes in
/// tests.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    type Logs: LogSource;
    type Headers: HeaderSource;

    async fn subscribe_logs(&self, addresses: Vec<Address>) -> Result<Self::Logs, PipelineError>;
    async fn subscribe_heads(&self) -> Result<Self::Headers, PipelineError>;
    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, PipelineError>;
    async fn logs_in_range(
        &self,
        addresses: &[Address],
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, PipelineError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Subscribe directly to logs; lowest latency, default.
    LogSubscription,
    /// Subscribe to headers, only collect logs once `confirmations` deep.
    HeadSubscription,
}

pub struct ChainPipelineConfig {
    pub chain_name: String,
    pub variant: Variant,
    pub confirmations: u64,
    pub window_depth: usize,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
}

/// Consecutive reconnect attempts, each already waiting the maximum backoff
/// delay and still failing without processing a single block, before the
/// pipeline gives up and reports a terminal error instead of retrying forever.
const MAX_CONSECUTIVE_FAILURES_AT_MAX_BACKOFF: u32 = 10;

/// The supervised, reconnecting loop for one chain. Owns the recent-block
/// window and drives decoding and dispatch; the upstream client and the
/// queue are the only collaborators it needs.
pub struct ChainPipeline {
    config: ChainPipelineConfig,
    contracts: Arc<ChainContracts>,
    sinks: Arc<SinkSet>,
}

impl ChainPipeline {
    pub fn new(
        config: ChainPipelineConfig,
        contracts: Arc<ChainContracts>,
        sinks: Arc<SinkSet>,
    ) -> Self {
        Self {
            config,
            contracts,
            sinks,
        }
    }

    /// Run until `cancel` fires. Reconnects with exponential backoff after
    /// any error from the inner loop; resets backoff after any connection
    /// that manages to advance the recent-block window at all. Returns
    /// `Err` only if [`MAX_CONSECUTIVE_FAILURES_AT_MAX_BACKOFF`] reconnect
    /// attempts in a row fail without making any such progress, which the
    /// caller should treat as a terminal, unrecoverable condition (e.g.
    /// permanently revoked RPC credentials) rather than retry forever.
    pub async fn run<U: UpstreamClient>(
        self,
        client: U,
        cancel: CancellationToken,
    ) -> Result<(), PipelineError> {
        let metrics = Metrics::get();
        let mut backoff = ExponentialBackoff::new(
            self.config.reconnect_base_delay,
            self.config.reconnect_max_delay,
        );
        let mut window = RecentBlockWindow::new(self.config.window_depth);
        let chain = self.config.chain_name.clone();
        let mut consecutive_failures_at_max = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            metrics
                .backoff_seconds
                .with_label_values(&[&chain])
                .set(0.0);

            let tip_before = window.tip().map(|entry| entry.number);

            let result = match self.config.variant {
                Variant::LogSubscription => {
                    variant_a::run_once(
                        &client,
                        &self.contracts,
                        &self.sinks,
                        &mut window,
                        &chain,
                        cancel.clone(),
                    )
                    .await
                }
                Variant::HeadSubscription => {
                    variant_b::run_once(
                        &client,
                        &self.contracts,
                        &self.sinks,
                        &mut window,
                        &chain,
                        self.config.confirmations,
                        cancel.clone(),
                    )
                    .await
                }
            };

            if cancel.is_cancelled() {
                break;
            }

            let made_progress = window.tip().map(|entry| entry.number) != tip_before;
            if made_progress {
                backoff.reset();
                consecutive_failures_at_max = 0;
            }

            match result {
                Ok(()) => {
                    // Cancelled cleanly mid-loop; outer `if` above will exit.
                    backoff.reset();
                }
                Err(err) => {
                    let delay = backoff.next_delay();
                    if delay >= self.config.reconnect_max_delay {
                        consecutive_failures_at_max += 1;
                    }
                    tracing::warn!(chain = %chain, error = %err, delay_secs = delay.as_secs(), "chain pipeline disconnected, reconnecting");
                    metrics.reconnects.with_label_values(&[&chain]).inc();
                    metrics
                        .backoff_seconds
                        .with_label_values(&[&chain])
                        .set(delay.as_secs_f64());

                    if consecutive_failures_at_max >= MAX_CONSECUTIVE_FAILURES_AT_MAX_BACKOFF {
                        tracing::error!(chain = %chain, error = %err, "chain pipeline failed to make progress after sustained reconnect attempts, giving up");
                        return Err(err);
                    }

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
        tracing::info!(chain = %chain, "chain pipeline stopped");
        Ok(())
    }
}

/// Decode `log`, route it through the appropriate contract, and dispatch the
/// result to `sinks`. Shared by both variants.
async fn decode_and_dispatch(
    log: &RawLog,
    contracts: &ChainContracts,
    sinks: &SinkSet,
    block_timestamp: DateTime<Utc>,
    chain: &str,
    metrics: &Metrics,
) {
    let Some(contract) = contracts.route(&log.address) else {
        return;
    };
    match decoder::decode(log, contract, block_timestamp) {
        Ok(DecodeOutcome::Decoded(event)) => {
            metrics
                .events_decoded
                .with_label_values(&[chain, &contract.contract_name, &event.event_name])
                .inc();
            sinks.dispatch(Arc::new(event)).await;
        }
        Ok(DecodeOutcome::Unmapped) => {
            metrics
                .events_unmapped
                .with_label_values(&[chain, &contract.contract_name])
                .inc();
        }
        Ok(DecodeOutcome::Filtered) => {
            metrics
                .events_filtered
                .with_label_values(&[chain, &contract.contract_name])
                .inc();
        }
        Err(err) => {
            metrics
                .decode_errors
                .with_label_values(&[chain, &contract.contract_name])
                .inc();
            tracing::warn!(chain, contract = %contract.contract_name, error = %err, "malformed event log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{contract::ChainContracts, sink::SinkSet};
    use alloy_primitives::{Address, B256};

    struct NeverLogs;
    #[async_trait]
    impl LogSource for NeverLogs {
        async fn next_log(&mut self) -> Result<Option<RawLog>, PipelineError> {
            Ok(None)
        }
    }

    struct NeverHeaders;
    #[async_trait]
    impl HeaderSource for NeverHeaders {
        async fn next_header(&mut self) -> Result<Option<BlockHeader>, PipelineError> {
            Ok(None)
        }
    }

    struct AlwaysFailsClient;

    #[async_trait]
    impl UpstreamClient for AlwaysFailsClient {
        type Logs = NeverLogs;
        type Headers = NeverHeaders;

        async fn subscribe_logs(&self, _addresses: Vec<Address>) -> Result<Self::Logs, PipelineError> {
            Err(PipelineError::Connection("refused".into()))
        }

        async fn subscribe_heads(&self) -> Result<Self::Headers, PipelineError> {
            Err(PipelineError::Connection("refused".into()))
        }

        async fn header_by_number(&self, number: u64) -> Result<BlockHeader, PipelineError> {
            Ok(BlockHeader {
                number,
                hash: B256::ZERO,
                parent_hash: B256::ZERO,
                timestamp: Utc::now(),
            })
        }

        async fn logs_in_range(
            &self,
            _addresses: &[Address],
            _from: u64,
            _to: u64,
        ) -> Result<Vec<RawLog>, PipelineError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn gives_up_after_sustained_reconnect_failures() {
        observe::metrics::setup_registry(None, None);
        let config = ChainPipelineConfig {
            chain_name: "eth".into(),
            variant: Variant::LogSubscription,
            confirmations: 2,
            window_depth: 8,
            reconnect_base_delay: Duration::from_millis(1),
            reconnect_max_delay: Duration::from_millis(1),
        };
        let contracts = ChainContracts::build("eth".into(), vec![]).unwrap();
        let pipeline = ChainPipeline::new(config, Arc::new(contracts), Arc::new(SinkSet::new(vec![])));
        let cancel = CancellationToken::new();

        let result = pipeline.run(AlwaysFailsClient, cancel).await;
        assert!(matches!(result, Err(PipelineError::Connection(_))));
    }
}

/// Emit `removed=true` deliveries for every event previously decoded from
/// `logs`, in response to a detected reorg. Since the decoder is pure and
/// stateless, redecoding the retracted logs with `removed` set is sufficient;
/// no separate record of prior deliveries needs to be kept by the pipeline.
async fn redeliver_as_removed(
    logs: &[RawLog],
    contracts: &ChainContracts,
    sinks: &SinkSet,
    block_timestamp: DateTime<Utc>,
    chain: &str,
    metrics: &Metrics,
) {
    for log in logs {
        let mut removed_log = log.clone();
        removed_log.removed = true;
        let Some(contract) = contracts.route(&removed_log.address) else {
            continue;
        };
        if let Ok(DecodeOutcome::Decoded(event)) =
            decoder::decode(&removed_log, contract, block_timestamp)
        {
            metrics
                .reorgs_handled
                .with_label_values(&[chain, &contract.contract_name])
                .inc();
            sinks.dispatch(Arc::new(event)).await;
        }
    }
}
