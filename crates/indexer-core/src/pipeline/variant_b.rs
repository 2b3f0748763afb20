//! Variant B: subscribe to block headers only, and only query for logs once a
//! block is `confirmations` deep. Trades latency for never having to trust a
//! node's own `removed` flag: reorgs are detected locally by comparing a new
//! header's `parent_hash` against the hash this pipeline already recorded for
//! that number, and handled by re-querying and redelivering the affected range.

use {
    super::{decode_and_dispatch, redeliver_as_removed, HeaderSource, PipelineError, UpstreamClient},
    crate::{
        contract::ChainContracts,
        metrics::Metrics,
        sink::SinkSet,
        window::{BlockState, RecentBlockWindow},
    },
    tokio_util::sync::CancellationToken,
};

pub async fn run_once<U: UpstreamClient>(
    client: &U,
    contracts: &ChainContracts,
    sinks: &SinkSet,
    window: &mut RecentBlockWindow,
    chain: &str,
    confirmations: u64,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let metrics = Metrics::get();
    let addresses: Vec<_> = contracts.addresses().copied().collect();
    let mut headers = client.subscribe_heads().await?;
    tracing::info!(chain, confirmations, "subscribed to head stream");
    let mut last_delivered: Option<u64> = window.tip().map(|e| e.number);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            header = headers.next_header() => header,
        };
        let Some(header) = next? else {
            return Err(PipelineError::SubscriptionEnded);
        };

        if let Some(parent) = window.lookup(header.number.saturating_sub(1)) {
            if let Some(parent_hash) = parent.hash {
                if parent_hash != header.parent_hash && parent.state != BlockState::Backfilling {
                    tracing::warn!(chain, number = header.number, "parent hash mismatch, reorg suspected");
                    metrics.reorg_errors.with_label_values(&[chain]).inc();
                    window
                        .start_backfill(header.number.saturating_sub(1))
                        .ok();
                    return Err(PipelineError::Reorg(header.number));
                }
            }
        }

        window
            .add_tip(header.number, header.hash, header.timestamp)
            .ok();

        if let Some(anchor) = window.next_backfill() {
            let from = anchor.saturating_sub(confirmations.max(1));
            let retracted = client.logs_in_range(&addresses, from, anchor).await?;
            redeliver_as_removed(&retracted, contracts, sinks, header.timestamp, chain, metrics).await;
            window.confirm_backfill(anchor, header.hash, header.timestamp);
        }

        let confirmed_number = header.number.saturating_sub(confirmations);
        let from = last_delivered.map_or(confirmed_number, |n| n + 1);
        if confirmed_number >= from {
            let logs = client.logs_in_range(&addresses, from, confirmed_number).await?;
            for log in &logs {
                let log_header = client.header_by_number(log.block_number).await?;
                decode_and_dispatch(log, contracts, sinks, log_header.timestamp, chain, metrics).await;
            }
            last_delivered = Some(confirmed_number);
        }
    }
}
