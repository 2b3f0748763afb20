//! Variant A: subscribe directly to the node's log stream. Reorgs are
//! reported by the node itself via `removed=true` on the affected logs; the
//! recent-block window is used only for gap detection and metrics, not to
//! decide whether a log should be retracted.

use {
    super::{decode_and_dispatch, redeliver_as_removed, LogSource, PipelineError, UpstreamClient},
    crate::{contract::ChainContracts, metrics::Metrics, sink::SinkSet, window::RecentBlockWindow},
    tokio_util::sync::CancellationToken,
};

pub async fn run_once<U: UpstreamClient>(
    client: &U,
    contracts: &ChainContracts,
    sinks: &SinkSet,
    window: &mut RecentBlockWindow,
    chain: &str,
    cancel: CancellationToken,
) -> Result<(), PipelineError> {
    let metrics = Metrics::get();
    let addresses: Vec<_> = contracts.addresses().copied().collect();
    let mut logs = client.subscribe_logs(addresses).await?;
    tracing::info!(chain, "subscribed to log stream");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            log = logs.next_log() => log,
        };

        let Some(log) = next? else {
            return Err(PipelineError::SubscriptionEnded);
        };

        let timestamp = match window.lookup(log.block_number).and_then(|entry| entry.timestamp) {
            Some(timestamp) => timestamp,
            None => {
                let header = client.header_by_number(log.block_number).await?;
                // Gaps and out-of-order same-number deliveries are both expected
                // and harmless here; `add_tip` rejects the latter, which we ignore.
                let _ = window.add_tip(header.number, header.hash, header.timestamp);
                header.timestamp
            }
        };

        if log.removed {
            redeliver_as_removed(std::slice::from_ref(&log), contracts, sinks, timestamp, chain, metrics).await;
            continue;
        }

        decode_and_dispatch(&log, contracts, sinks, timestamp, chain, metrics).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        contract::ContractDescriptor,
        log::RawLog,
        pipeline::{BlockHeader, HeaderSource},
    };
    use alloy_primitives::{Address, B256};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::{
        collections::{HashMap, HashSet, VecDeque},
        sync::Mutex,
    };

    struct FakeLogs(Mutex<VecDeque<Option<RawLog>>>);

    #[async_trait]
    impl LogSource for FakeLogs {
        async fn next_log(&mut self) -> Result<Option<RawLog>, PipelineError> {
            Ok(self.0.lock().unwrap().pop_front().flatten())
        }
    }

    struct FakeHeaders;

    #[async_trait]
    impl HeaderSource for FakeHeaders {
        async fn next_header(&mut self) -> Result<Option<BlockHeader>, PipelineError> {
            Ok(None)
        }
    }

    struct FakeClient {
        logs: Mutex<Option<VecDeque<Option<RawLog>>>>,
        header_fetches: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl UpstreamClient for FakeClient {
        type Logs = FakeLogs;
        type Headers = FakeHeaders;

        async fn subscribe_logs(&self, _addresses: Vec<Address>) -> Result<Self::Logs, PipelineError> {
            let queue = self.logs.lock().unwrap().take().unwrap_or_default();
            Ok(FakeLogs(Mutex::new(queue)))
        }

        async fn subscribe_heads(&self) -> Result<Self::Headers, PipelineError> {
            Ok(FakeHeaders)
        }

        async fn header_by_number(&self, number: u64) -> Result<BlockHeader, PipelineError> {
            self.header_fetches.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(BlockHeader {
                number,
                hash: B256::repeat_byte(number as u8),
                parent_hash: B256::repeat_byte((number.saturating_sub(1)) as u8),
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
    async fn ends_when_subscription_runs_dry() {
        let address = Address::repeat_byte(0xAA);
        let log = RawLog {
            address,
            topics: vec![B256::repeat_byte(0xFF)],
            data: vec![],
            block_number: 1,
            block_hash: B256::repeat_byte(1),
            transaction_hash: B256::repeat_byte(2),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        let client = FakeClient {
            logs: Mutex::new(Some(VecDeque::from([Some(log)]))),
            header_fetches: std::sync::atomic::AtomicU32::new(0),
        };
        let contract = std::sync::Arc::new(ContractDescriptor {
            chain_name: "eth".into(),
            contract_name: "token".into(),
            addresses: HashSet::from([address]),
            events: HashMap::new(),
            whitelist: HashSet::new(),
        });
        let contracts = ChainContracts::build("eth".into(), vec![contract]).unwrap();
        let sinks = SinkSet::new(vec![]);
        let mut window = RecentBlockWindow::new(8);
        let cancel = CancellationToken::new();

        let result = run_once(&client, &contracts, &sinks, &mut window, "eth", cancel).await;
        assert!(matches!(result, Err(PipelineError::SubscriptionEnded)));
    }

    #[tokio::test]
    async fn cached_block_timestamp_skips_header_fetch() {
        let address = Address::repeat_byte(0xAA);
        let log = RawLog {
            address,
            topics: vec![B256::repeat_byte(0xFF)],
            data: vec![],
            block_number: 1,
            block_hash: B256::repeat_byte(1),
            transaction_hash: B256::repeat_byte(2),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        let client = FakeClient {
            logs: Mutex::new(Some(VecDeque::from([Some(log)]))),
            header_fetches: std::sync::atomic::AtomicU32::new(0),
        };
        let contract = std::sync::Arc::new(ContractDescriptor {
            chain_name: "eth".into(),
            contract_name: "token".into(),
            addresses: HashSet::from([address]),
            events: HashMap::new(),
            whitelist: HashSet::new(),
        });
        let contracts = ChainContracts::build("eth".into(), vec![contract]).unwrap();
        let sinks = SinkSet::new(vec![]);
        let mut window = RecentBlockWindow::new(8);
        window.add_tip(1, B256::repeat_byte(1), Utc::now()).unwrap();
        let cancel = CancellationToken::new();

        let result = run_once(&client, &contracts, &sinks, &mut window, "eth", cancel).await;
        assert!(matches!(result, Err(PipelineError::SubscriptionEnded)));
        assert_eq!(client.header_fetches.load(std::sync::atomic::Ordering::Relaxed), 0);
    }
}
