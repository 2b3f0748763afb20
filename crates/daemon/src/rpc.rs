//! The real [`UpstreamClient`] implementation: a JSON-RPC/WS connection to an
//! Ethereum-compatible node via `alloy`. In-memory fakes covering the same
//! trait live alongside the pipeline's own tests; this is the only
//! implementation that talks to a live node.

use {
    alloy_primitives::Address,
    alloy_provider::{Provider, ProviderBuilder, RootProvider},
    alloy_rpc_types_eth::{BlockNumberOrTag, Filter, Header as RpcHeader, Log as RpcLog},
    alloy_transport_ws::WsConnect,
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    futures::{Stream, StreamExt},
    indexer_core::{
        log::RawLog,
        pipeline::{BlockHeader, HeaderSource, LogSource, PipelineError, UpstreamClient},
    },
    std::pin::Pin,
};

pub struct RpcClient {
    provider: RootProvider,
}

impl RpcClient {
    pub async fn connect(url: &url::Url) -> Result<Self, PipelineError> {
        let provider = ProviderBuilder::new()
            .on_ws(WsConnect::new(url.as_str()))
            .await
            .map_err(|err| PipelineError::Connection(err.to_string()))?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl UpstreamClient for RpcClient {
    type Logs = LogStream;
    type Headers = HeaderStream;

    async fn subscribe_logs(&self, addresses: Vec<Address>) -> Result<Self::Logs, PipelineError> {
        let filter = Filter::new().address(addresses);
        let subscription = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|err| PipelineError::Rpc(err.to_string()))?;
        Ok(LogStream {
            inner: Box::pin(subscription.into_stream()),
        })
    }

    async fn subscribe_heads(&self) -> Result<Self::Headers, PipelineError> {
        let subscription = self
            .provider
            .subscribe_blocks()
            .await
            .map_err(|err| PipelineError::Rpc(err.to_string()))?;
        Ok(HeaderStream {
            inner: Box::pin(subscription.into_stream()),
        })
    }

    async fn header_by_number(&self, number: u64) -> Result<BlockHeader, PipelineError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(|err| PipelineError::Rpc(err.to_string()))?
            .ok_or_else(|| PipelineError::Rpc(format!("block {number} not found")))?;
        Ok(header_from_rpc(&block.header))
    }

    async fn logs_in_range(
        &self,
        addresses: &[Address],
        from: u64,
        to: u64,
    ) -> Result<Vec<RawLog>, PipelineError> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .from_block(from)
            .to_block(to);
        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|err| PipelineError::Rpc(err.to_string()))?;
        Ok(logs.iter().filter_map(raw_log_from_rpc).collect())
    }
}

pub struct LogStream {
    inner: Pin<Box<dyn Stream<Item = RpcLog> + Send>>,
}

#[async_trait]
impl LogSource for LogStream {
    async fn next_log(&mut self) -> Result<Option<RawLog>, PipelineError> {
        loop {
            match self.inner.next().await {
                None => return Ok(None),
                Some(log) => {
                    if let Some(raw) = raw_log_from_rpc(&log) {
                        return Ok(Some(raw));
                    }
                    // Pending log (no block assigned yet); wait for the next one.
                }
            }
        }
    }
}

pub struct HeaderStream {
    inner: Pin<Box<dyn Stream<Item = RpcHeader> + Send>>,
}

#[async_trait]
impl HeaderSource for HeaderStream {
    async fn next_header(&mut self) -> Result<Option<BlockHeader>, PipelineError> {
        Ok(self.inner.next().await.map(|header| header_from_rpc(&header)))
    }
}

fn header_from_rpc(header: &RpcHeader) -> BlockHeader {
    BlockHeader {
        number: header.number,
        hash: header.hash,
        parent_hash: header.parent_hash,
        timestamp: timestamp_from_seconds(header.timestamp),
    }
}

fn raw_log_from_rpc(log: &RpcLog) -> Option<RawLog> {
    Some(RawLog {
        address: log.inner.address,
        topics: log.inner.topics().to_vec(),
        data: log.inner.data().to_vec(),
        block_number: log.block_number?,
        block_hash: log.block_hash?,
        transaction_hash: log.transaction_hash?,
        transaction_index: log.transaction_index?,
        log_index: log.log_index?,
        removed: log.removed,
    })
}

fn timestamp_from_seconds(seconds: u64) -> DateTime<Utc> {
    let signed = i64::try_from(seconds).unwrap_or(i64::MAX);
    DateTime::from_timestamp(signed, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}
