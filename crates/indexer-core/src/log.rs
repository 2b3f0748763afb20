use alloy_primitives::{Address, B256};

/// A single log entry as delivered by the upstream node, independent of any
/// particular transport (`eth_subscribe("logs")`, `eth_getLogs`, or a head
/// subscription that is later resolved into logs).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    /// `topics[0]` is the event selector when present; anonymous events have none.
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: B256,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
    /// Set by the node when this log is being retracted because of a reorg.
    pub removed: bool,
}
