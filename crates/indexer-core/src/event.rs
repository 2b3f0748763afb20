use {
    crate::contract::ContractDescriptor,
    alloy_primitives::{Address, B256},
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::{collections::BTreeMap, sync::Arc},
};

/// A decoded argument value, normalized to the representations a sink can
/// serialize without needing to know Solidity's type system.
///
/// Byte-kind values (`address`, `bytes`, `bytesN`) are always canonical lowercase
/// `0x`-prefixed hex, independent of whether they came from a topic or from data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    /// Decimal string; large enough that JSON numeric encoding would lose precision.
    Uint(String),
    Int(String),
    Bool(bool),
    /// Canonical `0x`-prefixed lowercase hex, byte-kind value.
    Hex(String),
    Unsupported { ty: String, raw: String },
}

/// One decoded, ordered log: the event's arguments plus the chain-level
/// coordinates a sink needs for ordering, deduplication, and reorg handling.
#[derive(Clone, Debug)]
pub struct TypedEvent {
    pub chain: String,
    pub contract: Arc<ContractDescriptor>,
    pub address: Address,
    pub event_name: String,
    pub args: BTreeMap<String, ArgValue>,
    pub block_number: u64,
    pub block_hash: B256,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
    /// True when this event is being retracted due to a reorg; sinks must treat
    /// it as "remove the previously delivered event with this identity", not as
    /// a new occurrence.
    pub removed: bool,
}

impl TypedEvent {
    /// The tuple sinks use to identify "the same occurrence" across deliveries,
    /// independent of `removed`.
    pub fn identity(&self) -> (B256, u64) {
        (self.transaction_hash, self.log_index)
    }
}
