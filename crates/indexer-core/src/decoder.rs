//! Pure decoding of a [`RawLog`] against a [`ContractDescriptor`]'s interface
//! definition into a [`TypedEvent`]. Contains no I/O: callers supply the
//! block timestamp, already resolved from the header.

use {
    crate::{
        contract::{ContractDescriptor, EventDefinition, EventParam},
        event::{ArgValue, TypedEvent},
        log::RawLog,
    },
    alloy_primitives::U256,
    chrono::{DateTime, Utc},
    std::sync::Arc,
};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("log for contract {contract} has {got} indexed topics, event {event} declares {expected}")]
    TopicCountMismatch {
        contract: String,
        event: String,
        expected: usize,
        got: usize,
    },
    #[error("log for contract {contract} has {got} data bytes, event {event} expects a multiple of 32 for {expected} word(s)")]
    DataLengthMismatch {
        contract: String,
        event: String,
        expected: usize,
        got: usize,
    },
}

/// Outcome of attempting to decode one log.
pub enum DecodeOutcome {
    /// Decoded successfully against a known, whitelisted event.
    Decoded(TypedEvent),
    /// `topics[0]` does not match any event this contract declares; skip silently.
    Unmapped,
    /// Matched a known event, but it is not in the contract's whitelist.
    Filtered,
}

/// Decode `log` using `contract`'s interface definition. `block_timestamp` must be
/// the timestamp of `log.block_hash` as resolved by the caller.
pub fn decode(
    log: &RawLog,
    contract: &Arc<ContractDescriptor>,
    block_timestamp: DateTime<Utc>,
) -> Result<DecodeOutcome, DecodeError> {
    let Some(topic0) = log.topics.first() else {
        return Ok(DecodeOutcome::Unmapped);
    };
    let Some(event) = contract.event_for_topic0(topic0) else {
        return Ok(DecodeOutcome::Unmapped);
    };
    if !contract.is_whitelisted(&event.name) {
        return Ok(DecodeOutcome::Filtered);
    }

    let indexed: Vec<&EventParam> = event.indexed_params().collect();
    if log.topics.len() - 1 != indexed.len() {
        return Err(DecodeError::TopicCountMismatch {
            contract: contract.contract_name.clone(),
            event: event.name.clone(),
            expected: indexed.len(),
            got: log.topics.len() - 1,
        });
    }

    let data_params: Vec<&EventParam> = event.data_params().collect();
    let expected_data_len = data_params.len() * 32;
    let has_dynamic_param = data_params.iter().any(|param| is_dynamic_type(&param.ty));
    // Every non-indexed param occupies exactly one head word: fixed-width types
    // hold their value there, dynamic types (`bytes`, `string`, arrays) hold an
    // offset into a tail section that follows. A dynamic param's tail adds bytes
    // past `expected_data_len`, so only an event with none can require exact
    // equality; one with any dynamic param only needs the head to be present.
    let data_len_ok = if has_dynamic_param {
        log.data.len() >= expected_data_len
    } else {
        log.data.len() == expected_data_len
    };
    if !data_len_ok {
        return Err(DecodeError::DataLengthMismatch {
            contract: contract.contract_name.clone(),
            event: event.name.clone(),
            expected: data_params.len(),
            got: log.data.len(),
        });
    }

    let mut args = std::collections::BTreeMap::new();
    for (param, topic) in indexed.iter().zip(log.topics.iter().skip(1)) {
        args.insert(param.name.clone(), decode_word(&param.ty, topic.as_slice()));
    }
    for (param, word) in data_params.iter().zip(log.data.chunks_exact(32)) {
        args.insert(param.name.clone(), decode_word(&param.ty, word));
    }

    Ok(DecodeOutcome::Decoded(TypedEvent {
        chain: contract.chain_name.clone(),
        contract: contract.clone(),
        address: log.address,
        event_name: event.name.clone(),
        args,
        block_number: log.block_number,
        block_hash: log.block_hash,
        block_timestamp,
        transaction_hash: log.transaction_hash,
        transaction_index: log.transaction_index,
        log_index: log.log_index,
        removed: log.removed,
    }))
}

fn is_dynamic_type(ty: &str) -> bool {
    ty == "bytes" || ty == "string" || ty.ends_with("[]")
}

/// Decode one right-aligned 32-byte ABI word according to a Solidity type string.
///
/// Dynamic types (`string`, `bytes`, arrays) that appear non-indexed are ABI-encoded
/// as an offset in their own word, not a fixed-width value; decoding their tail is
/// out of scope here, so the offset word itself is surfaced as an [`ArgValue::Unsupported`].
fn decode_word(ty: &str, word: &[u8]) -> ArgValue {
    if ty == "bool" {
        return ArgValue::Bool(word.iter().any(|b| *b != 0));
    }
    if ty == "address" {
        return ArgValue::Hex(const_hex::encode_prefixed(&word[12..]));
    }
    if ty.starts_with("uint") {
        return ArgValue::Uint(U256::from_be_slice(word).to_string());
    }
    if ty.starts_with("int") {
        return ArgValue::Int(decode_signed(word));
    }
    if let Some(n) = ty.strip_prefix("bytes").filter(|s| !s.is_empty()) {
        if let Ok(n) = n.parse::<usize>() {
            return ArgValue::Hex(const_hex::encode_prefixed(&word[..n.min(32)]));
        }
    }
    if ty == "bytes" || ty == "string" {
        return ArgValue::Unsupported {
            ty: ty.to_string(),
            raw: const_hex::encode_prefixed(word),
        };
    }
    ArgValue::Unsupported {
        ty: ty.to_string(),
        raw: const_hex::encode_prefixed(word),
    }
}

fn decode_signed(word: &[u8]) -> String {
    let negative = word[0] & 0x80 != 0;
    if !negative {
        return U256::from_be_slice(word).to_string();
    }
    let value = U256::from_be_slice(word);
    let two_complement = (!value).wrapping_add(U256::from(1));
    format!("-{two_complement}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDescriptor;
    use alloy_primitives::{Address, B256};
    use std::collections::{HashMap, HashSet};

    fn transfer_contract() -> Arc<ContractDescriptor> {
        let def = EventDefinition::new(
            "Transfer".into(),
            false,
            vec![
                EventParam {
                    name: "from".into(),
                    ty: "address".into(),
                    indexed: true,
                },
                EventParam {
                    name: "to".into(),
                    ty: "address".into(),
                    indexed: true,
                },
                EventParam {
                    name: "value".into(),
                    ty: "uint256".into(),
                    indexed: false,
                },
            ],
        );
        let mut events = HashMap::new();
        events.insert(def.topic0, def);
        Arc::new(ContractDescriptor {
            chain_name: "eth".into(),
            contract_name: "token".into(),
            addresses: HashSet::new(),
            events,
            whitelist: HashSet::new(),
        })
    }

    fn topic_from_address(address: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        B256::from(word)
    }

    #[test]
    fn decodes_transfer_event() {
        let contract = transfer_contract();
        let topic0 = contract.events.keys().next().copied().unwrap();
        let from = Address::repeat_byte(0x11);
        let to = Address::repeat_byte(0x22);
        let mut data = [0u8; 32];
        data[31] = 42;
        let log = RawLog {
            address: Address::repeat_byte(0xAA),
            topics: vec![topic0, topic_from_address(from), topic_from_address(to)],
            data: data.to_vec(),
            block_number: 10,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        let outcome = decode(&log, &contract, Utc::now()).unwrap();
        let DecodeOutcome::Decoded(event) = outcome else {
            panic!("expected decode");
        };
        assert_eq!(event.event_name, "Transfer");
        assert_eq!(event.args.get("value"), Some(&ArgValue::Uint("42".into())));
    }

    #[test]
    fn unmapped_topic_is_skipped() {
        let contract = transfer_contract();
        let log = RawLog {
            address: Address::repeat_byte(0xAA),
            topics: vec![B256::repeat_byte(0xFF)],
            data: vec![],
            block_number: 10,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        assert!(matches!(decode(&log, &contract, Utc::now()).unwrap(), DecodeOutcome::Unmapped));
    }

    #[test]
    fn dynamic_data_param_tolerates_tail_bytes() {
        let def = EventDefinition::new(
            "Note".into(),
            false,
            vec![
                EventParam { name: "from".into(), ty: "address".into(), indexed: true },
                EventParam { name: "memo".into(), ty: "string".into(), indexed: false },
            ],
        );
        let mut events = HashMap::new();
        events.insert(def.topic0, def);
        let contract = Arc::new(ContractDescriptor {
            chain_name: "eth".into(),
            contract_name: "token".into(),
            addresses: HashSet::new(),
            events,
            whitelist: HashSet::new(),
        });
        let topic0 = contract.events.keys().next().copied().unwrap();
        let from = Address::repeat_byte(0x11);
        // One head word (offset) plus a tail: length word + one word of content.
        let mut data = vec![0u8; 32 * 3];
        data[31] = 32; // offset to the tail
        data[95] = 5; // string length
        data[96..101].copy_from_slice(b"hello");
        let log = RawLog {
            address: Address::repeat_byte(0xAA),
            topics: vec![topic0, topic_from_address(from)],
            data,
            block_number: 10,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        let outcome = decode(&log, &contract, Utc::now()).unwrap();
        let DecodeOutcome::Decoded(event) = outcome else {
            panic!("expected decode");
        };
        assert!(matches!(event.args.get("memo"), Some(ArgValue::Unsupported { .. })));
    }

    #[test]
    fn malformed_topic_count_is_an_error() {
        let contract = transfer_contract();
        let topic0 = contract.events.keys().next().copied().unwrap();
        let log = RawLog {
            address: Address::repeat_byte(0xAA),
            topics: vec![topic0, topic_from_address(Address::repeat_byte(0x11))],
            data: vec![0u8; 32],
            block_number: 10,
            block_hash: B256::repeat_byte(0x01),
            transaction_hash: B256::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        };
        assert!(matches!(
            decode(&log, &contract, Utc::now()),
            Err(DecodeError::TopicCountMismatch { .. })
        ));
    }
}
