//! The sink boundary: anything that wants to receive decoded events implements
//! [`Sink`]. A [`SinkSet`] fans a single event out to every configured sink;
//! delivery to one sink is independent of the others.

use {crate::event::TypedEvent, async_trait::async_trait, std::sync::Arc};

/// A destination for decoded events. Implementations must not block the
/// caller for longer than it takes to hand the event off: a sink backed by
/// network I/O (e.g. a database) should own its own internal queue and
/// background consumer, matching the bounded-queue pattern in [`crate::queue`].
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    /// Accept one decoded event. `event.removed` indicates the sink should
    /// retract a previously delivered occurrence rather than record a new one.
    async fn accept(&self, event: Arc<TypedEvent>);
}

/// Delivers every event to every configured sink, in configuration order.
pub struct SinkSet {
    sinks: Vec<Arc<dyn Sink>>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub async fn dispatch(&self, event: Arc<TypedEvent>) {
        for sink in &self.sinks {
            sink.accept(event.clone()).await;
        }
    }

    pub fn sinks(&self) -> &[Arc<dyn Sink>] {
        &self.sinks
    }
}

/// The simplest sink: logs each event as a structured `tracing` record. Useful
/// on its own for development and always safe to run alongside heavier sinks.
pub struct ConsoleSink;

#[async_trait]
impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn accept(&self, event: Arc<TypedEvent>) {
        let args = match serde_json::to_string(&event.args) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize event arguments");
                String::from("{}")
            }
        };
        if event.removed {
            tracing::info!(
                chain = %event.chain,
                contract = %event.contract.contract_name,
                event = %event.event_name,
                block_number = event.block_number,
                transaction_hash = %event.transaction_hash,
                log_index = event.log_index,
                "event removed due to reorg"
            );
        } else {
            tracing::info!(
                chain = %event.chain,
                contract = %event.contract.contract_name,
                event = %event.event_name,
                block_number = event.block_number,
                transaction_hash = %event.transaction_hash,
                log_index = event.log_index,
                args = %args,
                "decoded event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractDescriptor;
    use alloy_primitives::{Address, B256};
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::Mutex;

    struct RecordingSink {
        name: String,
        received: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn accept(&self, event: Arc<TypedEvent>) {
            self.received.lock().unwrap().push(event.removed);
        }
    }

    fn sample_event() -> Arc<TypedEvent> {
        Arc::new(TypedEvent {
            chain: "eth".into(),
            contract: Arc::new(ContractDescriptor {
                chain_name: "eth".into(),
                contract_name: "token".into(),
                addresses: HashSet::new(),
                events: HashMap::new(),
                whitelist: HashSet::new(),
            }),
            address: Address::repeat_byte(1),
            event_name: "Transfer".into(),
            args: BTreeMap::new(),
            block_number: 1,
            block_hash: B256::repeat_byte(1),
            block_timestamp: Utc::now(),
            transaction_hash: B256::repeat_byte(2),
            transaction_index: 0,
            log_index: 0,
            removed: false,
        })
    }

    #[tokio::test]
    async fn dispatches_to_every_sink() {
        let a = Arc::new(RecordingSink { name: "a".into(), received: Mutex::new(vec![]) });
        let b = Arc::new(RecordingSink { name: "b".into(), received: Mutex::new(vec![]) });
        let set = SinkSet::new(vec![a.clone(), b.clone()]);
        set.dispatch(sample_event()).await;
        assert_eq!(a.received.lock().unwrap().len(), 1);
        assert_eq!(b.received.lock().unwrap().len(), 1);
    }
}
