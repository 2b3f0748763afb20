//! Chain-agnostic core of the event indexer: decoding, the recent-block
//! window, the bounded delivery queue, the sink boundary, the per-chain
//! pipeline, and the supervisor that starts and stops all of it together.
//! Nothing here knows how to actually talk to a node or a database; those
//! live behind the [`pipeline::UpstreamClient`] and [`sink::Sink`] traits.

pub mod contract;
pub mod decoder;
pub mod event;
pub mod log;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod supervisor;
pub mod window;

pub use {
    contract::{ChainContracts, ContractDescriptor, EventDefinition, EventParam},
    event::{ArgValue, TypedEvent},
    log::RawLog,
    sink::{ConsoleSink, Sink, SinkSet},
};
