//! Ambient process concerns shared by every binary and library crate:
//! structured logging, panic reporting, and the Prometheus metric registry
//! plus its `/metrics` and `/health` HTTP surface.

pub mod metrics;
pub mod panic_hook;
pub mod tracing;
