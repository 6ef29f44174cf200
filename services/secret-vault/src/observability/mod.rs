//! Observability Module
//!
//! Prometheus metrics for the vault. Logging goes through `tracing`, set up
//! by `rust_common::init_tracing`.

pub mod metrics;

pub use metrics::VaultMetrics;
