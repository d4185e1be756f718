//! capwork task router
//!
//! Provides:
//! - Just-in-time assignment over ranked candidates with top-N fallback
//! - Atomic per-agent capacity claims under a single critical section
//! - Queue drain on completion, reassignment and explicit hooks
//! - Advisory backpressure and per-instance Prometheus metrics

pub mod metrics;
pub mod router;
pub mod stats;

pub use metrics::*;
pub use router::*;
pub use stats::*;
