//! Prometheus metrics for the KIT operator
//!
//! Engine metrics are updated by the default cycle observer and served over
//! HTTP together with health and readiness probes.

mod prometheus;

pub use prometheus::*;
