//! Observability module
//!
//! This module provides:
//! - Metrics collection (`metrics` facade, exported by the binary)
//! - Structured event logging

pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::MetricsCollector;
pub use structured_logger::StructuredLogger;
