//! Logging, metrics and error-handling utilities.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig, LogLevel};
pub use metrics::{EpochMetrics, PhaseTally};
