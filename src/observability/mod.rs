//! # Observability
//!
//! Installs the process-wide `tracing` subscriber. Everything else in the
//! crate only emits events through the `tracing` macros.

mod logger;

pub use logger::{build_filter, init_logging, LogFormat, ObservabilityError};
