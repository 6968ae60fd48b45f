//! # Fanlog
//!
//! A pluggable logging facade: one dispatcher fans structured log events out
//! to independently configured sinks, with batched asynchronous delivery to
//! Loki and Alertmanager HTTP endpoints.
//!
//! ## Features
//!
//! - **Fan-out Dispatch**: Per-level callback registration with a minimum
//!   level gate
//! - **Batched Network Sinks**: One background flusher per sink, flushing on
//!   a timer or at shutdown, with gzip JSON delivery
//! - **Degrades Locally**: Failed batches are re-emitted through the
//!   synchronous console path instead of being lost
//! - **Thread Safe**: Designed for concurrent producers

pub mod batch;
pub mod core;
pub mod macros;
pub mod sinks;

pub mod prelude {
    pub use crate::batch::{BatchSink, EventQueue, Flusher, FlusherHandle, OverflowPolicy};
    pub use crate::core::{
        AttrMap, AttrValue, Dispatcher, LogCallback, LogEvent, LogLevel, LoggerError, Result,
        SinkMetrics, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::sinks::{
        Alert, AlertmanagerConfig, ConsoleSink, FileSink, LokiConfig,
    };
}

pub use crate::batch::{BatchSink, EventQueue, Flusher, FlusherHandle, OverflowPolicy};
pub use crate::core::{
    AttrMap, AttrValue, Dispatcher, LogCallback, LogEvent, LogLevel, LoggerError, Result,
    SinkMetrics, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{
    Alert, AlertmanagerConfig, AlertmanagerSink, ConsoleSink, FileSink, LokiConfig, LokiSink,
};
