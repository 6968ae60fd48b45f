//! Sink implementations

pub mod alertmanager;
pub mod console;
pub mod file;
pub mod loki;

pub use alertmanager::{Alert, AlertmanagerConfig, AlertmanagerSink};
pub use console::ConsoleSink;
pub use file::FileSink;
pub use loki::{LokiConfig, LokiSink};
