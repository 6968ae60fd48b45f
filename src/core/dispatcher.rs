//! Event dispatcher: fan-out, sink registration, shutdown
//!
//! One `Dispatcher` is constructed at process start and shared by reference
//! with every producer. It gates events on the minimum level, fans them out
//! to the callbacks registered per level, and owns the lifecycle of the
//! batching sinks.

use crate::batch::flusher::{Flusher, FlusherHandle};
use crate::batch::queue::EventQueue;
use crate::batch::transport;
use crate::core::error::{LoggerError, Result};
use crate::core::event::{AttrMap, LogEvent};
use crate::core::level::LogLevel;
use crate::core::metrics::SinkMetrics;
use crate::sinks::alertmanager::{Alert, AlertmanagerConfig, AlertmanagerSink};
use crate::sinks::console::ConsoleSink;
use crate::sinks::file::FileSink;
use crate::sinks::loki::{LokiConfig, LokiSink};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Default shutdown timeout for dispatcher cleanup (5 seconds)
///
/// Used when a flusher handle is dropped without explicit shutdown.
/// For custom timeout control, use [`Dispatcher::shutdown`] instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Callback invoked for every event at a registered level
pub type LogCallback = Arc<dyn Fn(&LogEvent) + Send + Sync>;

pub struct Dispatcher {
    min_level: RwLock<LogLevel>,
    /// Callback lists indexed by level discriminant
    callbacks: RwLock<[Vec<LogCallback>; 4]>,
    /// At most one alert sink per dispatcher
    alert_queue: RwLock<Option<EventQueue<Alert>>>,
    sinks: RwLock<Vec<SinkRuntime>>,
}

struct SinkRuntime {
    name: String,
    handle: FlusherHandle,
    metrics: Arc<SinkMetrics>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level: RwLock::new(min_level),
            callbacks: RwLock::new([Vec::new(), Vec::new(), Vec::new(), Vec::new()]),
            alert_queue: RwLock::new(None),
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    /// Register a callback for a single level
    pub fn register_callback(&self, level: LogLevel, callback: LogCallback) {
        self.callbacks.write()[level as usize].push(callback);
    }

    /// Register one callback for several levels
    pub fn register_callback_for(&self, levels: &[LogLevel], callback: LogCallback) {
        let mut table = self.callbacks.write();
        for level in levels {
            table[*level as usize].push(Arc::clone(&callback));
        }
    }

    /// Dispatch one event to every callback registered for its level.
    ///
    /// The callback list is copied under the read lock and invoked outside
    /// it, so sink code never runs while the registry is locked and a
    /// callback may itself register further callbacks.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, attributes: AttrMap) {
        if level < *self.min_level.read() {
            return;
        }

        let event = LogEvent::new(level, message).with_attributes(attributes);

        let callbacks = self.callbacks.read()[level as usize].clone();
        for callback in callbacks {
            callback(&event);
        }
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message, AttrMap::new());
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message, AttrMap::new());
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message, AttrMap::new());
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message, AttrMap::new());
    }

    /// Helper for structured info logging
    pub fn info_with(&self, message: impl Into<String>, attributes: AttrMap) {
        self.emit(LogLevel::Info, message, attributes);
    }

    /// Helper for structured error logging
    pub fn error_with(&self, message: impl Into<String>, attributes: AttrMap) {
        self.emit(LogLevel::Error, message, attributes);
    }

    /// Register a console sink for the given levels
    pub fn register_console_sink(&self, sink: ConsoleSink, levels: &[LogLevel]) {
        let sink = Arc::new(sink);
        self.register_callback_for(
            levels,
            Arc::new(move |event: &LogEvent| sink.write_event(event)),
        );
    }

    /// Register a file sink for the given levels.
    ///
    /// Write failures are reported to stderr; a broken file must not take
    /// the process down.
    pub fn register_file_sink(&self, sink: FileSink, levels: &[LogLevel]) {
        let sink = Arc::new(sink);
        self.register_callback_for(
            levels,
            Arc::new(move |event: &LogEvent| {
                if let Err(e) = sink.write_event(event) {
                    eprintln!("[FANLOG ERROR] file sink write failed: {}", e);
                }
            }),
        );
    }

    /// Register a batching log-push sink.
    ///
    /// Probes `<url>/ready` first; on probe exhaustion the sink is not
    /// registered and the error is returned to the caller, who decides
    /// whether to continue without it.
    pub fn register_log_sink(&self, config: LokiConfig) -> Result<()> {
        config.validate()?;
        transport::wait_until_ready(&config.url, config.ready_attempts, config.ready_retry_delay)?;

        let metrics = Arc::new(SinkMetrics::new());
        let (queue, receiver) = EventQueue::bounded(
            "loki",
            config.queue_capacity,
            config.overflow_policy.clone(),
            Arc::clone(&metrics),
        );
        let sink = LokiSink::new(&config)?;
        let handle = Flusher::spawn(sink, receiver, config.batch_wait, Arc::clone(&metrics));

        for level in &config.levels {
            let queue = queue.clone();
            self.register_callback(
                *level,
                Arc::new(move |event: &LogEvent| queue.enqueue(event.clone())),
            );
        }

        self.sinks.write().push(SinkRuntime {
            name: handle.name().to_string(),
            handle,
            metrics,
        });
        Ok(())
    }

    /// Register the batching alert sink.
    ///
    /// At most one alert sink may be active; a duplicate registration is
    /// rejected and the first stays active.
    pub fn register_alert_sink(&self, config: AlertmanagerConfig) -> Result<()> {
        config.validate()?;

        if self.alert_queue.read().is_some() {
            return Err(LoggerError::config(
                "alertmanager",
                "alert sink already registered",
            ));
        }

        transport::wait_until_ready(&config.url, config.ready_attempts, config.ready_retry_delay)?;

        let mut slot = self.alert_queue.write();
        if slot.is_some() {
            return Err(LoggerError::config(
                "alertmanager",
                "alert sink already registered",
            ));
        }

        let metrics = Arc::new(SinkMetrics::new());
        let (queue, receiver) = EventQueue::bounded(
            "alertmanager",
            config.queue_capacity,
            config.overflow_policy.clone(),
            Arc::clone(&metrics),
        );
        let sink = AlertmanagerSink::new(&config)?;
        let handle = Flusher::spawn(sink, receiver, config.batch_wait, Arc::clone(&metrics));

        *slot = Some(queue);
        self.sinks.write().push(SinkRuntime {
            name: handle.name().to_string(),
            handle,
            metrics,
        });
        Ok(())
    }

    /// Build and enqueue one alert.
    ///
    /// Fails fast when no alert sink is registered or when the alert itself
    /// is invalid (empty name or summary, inverted time interval); nothing
    /// is enqueued in either case.
    #[allow(clippy::too_many_arguments)]
    pub fn raise_alert(
        &self,
        name: &str,
        summary: &str,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
        generator_url: Option<String>,
    ) -> Result<()> {
        let queue = self.alert_queue.read().as_ref().cloned();
        let Some(queue) = queue else {
            return Err(LoggerError::config(
                "alertmanager",
                "alert sink not initialized",
            ));
        };

        let alert = Alert::new(
            name,
            summary,
            starts_at,
            ends_at,
            labels,
            annotations,
            generator_url,
        )?;
        queue.enqueue(alert);
        Ok(())
    }

    /// Metrics snapshot for a registered batching sink ("loki", "alertmanager")
    pub fn sink_metrics(&self, name: &str) -> Option<SinkMetrics> {
        self.sinks
            .read()
            .iter()
            .find(|sink| sink.name == name)
            .map(|sink| sink.metrics.as_ref().clone())
    }

    /// Gracefully shut down every batching sink.
    ///
    /// Each flusher gets one best-effort final flush of everything enqueued
    /// before the signal; events submitted afterwards are rejected. Returns
    /// `true` if every flusher exited cleanly within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        *self.alert_queue.write() = None;

        let sinks = std::mem::take(&mut *self.sinks.write());
        let mut clean = true;
        for sink in sinks {
            clean &= sink.handle.shutdown(timeout);
        }
        clean
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
