//! Loki push sink
//!
//! Batches log events and pushes them as gzip JSON to
//! `<url>/loki/api/v1/push`. Entries are grouped into one stream per level;
//! each stream carries the configured base labels plus the level label.

use crate::batch::flusher::BatchSink;
use crate::batch::queue::{OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::batch::transport::{
    HttpTransport, DEFAULT_READY_ATTEMPTS, DEFAULT_READY_RETRY_DELAY,
};
use crate::core::error::{LoggerError, Result};
use crate::core::event::{AttrMap, LogEvent};
use crate::core::level::LogLevel;
use crate::sinks::console::ConsoleSink;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_BATCH_WAIT: Duration = Duration::from_secs(5);

const PUSH_PATH: &str = "/loki/api/v1/push";

/// Configuration for a Loki push sink
#[derive(Debug, Clone)]
pub struct LokiConfig {
    /// Loki server URL, e.g. `http://localhost:3100`
    pub url: String,
    /// Maximum time to wait before sending a batch
    pub batch_wait: Duration,
    /// Base labels added to every stream
    pub labels: BTreeMap<String, String>,
    /// Optional tenant ID for multi-tenancy (`X-Scope-OrgID`)
    pub tenant: Option<String>,
    /// Levels this sink subscribes to
    pub levels: Vec<LogLevel>,
    /// Capacity of the sink's event queue
    pub queue_capacity: usize,
    /// Behavior when the event queue is full
    pub overflow_policy: OverflowPolicy,
    /// Readiness probe attempt bound
    pub ready_attempts: u32,
    /// Fixed delay between readiness probe attempts
    pub ready_retry_delay: Duration,
}

impl LokiConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            batch_wait: DEFAULT_BATCH_WAIT,
            labels: BTreeMap::new(),
            tenant: None,
            levels: LogLevel::Info.and_above().to_vec(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            ready_attempts: DEFAULT_READY_ATTEMPTS,
            ready_retry_delay: DEFAULT_READY_RETRY_DELAY,
        }
    }

    #[must_use]
    pub fn with_batch_wait(mut self, batch_wait: Duration) -> Self {
        self.batch_wait = batch_wait;
        self
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    #[must_use]
    pub fn with_levels(mut self, levels: &[LogLevel]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    #[must_use]
    pub fn with_readiness_probe(mut self, attempts: u32, retry_delay: Duration) -> Self {
        self.ready_attempts = attempts;
        self.ready_retry_delay = retry_delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(LoggerError::config("loki", "url must be set"));
        }
        if self.levels.is_empty() {
            return Err(LoggerError::config("loki", "levels must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PushStream {
    stream: BTreeMap<String, String>,
    values: Vec<[String; 2]>,
}

#[derive(Debug, Serialize)]
struct PushPayload {
    streams: Vec<PushStream>,
}

#[derive(Debug, Serialize)]
struct LogLine<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "AttrMap::is_empty")]
    attributes: &'a AttrMap,
}

/// Encode a batch into the push wire format.
///
/// Streams appear in first-seen level order; values keep arrival order.
fn encode_push_payload(
    base_labels: &BTreeMap<String, String>,
    batch: &[LogEvent],
) -> Result<Vec<u8>> {
    let mut groups: Vec<(LogLevel, Vec<[String; 2]>)> = Vec::new();

    for event in batch {
        let line = serde_json::to_string(&LogLine {
            message: &event.message,
            attributes: &event.attributes,
        })
        .map_err(|e| LoggerError::encoding("log line", e))?;

        let timestamp = event
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX)
            .to_string();

        match groups.iter_mut().find(|(level, _)| *level == event.level) {
            Some((_, values)) => values.push([timestamp, line]),
            None => groups.push((event.level, vec![[timestamp, line]])),
        }
    }

    let streams = groups
        .into_iter()
        .map(|(level, values)| {
            let mut stream = base_labels.clone();
            stream.insert("level".to_string(), level.aggregator_label().to_string());
            PushStream { stream, values }
        })
        .collect();

    serde_json::to_vec(&PushPayload { streams })
        .map_err(|e| LoggerError::encoding("push payload", e))
}

/// The flusher-side half of the Loki sink
pub struct LokiSink {
    labels: BTreeMap<String, String>,
    transport: HttpTransport,
    fallback: ConsoleSink,
}

impl LokiSink {
    pub fn new(config: &LokiConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.url, PUSH_PATH, StatusCode::NO_CONTENT)?
            .with_tenant(config.tenant.clone());

        Ok(Self {
            labels: config.labels.clone(),
            transport,
            fallback: ConsoleSink::new(),
        })
    }

    /// Events to re-emit through the local console path after a failure.
    ///
    /// One failure summary, then each event again, restamped, with its
    /// original timestamp as an attribute. An unencodable batch gets only
    /// the summary.
    fn fallback_events(
        batch: Vec<LogEvent>,
        error: &LoggerError,
        endpoint: &str,
    ) -> Vec<LogEvent> {
        let mut out = Vec::with_capacity(batch.len() + 1);
        out.push(
            LogEvent::new(LogLevel::Error, "failed to push log batch")
                .with_attributes(
                    AttrMap::new()
                        .with("endpoint", endpoint)
                        .with("err", error.to_string())
                        .with("batch_size", batch.len() as i64),
                ),
        );

        if matches!(error, LoggerError::Encoding { .. }) {
            return out;
        }

        for mut event in batch {
            let original = event.timestamp.to_rfc3339();
            event.timestamp = Utc::now();
            event.attributes.insert("original_timestamp", original);
            out.push(event);
        }
        out
    }
}

impl BatchSink for LokiSink {
    type Item = LogEvent;

    fn name(&self) -> &str {
        "loki"
    }

    fn deliver(&mut self, batch: &[LogEvent]) -> Result<()> {
        let payload = encode_push_payload(&self.labels, batch)?;
        self.transport.push(&payload)
    }

    fn redirect(&mut self, batch: Vec<LogEvent>, error: &LoggerError) {
        for event in Self::fallback_events(batch, error, self.transport.endpoint()) {
            self.fallback.write_event(&event);
        }
    }
}
