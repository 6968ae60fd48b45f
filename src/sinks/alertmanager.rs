//! Alertmanager push sink
//!
//! Batches alerts and pushes them as a gzip JSON array to
//! `<url>/api/v2/alerts`. Base labels (including `instance` and `service`)
//! are merged into each alert just before encoding, base labels winning on
//! collision.

use crate::batch::flusher::BatchSink;
use crate::batch::queue::{OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::batch::transport::{
    HttpTransport, DEFAULT_READY_ATTEMPTS, DEFAULT_READY_RETRY_DELAY,
};
use crate::core::error::{LoggerError, Result};
use crate::core::event::{AttrMap, LogEvent};
use crate::core::level::LogLevel;
use crate::sinks::console::ConsoleSink;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BATCH_WAIT: Duration = Duration::from_secs(5);

const PUSH_PATH: &str = "/api/v2/alerts";

/// Configuration for the Alertmanager sink
#[derive(Debug, Clone)]
pub struct AlertmanagerConfig {
    /// Alertmanager URL, e.g. `http://localhost:9093`
    pub url: String,
    /// Value of the `instance` label added to every alert
    pub instance: String,
    /// Value of the `service` label added to every alert
    pub service: String,
    /// Further labels added to every alert
    pub base_labels: BTreeMap<String, String>,
    /// Maximum time to wait before sending a batch
    pub batch_wait: Duration,
    /// Capacity of the sink's alert queue
    pub queue_capacity: usize,
    /// Behavior when the alert queue is full
    pub overflow_policy: OverflowPolicy,
    /// Readiness probe attempt bound
    pub ready_attempts: u32,
    /// Fixed delay between readiness probe attempts
    pub ready_retry_delay: Duration,
}

impl AlertmanagerConfig {
    pub fn new(
        url: impl Into<String>,
        instance: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            instance: instance.into(),
            service: service.into(),
            base_labels: BTreeMap::new(),
            batch_wait: DEFAULT_BATCH_WAIT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            ready_attempts: DEFAULT_READY_ATTEMPTS,
            ready_retry_delay: DEFAULT_READY_RETRY_DELAY,
        }
    }

    #[must_use]
    pub fn with_base_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_batch_wait(mut self, batch_wait: Duration) -> Self {
        self.batch_wait = batch_wait;
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
            return Err(LoggerError::config("alertmanager", "url must be set"));
        }
        if self.instance.is_empty() {
            return Err(LoggerError::config("alertmanager", "instance must be set"));
        }
        if self.service.is_empty() {
            return Err(LoggerError::config("alertmanager", "service must be set"));
        }
        Ok(())
    }

    /// The labels stamped onto every alert at encode time
    pub(crate) fn injected_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.base_labels.clone();
        labels.insert("instance".to_string(), self.instance.clone());
        labels.insert("service".to_string(), self.service.clone());
        labels
    }
}

/// One alert in the Alertmanager v2 wire format
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
    #[serde(rename = "startsAt")]
    pub starts_at: DateTime<Utc>,
    #[serde(rename = "endsAt")]
    pub ends_at: DateTime<Utc>,
}

impl Alert {
    /// Validated constructor.
    ///
    /// `name` and `summary` are required and become the `alertname` label and
    /// the `summary` annotation, overwriting existing keys. Missing times
    /// default to each other, or to now when both are missing; `starts_at`
    /// after `ends_at` is rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        summary: &str,
        starts_at: Option<DateTime<Utc>>,
        ends_at: Option<DateTime<Utc>>,
        labels: BTreeMap<String, String>,
        annotations: BTreeMap<String, String>,
        generator_url: Option<String>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(LoggerError::config("alert", "name must be set"));
        }
        if summary.is_empty() {
            return Err(LoggerError::config("alert", "summary must be set"));
        }

        let (starts_at, ends_at) = match (starts_at, ends_at) {
            (None, None) => {
                let now = Utc::now();
                (now, now)
            }
            (Some(start), None) => (start, start),
            (None, Some(end)) => (end, end),
            (Some(start), Some(end)) => (start, end),
        };
        if starts_at > ends_at {
            return Err(LoggerError::config(
                "alert",
                "startsAt must not be after endsAt",
            ));
        }

        let mut labels = labels;
        labels.insert("alertname".to_string(), name.to_string());

        let mut annotations = annotations;
        annotations.insert("summary".to_string(), summary.to_string());

        Ok(Self {
            labels,
            annotations,
            generator_url,
            starts_at,
            ends_at,
        })
    }
}

impl fmt::Display for Alert {
    /// Concise representation: alert name and instance, plus the summary
    /// when present.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alertname = self.labels.get("alertname").map(String::as_str).unwrap_or("");
        let instance = self.labels.get("instance").map(String::as_str).unwrap_or("");
        write!(f, "Alertname: {}, Instance: {}", alertname, instance)?;
        if let Some(summary) = self.annotations.get("summary") {
            if !summary.is_empty() {
                write!(f, ", Summary: {}", summary)?;
            }
        }
        Ok(())
    }
}

/// The flusher-side half of the Alertmanager sink
pub struct AlertmanagerSink {
    base_labels: BTreeMap<String, String>,
    transport: HttpTransport,
    fallback: ConsoleSink,
}

impl AlertmanagerSink {
    pub fn new(config: &AlertmanagerConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.url, PUSH_PATH, StatusCode::OK)?;

        Ok(Self {
            base_labels: config.injected_labels(),
            transport,
            fallback: ConsoleSink::new(),
        })
    }

    /// Merge base labels into each alert, base labels winning collisions.
    fn merged(&self, batch: &[Alert]) -> Vec<Alert> {
        batch
            .iter()
            .map(|alert| {
                let mut alert = alert.clone();
                for (key, value) in &self.base_labels {
                    alert.labels.insert(key.clone(), value.clone());
                }
                alert
            })
            .collect()
    }

    fn fallback_events(batch: Vec<Alert>, error: &LoggerError, endpoint: &str) -> Vec<LogEvent> {
        let mut out = Vec::with_capacity(batch.len() + 1);
        out.push(
            LogEvent::new(LogLevel::Error, "failed to push alert batch").with_attributes(
                AttrMap::new()
                    .with("endpoint", endpoint)
                    .with("err", error.to_string())
                    .with("batch_size", batch.len() as i64),
            ),
        );

        if matches!(error, LoggerError::Encoding { .. }) {
            return out;
        }

        for alert in batch {
            out.push(
                LogEvent::new(LogLevel::Error, alert.to_string()).with_attributes(
                    AttrMap::new().with("original_timestamp", alert.starts_at.to_rfc3339()),
                ),
            );
        }
        out
    }
}

impl BatchSink for AlertmanagerSink {
    type Item = Alert;

    fn name(&self) -> &str {
        "alertmanager"
    }

    fn deliver(&mut self, batch: &[Alert]) -> Result<()> {
        let payload = serde_json::to_vec(&self.merged(batch))
            .map_err(|e| LoggerError::encoding("alert batch", e))?;
        self.transport.push(&payload)
    }

    fn redirect(&mut self, batch: Vec<Alert>, error: &LoggerError) {
        for event in Self::fallback_events(batch, error, self.transport.endpoint()) {
            self.fallback.write_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_alert() -> Alert {
        Alert::new(
            "HighLatency",
            "p99 above threshold",
            None,
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_alert_injects_name_and_summary() {
        let alert = minimal_alert();
        assert_eq!(alert.labels.get("alertname").unwrap(), "HighLatency");
        assert_eq!(
            alert.annotations.get("summary").unwrap(),
            "p99 above threshold"
        );
        assert_eq!(alert.starts_at, alert.ends_at);
    }

    #[test]
    fn test_alert_rejects_empty_name_and_summary() {
        let err = Alert::new(
            "",
            "summary",
            None,
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = Alert::new(
            "name",
            "",
            None,
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_alert_time_defaulting() {
        let t = Utc::now();

        let alert = Alert::new(
            "a",
            "s",
            Some(t),
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(alert.ends_at, t);

        let alert = Alert::new(
            "a",
            "s",
            None,
            Some(t),
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(alert.starts_at, t);
    }

    #[test]
    fn test_alert_rejects_inverted_interval() {
        let start = Utc::now();
        let end = start - chrono::Duration::seconds(10);

        let err = Alert::new(
            "a",
            "s",
            Some(start),
            Some(end),
            BTreeMap::new(),
            BTreeMap::new(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_alert_display() {
        let mut labels = BTreeMap::new();
        labels.insert("instance".to_string(), "api-1".to_string());
        let alert = Alert::new(
            "HighLatency",
            "p99 above threshold",
            None,
            None,
            labels,
            BTreeMap::new(),
            None,
        )
        .unwrap();

        assert_eq!(
            alert.to_string(),
            "Alertname: HighLatency, Instance: api-1, Summary: p99 above threshold"
        );
    }

    #[test]
    fn test_alert_wire_format() {
        let alert = minimal_alert();
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&alert).unwrap()).unwrap();

        assert!(json.get("labels").is_some());
        assert!(json.get("annotations").is_some());
        assert!(json.get("startsAt").is_some());
        assert!(json.get("endsAt").is_some());
        // RFC3339 rendering
        assert!(json["startsAt"].as_str().unwrap().contains('T'));
        // Omitted when unset
        assert!(json.get("generatorURL").is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(AlertmanagerConfig::new("http://localhost:9093", "api-1", "api")
            .validate()
            .is_ok());
        assert!(AlertmanagerConfig::new("", "api-1", "api").validate().is_err());
        assert!(AlertmanagerConfig::new("http://localhost:9093", "", "api")
            .validate()
            .is_err());
        assert!(AlertmanagerConfig::new("http://localhost:9093", "api-1", "")
            .validate()
            .is_err());
    }

    #[test]
    fn test_injected_labels_include_instance_and_service() {
        let config = AlertmanagerConfig::new("http://localhost:9093", "api-1", "api")
            .with_base_label("env", "prod");
        let labels = config.injected_labels();

        assert_eq!(labels.get("instance").unwrap(), "api-1");
        assert_eq!(labels.get("service").unwrap(), "api");
        assert_eq!(labels.get("env").unwrap(), "prod");
    }

    #[test]
    fn test_fallback_has_one_summary_and_one_line_per_alert() {
        let batch = vec![minimal_alert(), minimal_alert()];
        let starts = batch[0].starts_at.to_rfc3339();
        let error = LoggerError::delivery("http://localhost:9093/api/v2/alerts", "status 503");

        let events = AlertmanagerSink::fallback_events(
            batch,
            &error,
            "http://localhost:9093/api/v2/alerts",
        );

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].message, "failed to push alert batch");
        assert_eq!(
            events[1].attributes.get("original_timestamp"),
            Some(&crate::core::event::AttrValue::String(starts))
        );
    }
}
