//! Blocking HTTP transport for batched payloads
//!
//! One POST per flush, gzip-compressed JSON body. Failures are reported
//! upward immediately; recovery belongs to the sink's fallback path.

use crate::core::error::{LoggerError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::io::Write;
use std::thread;
use std::time::Duration;

/// Request timeout for push and readiness requests.
///
/// A hung endpoint would otherwise wedge the sink's flush loop forever.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on readiness probe attempts
pub const DEFAULT_READY_ATTEMPTS: u32 = 5;

/// Default fixed delay between readiness probe attempts
pub const DEFAULT_READY_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct HttpTransport {
    client: Client,
    endpoint: String,
    expected_status: StatusCode,
    tenant: Option<String>,
}

impl HttpTransport {
    /// Create a transport pushing to `<host>/<path>`, treating
    /// `expected_status` as the only success response.
    pub fn new(host: &str, path: &str, expected_status: StatusCode) -> Result<Self> {
        let client = build_client(host)?;
        Ok(Self {
            client,
            endpoint: join_url(&[host, path]),
            expected_status,
            tenant: None,
        })
    }

    /// Set the tenant sent as `X-Scope-OrgID` on every push
    #[must_use]
    pub fn with_tenant(mut self, tenant: Option<String>) -> Self {
        self.tenant = tenant;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one encoded batch, gzip-compressed.
    pub fn push(&self, payload: &[u8]) -> Result<()> {
        let compressed = compress(payload)?;

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Content-Encoding", "gzip")
            .body(compressed);
        if let Some(tenant) = &self.tenant {
            request = request.header("X-Scope-OrgID", tenant);
        }

        let response = request
            .send()
            .map_err(|e| LoggerError::delivery(&self.endpoint, e.to_string()))?;

        let status = response.status();
        if status != self.expected_status {
            let body = response.text().unwrap_or_default();
            return Err(LoggerError::delivery(
                &self.endpoint,
                format!("unexpected status {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

/// One-time startup check that the endpoint answers 200 on `/ready`.
///
/// Retries up to `attempts` times with a fixed `delay` between attempts;
/// exhaustion yields a [`LoggerError::Connectivity`] and the sink must not
/// be registered.
pub fn wait_until_ready(host: &str, attempts: u32, delay: Duration) -> Result<()> {
    let client = build_client(host)?;
    let url = join_url(&[host, "/ready"]);

    for attempt in 0..attempts {
        match client.get(&url).send() {
            Ok(response) if response.status() == StatusCode::OK => return Ok(()),
            _ => {}
        }
        if attempt + 1 < attempts {
            thread::sleep(delay);
        }
    }

    Err(LoggerError::connectivity(host, attempts))
}

fn build_client(host: &str) -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LoggerError::delivery(host, e.to_string()))
}

/// Gzip-compress an encoded payload
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Join URL elements, tolerating stray slashes on either side
pub fn join_url(elements: &[&str]) -> String {
    elements
        .iter()
        .enumerate()
        .map(|(idx, element)| {
            let mut element = *element;
            if idx > 0 {
                element = element.trim_start_matches('/');
            }
            if idx < elements.len() - 1 {
                element = element.trim_end_matches('/');
            }
            element
        })
        .collect::<Vec<_>>()
        .join("/")
}
