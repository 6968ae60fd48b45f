//! Error types for the logging facade

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Invalid sink or alert configuration, reported synchronously at setup
    #[error("invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Readiness probe exhausted without a successful response
    #[error("{endpoint} not reachable after {attempts} readiness attempts")]
    Connectivity { endpoint: String, attempts: u32 },

    /// Batch could not be serialized; it cannot be retried
    #[error("could not encode {what}: {source}")]
    Encoding {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Remote endpoint rejected the batch or the request itself failed
    #[error("delivery to {endpoint} failed: {message}")]
    Delivery { endpoint: String, message: String },

    /// IO error from a local sink
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoggerError {
    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a connectivity error for an exhausted readiness probe
    pub fn connectivity(endpoint: impl Into<String>, attempts: u32) -> Self {
        LoggerError::Connectivity {
            endpoint: endpoint.into(),
            attempts,
        }
    }

    /// Create an encoding error
    pub fn encoding(what: &'static str, source: serde_json::Error) -> Self {
        LoggerError::Encoding { what, source }
    }

    /// Create a delivery error
    pub fn delivery(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Delivery {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised at setup time (configuration or connectivity)
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            LoggerError::InvalidConfiguration { .. } | LoggerError::Connectivity { .. }
        )
    }
}
