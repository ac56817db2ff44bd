use serde::Serialize;
use thiserror::Error;

/// Classified failure of a device operation.
///
/// This is the only error vocabulary that reaches the panel: the device client
/// produces it, everything above passes it on unchanged.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum ClientError {
    /// Transport failure, timeout or non-2xx response.
    #[error("{0}")]
    Network(String),
    /// The device answered successfully but the body is unusable.
    #[error("{0}")]
    Parse(String),
    /// No device address is configured.
    #[error("{0}")]
    Config(String),
}

impl ClientError {
    pub const NOT_CONFIGURED: &str = "device base URL not configured";
    pub const TIMEOUT: &str = "request timeout - device not responding";

    pub fn not_configured() -> Self {
        ClientError::Config(Self::NOT_CONFIGURED.to_string())
    }

    pub fn timeout() -> Self {
        ClientError::Network(Self::TIMEOUT.to_string())
    }

    /// Classifies a transport error from the HTTP stack.
    ///
    /// Only the timeout condition selects the timeout message; every other
    /// failure carries the transport's own text or `fallback` when it has none.
    pub fn from_transport(error: &reqwest::Error, fallback: &str) -> Self {
        if error.is_timeout() {
            return Self::timeout();
        }

        let message = error.to_string();
        if message.trim().is_empty() {
            ClientError::Network(fallback.to_string())
        } else {
            ClientError::Network(message)
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ClientError::Network(message)
            | ClientError::Parse(message)
            | ClientError::Config(message) => message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "network",
            ClientError::Parse(_) => "parse",
            ClientError::Config(_) => "config",
        }
    }
}
