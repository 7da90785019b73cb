//! Error types for the driver core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not establish credentials: {0}")]
    CredentialsUnavailable(String),

    #[error("error unmarshaling VCAP_SERVICES: {0}")]
    MalformedBindingPayload(#[source] serde_json::Error),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid port range {0:?}")]
    InvalidPortRange(String),

    #[error("{operation} failed: {message}")]
    PlatformOperationFailed {
        operation: &'static str,
        message: String,
    },

    #[error("platform adapter is not connected")]
    NotConnected,
}

impl Error {
    /// Shorthand for a failed remote call.
    pub fn platform(operation: &'static str, message: impl Into<String>) -> Self {
        Self::PlatformOperationFailed {
            operation,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
