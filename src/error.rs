//! Error types for the rendering service and the agenda job

use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering, storing or delivering images
#[derive(Error, Debug)]
pub enum Error {
    /// A required request field was missing or empty
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A time-of-day value was not a valid `HH:MM` string
    #[error("Invalid time value: {0:?}")]
    InvalidTime(String),

    /// Failed to launch or attach to the renderer
    #[error("Renderer initialization failed: {0}")]
    InitializationError(String),

    /// Failed to rasterize content
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Object storage rejected or failed the upload
    #[error("Upload failed: {0}")]
    UploadError(String),

    /// The appointment source query failed
    #[error("Data source error: {0}")]
    SourceError(String),

    /// Webhook delivery failed
    #[error("Webhook delivery failed: {0}")]
    WebhookError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than a collaborator
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::InvalidTime(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::NetworkError(format!("request timed out: {}", err))
        } else {
            Error::NetworkError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_includes_duration() {
        assert_eq!(Error::Timeout(30000).to_string(), "Operation timed out after 30000ms");
    }

    #[test]
    fn client_errors_are_distinguished() {
        assert!(Error::Validation("filename".into()).is_client_error());
        assert!(Error::InvalidTime("9h".into()).is_client_error());
        assert!(!Error::UploadError("503".into()).is_client_error());
        assert!(!Error::RenderError("crashed".into()).is_client_error());
    }

    #[cfg(feature = "cdp")]
    #[test]
    fn protocol_errors_convert() {
        let err: Error = anyhow::anyhow!("Target closed").into();
        assert!(matches!(err, Error::CdpError(ref msg) if msg == "Target closed"));
    }
}
