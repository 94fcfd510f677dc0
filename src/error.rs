//! Error types for the hostreport crate.

use thiserror::Error;

/// Result type alias for hostreport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a reporting run.
///
/// Probe and delivery failures are not errors. A missing probe leaves its
/// category out of the report and a failed POST is returned as a
/// [`DeliveryResult`](crate::sender::DeliveryResult).
#[derive(Error, Debug)]
pub enum Error {
    /// No consent answer was given and no way to ask for one.
    #[error("No consent answer given: pass yes or no, or run interactively")]
    AmbiguousConsent,

    /// Failed to persist the outcome record.
    #[error("Failed to write report to {path}: {reason}")]
    StoreWrite { path: String, reason: String },

    /// Failed to read file or directory.
    #[error("Failed to read {path}: {reason}")]
    IoError { path: String, reason: String },

    /// Failed to serialize or deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The probe worker died before returning its facts.
    #[error("Fact collection stopped: {0}")]
    ProbeTask(String),

    /// The HTTP client could not be constructed.
    #[error("Failed to set up HTTP client: {0}")]
    HttpClient(String),

    /// User cancelled operation.
    #[error("Operation cancelled by user")]
    UserCancelled,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError {
            path: String::new(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
