//! Error types for easyfilter.

use thiserror::Error;

/// Error type for easyfilter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A filter-list pattern could not be translated into a usable matcher
    #[error("invalid filter pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A subscription endpoint could not be fetched
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A subscription endpoint answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Persisted snapshot content does not match its recorded checksum
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for easyfilter operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidPattern {
            pattern: "ads$$".to_string(),
            reason: "regex failed".to_string(),
        };
        assert!(err.to_string().contains("ads$$"));

        assert_eq!(Error::Status(503).to_string(), "HTTP status 503");
        assert_eq!(Error::ChecksumMismatch.to_string(), "checksum mismatch");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
