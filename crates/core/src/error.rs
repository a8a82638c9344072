//! Error types for stow
//!
//! Backend I/O faults never surface through this type from a `Store`:
//! they are swallowed at the store boundary and reported as `false`,
//! `None` or an empty listing. What remains here are contract
//! violations (schema mismatches, bad patterns, bad configuration) and
//! the errors of the layers built on top of a store.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for stow operations
pub type StowResult<T> = std::result::Result<T, StowError>;

/// Error types for the storage layer
#[derive(Debug, Error)]
pub enum StowError {
    /// I/O error outside a best-effort store operation (config files, schema files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data read or written under a bound schema does not conform to it
    #[error("Invalid schema: '{path}' does not conform to {schema}: {reason}")]
    InvalidSchema {
        /// Schema file the data was checked against
        schema: String,
        /// `bucket<sep>key` access path that selected the schema
        path: String,
        /// Validator message
        reason: String,
    },

    /// A schema binding pattern failed to compile
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern source text
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// Unknown time-bucket precision name
    #[error("Invalid precision '{0}': expected one of YEAR, MONTH, DAY, HOUR, MIN, SEC, MS")]
    InvalidPrecision(String),

    /// The backing store refused a write that a higher layer depends on
    #[error("Write failed: {bucket}/{key}")]
    WriteFailed {
        /// Target bucket
        bucket: String,
        /// Target key
        key: String,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A queue consumer callback failed
    #[error("Consumer error: {0}")]
    Consumer(String),
}

impl StowError {
    /// Build an [`StowError::InvalidSchema`]
    pub fn invalid_schema(
        schema: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        StowError::InvalidSchema {
            schema: schema.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`StowError::WriteFailed`]
    pub fn write_failed(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        StowError::WriteFailed {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Build an [`StowError::Config`]
    pub fn config(msg: impl Into<String>) -> Self {
        StowError::Config(msg.into())
    }

    /// Build an [`StowError::Consumer`]
    pub fn consumer(msg: impl Into<String>) -> Self {
        StowError::Consumer(msg.into())
    }

    /// True for structural contract violations of stored data
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, StowError::InvalidSchema { .. })
    }
}

impl From<serde_json::Error> for StowError {
    fn from(e: serde_json::Error) -> Self {
        StowError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = StowError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_display_invalid_schema() {
        let err = StowError::invalid_schema("Person.json", "a/b", "\"42\" is not of type object");
        let msg = err.to_string();
        assert!(msg.contains("Person.json"));
        assert!(msg.contains("a/b"));
        assert!(err.is_schema_violation());
    }

    #[test]
    fn test_error_display_write_failed() {
        let err = StowError::write_failed("topic", "2024/01/01/00/00/00/1_x");
        assert!(err.to_string().contains("topic/2024/01/01"));
        assert!(!err.is_schema_violation());
    }

    #[test]
    fn test_error_from_serde_json() {
        let parsed: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: StowError = parsed.unwrap_err().into();
        assert!(matches!(err, StowError::Serialization(_)));
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = StowError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
        };
        match err {
            StowError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "("),
            _ => panic!("Wrong error variant"),
        }
    }
}
