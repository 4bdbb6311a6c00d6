//! Canonical error taxonomy for netforge operations
//!
//! Every fallible operation in the workspace returns [`Result`]. Each
//! variant maps to a stable error code via [`Error::code`] that can be
//! used for programmatic handling, testing, and external API responses.

use std::path::Path;
use thiserror::Error;

/// Result type alias using the netforge [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error taxonomy for netforge operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // ===== Format codec =====
    /// The format codec rejected a line of input
    #[error("line {line}: {detail}")]
    Parse { line: usize, detail: String },

    // ===== Addressing / lookup =====
    /// Config, section, option, or snapshot does not exist
    #[error("{what} not found")]
    NotFound { what: String },

    // ===== Transaction lifecycle =====
    /// A transaction is already in progress
    #[error("transaction already in progress (state: {state})")]
    Busy { state: String },

    /// Commit was called with an empty staging overlay
    #[error("no staged changes to commit")]
    NoChanges,

    /// Confirm was called with no pending transaction
    #[error("no pending confirmation (state: {state})")]
    NoPending { state: String },

    /// The overall transaction deadline expired
    #[error("transaction timed out")]
    Timeout,

    /// The operation was cancelled by the operator or a parent context
    #[error("operation cancelled")]
    Cancelled,

    // ===== Snapshots =====
    /// Insufficient free space to create a snapshot
    #[error("insufficient disk space: {available} bytes available, {required} bytes required")]
    NoSpace { available: u64, required: u64 },

    /// A snapshot failed checksum or parse validation
    #[error("snapshot {snapshot} corrupted: {detail}")]
    Corrupt { snapshot: String, detail: String },

    // ===== Appliers =====
    /// Applier input was rejected before any system change
    #[error("invalid {field}: {value}")]
    Validation { field: String, value: String },

    /// An external command failed or post-apply validation did not hold
    #[error("{applier}: {detail}")]
    Apply { applier: String, detail: String },

    /// One or more re-applies failed while restoring a snapshot
    #[error("rollback partially failed: {}", .details.join("; "))]
    Rollback { details: Vec<String> },

    // ===== Integration =====
    /// Filesystem failure
    #[error("io error on {path}: {detail}")]
    Io { path: String, detail: String },

    /// JSON encoding/decoding failure
    #[error("serialization error: {detail}")]
    Serialization { detail: String },
}

impl Error {
    /// Get the stable error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "ERR_PARSE",
            Error::NotFound { .. } => "ERR_NOT_FOUND",
            Error::Busy { .. } => "ERR_BUSY",
            Error::NoChanges => "ERR_NO_CHANGES",
            Error::NoPending { .. } => "ERR_NO_PENDING",
            Error::Timeout => "ERR_TIMEOUT",
            Error::Cancelled => "ERR_CANCELLED",
            Error::NoSpace { .. } => "ERR_NO_SPACE",
            Error::Corrupt { .. } => "ERR_CORRUPT",
            Error::Validation { .. } => "ERR_VALIDATION",
            Error::Apply { .. } => "ERR_APPLY",
            Error::Rollback { .. } => "ERR_ROLLBACK",
            Error::Io { .. } => "ERR_IO",
            Error::Serialization { .. } => "ERR_SERIALIZATION",
        }
    }
}

/// Create a parse error with line context
pub fn parse_error(line: usize, detail: impl Into<String>) -> Error {
    Error::Parse {
        line,
        detail: detail.into(),
    }
}

/// Create a not-found error
pub fn not_found(what: impl Into<String>) -> Error {
    Error::NotFound { what: what.into() }
}

/// Create a validation error for a rejected field value
pub fn validation(field: impl Into<String>, value: impl Into<String>) -> Error {
    Error::Validation {
        field: field.into(),
        value: value.into(),
    }
}

/// Create an applier error
pub fn apply_error(applier: impl Into<String>, detail: impl Into<String>) -> Error {
    Error::Apply {
        applier: applier.into(),
        detail: detail.into(),
    }
}

/// Create an IO error from a path and the underlying failure
pub fn io_error(path: &Path, err: std::io::Error) -> Error {
    Error::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    }
}

/// Create a corrupt-snapshot error
pub fn corrupt(snapshot: impl Into<String>, detail: impl Into<String>) -> Error {
    Error::Corrupt {
        snapshot: snapshot.into(),
        detail: detail.into(),
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let cases = [
            (parse_error(3, "bad line"), "ERR_PARSE"),
            (not_found("section lan"), "ERR_NOT_FOUND"),
            (Error::NoChanges, "ERR_NO_CHANGES"),
            (Error::Timeout, "ERR_TIMEOUT"),
            (validation("dest_port", "70000"), "ERR_VALIDATION"),
            (apply_error("firewall", "nft failed"), "ERR_APPLY"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.code(), expected, "wrong code for {:?}", err);
        }
    }

    #[test]
    fn test_parse_error_carries_line_number() {
        let err = parse_error(42, "unknown syntax");
        assert_eq!(err.to_string(), "line 42: unknown syntax");
    }

    #[test]
    fn test_rollback_error_joins_details() {
        let err = Error::Rollback {
            details: vec!["network: apply failed".into(), "dhcp: load failed".into()],
        };
        assert!(err.to_string().contains("network: apply failed; dhcp: load failed"));
    }
}
