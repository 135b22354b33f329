// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the repository expert.
//!
//! This module provides strongly-typed errors for different parts of the application,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failed agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationErrorKind {
    /// The agent exceeded its wall-clock bound and was killed.
    Timeout,
    /// The agent exited (or failed to start) without producing a final output.
    AgentFailure,
    /// The agent's event stream could not be parsed.
    ProtocolError,
}

impl std::fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::AgentFailure => write!(f, "AGENT_FAILURE"),
            Self::ProtocolError => write!(f, "PROTOCOL_ERROR"),
        }
    }
}

/// A structured invocation failure, carried inside an invocation result.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl InvocationError {
    /// The agent ran past its timeout.
    pub fn timeout(timeout_secs: u64) -> Self {
        Self {
            kind: InvocationErrorKind::Timeout,
            message: format!("Timed out after {timeout_secs}s"),
            exit_code: None,
        }
    }

    /// The agent failed, optionally with a known exit code.
    pub fn agent_failure(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            kind: InvocationErrorKind::AgentFailure,
            message: message.into(),
            exit_code,
        }
    }

    /// The event stream was malformed.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            kind: InvocationErrorKind::ProtocolError,
            message: message.into(),
            exit_code: None,
        }
    }

    /// Check if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == InvocationErrorKind::Timeout
    }
}

/// Errors raised while validating an inbound workflow request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("Repository path must not be empty")]
    EmptyRepositoryPath,

    #[error("Repository path does not exist: {0}")]
    RepositoryNotFound(String),

    #[error("Repository path is not a directory: {0}")]
    NotADirectory(String),

    #[error("Repository path could not be resolved: {0}")]
    Unresolvable(String),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),

    #[error("Config file already exists: {0}")]
    AlreadyExists(String),
}

impl ConfigError {
    /// Create an invalid value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefix a read or parse error with the file it came from.
    pub fn in_file(self, path: &std::path::Path) -> Self {
        let at = |message: String| format!("{}: {}", path.display(), message);
        match self {
            Self::NotFound(message) => Self::NotFound(at(message)),
            Self::IoError(message) => Self::IoError(at(message)),
            Self::YamlError(message) => Self::YamlError(at(message)),
            Self::JsonError(message) => Self::JsonError(at(message)),
            other => other,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors that can end a workflow run without an outcome.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Workflow cancelled")]
    Cancelled,
}

/// Errors from the HTTP transport.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_error_display() {
        let err = InvocationError::timeout(300);
        assert_eq!(err.to_string(), "TIMEOUT: Timed out after 300s");
        assert!(err.is_timeout());

        let err = InvocationError::agent_failure("boom", Some(2));
        assert_eq!(err.kind, InvocationErrorKind::AgentFailure);
        assert_eq!(err.exit_code, Some(2));
        assert!(err.to_string().starts_with("AGENT_FAILURE"));
    }

    #[test]
    fn test_invocation_error_kind_serializes_screaming() {
        let json = serde_json::to_string(&InvocationErrorKind::ProtocolError).unwrap();
        assert_eq!(json, "\"PROTOCOL_ERROR\"");
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::RepositoryNotFound("/nope".to_string());
        assert!(err.to_string().contains("/nope"));
    }
}
