//! Remote execution error types

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{node} is offline or unreachable: {reason}")]
    Unreachable { node: String, reason: String },

    #[error("{node} presented host key SHA256:{presented}, expected {expected}")]
    HostKeyMismatch {
        node: String,
        presented: String,
        expected: String,
    },

    #[error("{node}: key file {path} not found")]
    KeyFileNotFound { node: String, path: String },

    #[error("{node}: authentication failed for user '{user}': {reason}")]
    AuthFailed {
        node: String,
        user: String,
        reason: String,
    },

    #[error("{caller} {node} failed: [{status}] {stderr}")]
    CommandFailed {
        caller: String,
        node: String,
        status: i32,
        stderr: String,
    },

    #[error("{node}: command timed out after {timeout:?}")]
    CommandTimeout { node: String, timeout: Duration },

    #[error("SSH error: {0}")]
    Ssh(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task error: {0}")]
    Task(String),
}

impl RemoteError {
    /// Build a command failure, folding multi-line stderr onto one line
    pub fn command_failed(caller: &str, node: &str, status: i32, stderr: &str) -> Self {
        Self::CommandFailed {
            caller: caller.to_string(),
            node: node.to_string(),
            status,
            stderr: stderr.trim().replace('\n', "#"),
        }
    }

    pub fn unreachable(node: &str, reason: impl std::fmt::Display) -> Self {
        Self::Unreachable {
            node: node.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the host simply could not be reached (logged at info level)
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::KeyFileNotFound { .. } | Self::CommandTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_folds_stderr() {
        let err = RemoteError::command_failed("power_status", "bmc", 2, "line one\nline two\n");
        assert_eq!(err.to_string(), "power_status bmc failed: [2] line one#line two");
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(RemoteError::unreachable("node1", "refused").is_connectivity());
        assert!(!RemoteError::Ssh("boom".into()).is_connectivity());
        assert!(!RemoteError::command_failed("x", "y", 1, "").is_connectivity());
    }
}
