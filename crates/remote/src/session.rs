//! Remote session capability
//!
//! Sessions are blocking; the pool drives them from tokio's blocking thread
//! pool so a slow host never stalls the async runtime.

use crate::error::Result;
use crate::node::Node;
use std::sync::Arc;
use std::time::Duration;

/// Captured result of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            ..Self::default()
        }
    }

    pub fn failure(exit_status: i32, stderr: &str) -> Self {
        Self {
            stderr: stderr.to_string(),
            exit_status,
            ..Self::default()
        }
    }
}

/// One authenticated shell session to a host
pub trait RemoteSession: Send + Sync {
    /// Cheap liveness check
    fn is_connected(&self) -> bool;

    /// Re-establish the session in place, bounded by `timeout`
    fn reconnect(&self, timeout: Duration) -> Result<()>;

    /// Run a single-line command, bounded by `timeout`
    fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput>;

    fn disconnect(&self);
}

/// Creates authenticated sessions for node descriptors
pub trait SessionFactory: Send + Sync {
    fn connect(&self, node: &Node, timeout: Duration) -> Result<Arc<dyn RemoteSession>>;
}
