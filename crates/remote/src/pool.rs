//! Connection pool and command executor
//!
//! One session per host name, created lazily and reused. A pooled session
//! that fails its liveness check gets exactly one reconnect attempt per
//! call; a host that stays down keeps its entry so it can recover later.
//! Entries are only removed by [`ConnectionPool::shutdown`].

use crate::error::{RemoteError, Result};
use crate::node::Node;
use crate::session::{RemoteSession, SessionFactory};
use crate::ssh::SshSessionFactory;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Upper bound for a single remote command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ConnectionPool {
    factory: Arc<dyn SessionFactory>,
    sessions: RwLock<HashMap<String, Arc<dyn RemoteSession>>>,
    command_timeout: Duration,
}

impl ConnectionPool {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Pool backed by real SSH sessions
    pub fn ssh() -> Self {
        Self::new(Arc::new(SshSessionFactory))
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Establish sessions to every node in parallel
    ///
    /// Best effort: failures are logged and never affect other nodes.
    pub async fn connect(self: &Arc<Self>, nodes: &[Node]) {
        let mut tasks = JoinSet::new();
        for node in nodes.iter().filter(|n| !n.host_name.is_empty()).cloned() {
            let pool = Arc::clone(self);
            tasks.spawn(async move {
                let result = pool.session(&node).await;
                (node, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((node, Ok(_))) => debug!("Session to {} ready", node.display_name()),
                Ok((node, Err(e))) => log_connect_failure(&node, &e),
                Err(e) => error!("Connect task failed: {}", e),
            }
        }
    }

    /// Run `command` on `node` and return its trimmed stdout
    ///
    /// A command that outlives the command timeout yields an empty string.
    /// A non-zero exit status yields [`RemoteError::CommandFailed`] carrying
    /// `caller` for context.
    pub async fn execute(&self, node: &Node, command: &str, caller: &str) -> Result<String> {
        let session = match self.session(node).await {
            Ok(session) => session,
            Err(e) => {
                log_connect_failure(node, &e);
                return Err(e);
            }
        };

        let timeout = self.command_timeout;
        let owned = command.to_string();
        let run = tokio::task::spawn_blocking(move || session.exec(&owned, timeout));

        let output = match tokio::time::timeout(timeout, run).await {
            Err(_) | Ok(Ok(Err(RemoteError::CommandTimeout { .. }))) => {
                warn!(
                    "{} {}: '{}' timed out after {:?}",
                    caller,
                    node.display_name(),
                    command,
                    timeout
                );
                return Ok(String::new());
            }
            Ok(Err(join)) => return Err(RemoteError::Task(join.to_string())),
            Ok(Ok(Err(e))) => {
                log_connect_failure(node, &e);
                return Err(e);
            }
            Ok(Ok(Ok(output))) => output,
        };

        if output.exit_status != 0 {
            let err = RemoteError::command_failed(
                caller,
                node.display_name(),
                output.exit_status,
                &output.stderr,
            );
            warn!("{}", err);
            return Err(err);
        }

        Ok(output.stdout.trim().to_string())
    }

    /// Number of pooled hosts
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Disconnect and drop every pooled session
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        if drained.is_empty() {
            return;
        }
        info!("Closing {} remote session(s)", drained.len());

        let mut tasks = JoinSet::new();
        for (_, session) in drained {
            tasks.spawn_blocking(move || session.disconnect());
        }
        while tasks.join_next().await.is_some() {}
    }

    /// Live session for `node`, creating or reviving it as needed
    async fn session(&self, node: &Node) -> Result<Arc<dyn RemoteSession>> {
        let pooled = self.sessions.read().await.get(&node.host_name).cloned();

        if let Some(session) = pooled {
            let timeout = node.connection_timeout;
            let name = node.display_name().to_string();
            let revive = run_blocking(move || {
                if !session.is_connected() {
                    info!("Session to {} is stale, reconnecting", name);
                    session.reconnect(timeout)?;
                }
                Ok(session)
            });
            return tokio::time::timeout(timeout, revive)
                .await
                .map_err(|_| RemoteError::unreachable(node.display_name(), "reconnect timed out"))?;
        }

        let factory = Arc::clone(&self.factory);
        let owned = node.clone();
        let connect = run_blocking(move || factory.connect(&owned, owned.connection_timeout));
        let created = tokio::time::timeout(node.connection_timeout, connect)
            .await
            .map_err(|_| RemoteError::unreachable(node.display_name(), "connection timed out"))??;

        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .entry(node.host_name.clone())
            .or_insert_with(|| Arc::clone(&created));
        if !Arc::ptr_eq(entry, &created) {
            debug!("Discarding duplicate session to {}", node.display_name());
            tokio::task::spawn_blocking(move || created.disconnect());
        }
        Ok(Arc::clone(entry))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RemoteError::Task(e.to_string()))?
}

fn log_connect_failure(node: &Node, err: &RemoteError) {
    if err.is_connectivity() {
        info!("{}", err);
    } else {
        error!("Connection to {} failed: {}", node.display_name(), err);
    }
}
