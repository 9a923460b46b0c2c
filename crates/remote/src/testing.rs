//! Scripted sessions for tests
//!
//! [`MockSessionFactory`] stands in for SSH: each host gets a
//! [`MockHost`] script describing its responses, delays and failures, and
//! [`MockStats`] counts what the pool actually did.
//!
//! # Example
//!
//! ```
//! use remote::testing::{MockHost, MockSessionFactory, mock_node};
//! use remote::{CommandOutput, ConnectionPool};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let node = mock_node(1);
//! let factory = MockSessionFactory::new()
//!     .with_host(&node.host_name, MockHost::new().respond("uptime", CommandOutput::success("up 3 days\n")));
//! let pool = ConnectionPool::new(Arc::new(factory));
//!
//! assert_eq!(pool.execute(&node, "uptime", "doc").await.unwrap(), "up 3 days");
//! # }
//! ```

use crate::error::{RemoteError, Result};
use crate::hostkey;
use crate::node::Node;
use crate::session::{CommandOutput, RemoteSession, SessionFactory};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Fingerprint presented by mock hosts unless scripted otherwise
pub const MOCK_FINGERPRINT: &str = "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU";

/// Behaviour of one mock host
#[derive(Debug, Clone)]
pub struct MockHost {
    responses: HashMap<String, CommandOutput>,
    connect_delay: Duration,
    exec_delay: Duration,
    reconnect_delay: Duration,
    refuse: bool,
    reconnect_fails: bool,
    fingerprint: String,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            responses: HashMap::new(),
            connect_delay: Duration::ZERO,
            exec_delay: Duration::ZERO,
            reconnect_delay: Duration::ZERO,
            refuse: false,
            reconnect_fails: false,
            fingerprint: MOCK_FINGERPRINT.to_string(),
        }
    }
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, command: &str, output: CommandOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = delay;
        self
    }

    /// Refuse every connection attempt
    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Stall every reconnect, regardless of the timeout it is given
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn reconnect_fails(mut self) -> Self {
        self.reconnect_fails = true;
        self
    }

    pub fn fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = fingerprint.to_string();
        self
    }
}

/// Counters shared by a factory and its sessions
#[derive(Debug, Default)]
pub struct MockStats {
    pub connects: AtomicUsize,
    pub reconnects: AtomicUsize,
    pub execs: AtomicUsize,
    pub disconnects: AtomicUsize,
    commands: Mutex<Vec<(String, String)>>,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn execs(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Every `(host, command)` executed so far, in order
    pub fn commands(&self) -> Vec<(String, String)> {
        lock(&self.commands).clone()
    }
}

type Scripts = Arc<Mutex<HashMap<String, MockHost>>>;

#[derive(Default)]
pub struct MockSessionFactory {
    scripts: Scripts,
    stats: Arc<MockStats>,
    sessions: Mutex<Vec<Arc<MockSession>>>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, host_name: &str, host: MockHost) -> Self {
        lock(&self.scripts).insert(host_name.to_string(), host);
        self
    }

    /// Replace or add one scripted response at runtime
    pub fn respond(&self, host_name: &str, command: &str, output: CommandOutput) {
        lock(&self.scripts)
            .entry(host_name.to_string())
            .or_default()
            .responses
            .insert(command.to_string(), output);
    }

    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }

    /// Make every session to `host_name` fail its next liveness check
    pub fn mark_stale(&self, host_name: &str) {
        for session in lock(&self.sessions).iter().filter(|s| s.host == host_name) {
            session.connected.store(false, Ordering::SeqCst);
        }
    }
}

impl SessionFactory for MockSessionFactory {
    fn connect(&self, node: &Node, timeout: Duration) -> Result<Arc<dyn RemoteSession>> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.scripts).get(&node.host_name).cloned();
        let Some(script) = script else {
            return Err(RemoteError::unreachable(node.display_name(), "no route to host"));
        };

        std::thread::sleep(script.connect_delay.min(timeout));
        if script.refuse || script.connect_delay > timeout {
            return Err(RemoteError::unreachable(node.display_name(), "connection refused"));
        }
        hostkey::verify(node, script.fingerprint.clone())?;

        let session = Arc::new(MockSession {
            host: node.host_name.clone(),
            name: node.display_name().to_string(),
            connected: AtomicBool::new(true),
            scripts: Arc::clone(&self.scripts),
            stats: Arc::clone(&self.stats),
        });
        lock(&self.sessions).push(Arc::clone(&session));
        Ok(session)
    }
}

pub struct MockSession {
    host: String,
    name: String,
    connected: AtomicBool,
    scripts: Scripts,
    stats: Arc<MockStats>,
}

impl MockSession {
    fn script(&self) -> MockHost {
        lock(&self.scripts)
            .get(&self.host)
            .cloned()
            .unwrap_or_default()
    }
}

impl RemoteSession for MockSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn reconnect(&self, _timeout: Duration) -> Result<()> {
        self.stats.reconnects.fetch_add(1, Ordering::SeqCst);
        let script = self.script();
        std::thread::sleep(script.reconnect_delay);
        if script.reconnect_fails || script.refuse {
            return Err(RemoteError::unreachable(&self.name, "connection refused"));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        self.stats.execs.fetch_add(1, Ordering::SeqCst);
        lock(&self.stats.commands).push((self.host.clone(), command.to_string()));

        let script = self.script();
        if script.exec_delay >= timeout {
            std::thread::sleep(timeout);
            return Err(RemoteError::CommandTimeout {
                node: self.name.clone(),
                timeout,
            });
        }
        std::thread::sleep(script.exec_delay);

        Ok(script
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failure(127, "command not found")))
    }

    fn disconnect(&self) {
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Node descriptor for mock host `index` (`node<index>` at `10.0.0.<10 + index>`)
pub fn mock_node(index: u8) -> Node {
    Node::new(
        &format!("node{}", index),
        &format!("10.0.0.{}", 10 + u16::from(index)),
        "root",
    )
    .with_password("turing")
}

/// Node descriptor for the mock carrier controller
pub fn mock_carrier() -> Node {
    Node::new("bmc", "10.0.0.2", "root").with_password("turing")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
