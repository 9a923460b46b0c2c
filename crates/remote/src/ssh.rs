//! SSH sessions backed by libssh2
//!
//! Connection, host key verification and authentication follow the usual
//! libssh2 sequence: TCP connect with a timeout, handshake, fingerprint
//! check, then key file or password authentication.

use crate::error::{RemoteError, Result};
use crate::hostkey;
use crate::node::{Credentials, Node};
use crate::session::{CommandOutput, RemoteSession, SessionFactory};
use ssh2::{ErrorCode, HashType, Session};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// libssh2's LIBSSH2_ERROR_TIMEOUT
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Seconds between keepalive messages on idle sessions
const KEEPALIVE_INTERVAL_SECS: u32 = 15;

/// Factory producing [`SshSession`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SshSessionFactory;

impl SessionFactory for SshSessionFactory {
    fn connect(&self, node: &Node, timeout: Duration) -> Result<Arc<dyn RemoteSession>> {
        let session = open_session(node, timeout)?;
        Ok(Arc::new(SshSession {
            node: node.clone(),
            session: Mutex::new(Some(session)),
        }))
    }
}

/// A pooled SSH session to one host
pub struct SshSession {
    node: Node,
    session: Mutex<Option<Session>>,
}

impl SshSession {
    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn map_ssh(&self, timeout: Duration, err: ssh2::Error) -> RemoteError {
        if matches!(err.code(), ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)) {
            RemoteError::CommandTimeout {
                node: self.node.display_name().to_string(),
                timeout,
            }
        } else {
            RemoteError::Ssh(format!("{}: {}", self.node.display_name(), err))
        }
    }

    fn map_io(&self, timeout: Duration, err: io::Error) -> RemoteError {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => RemoteError::CommandTimeout {
                node: self.node.display_name().to_string(),
                timeout,
            },
            _ => RemoteError::Io(err),
        }
    }
}

impl RemoteSession for SshSession {
    fn is_connected(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|s| s.authenticated() && s.keepalive_send().is_ok())
    }

    fn reconnect(&self, timeout: Duration) -> Result<()> {
        let fresh = open_session(&self.node, timeout)?;
        if let Some(stale) = self.lock().replace(fresh) {
            let _ = stale.disconnect(None, "reconnecting", None);
        }
        debug!("Reconnected to {}", self.node.display_name());
        Ok(())
    }

    fn exec(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        let guard = self.lock();
        let session = guard.as_ref().ok_or_else(|| {
            RemoteError::unreachable(self.node.display_name(), "session is closed")
        })?;
        session.set_timeout(millis(timeout));

        trace!("{}: exec '{}'", self.node.display_name(), command);
        let mut channel = session
            .channel_session()
            .map_err(|e| self.map_ssh(timeout, e))?;
        channel.exec(command).map_err(|e| self.map_ssh(timeout, e))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| self.map_io(timeout, e))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| self.map_io(timeout, e))?;

        channel.wait_close().map_err(|e| self.map_ssh(timeout, e))?;
        let exit_status = channel.exit_status().map_err(|e| self.map_ssh(timeout, e))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }

    fn disconnect(&self) {
        if let Some(session) = self.lock().take() {
            if let Err(e) = session.disconnect(None, "shutdown", None) {
                debug!("Disconnect from {} failed: {}", self.node.display_name(), e);
            }
        }
    }
}

fn millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

fn open_session(node: &Node, timeout: Duration) -> Result<Session> {
    let name = node.display_name();
    let addr = (node.host_name.as_str(), node.port)
        .to_socket_addrs()
        .map_err(|e| RemoteError::unreachable(name, e))?
        .next()
        .ok_or_else(|| RemoteError::unreachable(name, "host name did not resolve"))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| RemoteError::unreachable(name, e))?;

    let mut session = Session::new().map_err(|e| RemoteError::Ssh(e.to_string()))?;
    session.set_timeout(millis(timeout));
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| RemoteError::unreachable(name, e))?;

    verify_host_key(node, &session)?;
    authenticate(node, &session)?;

    session.set_keepalive(false, KEEPALIVE_INTERVAL_SECS);
    debug!("Connected to {} ({}:{})", name, node.host_name, node.port);
    Ok(session)
}

fn verify_host_key(node: &Node, session: &Session) -> Result<()> {
    let hash = session
        .host_key_hash(HashType::Sha256)
        .ok_or_else(|| RemoteError::Ssh(format!("{}: no host key", node.display_name())))?;
    hostkey::verify(node, hostkey::fingerprint_sha256(hash))
}

fn authenticate(node: &Node, session: &Session) -> Result<()> {
    let auth_failed = |reason: String| RemoteError::AuthFailed {
        node: node.display_name().to_string(),
        user: node.user_name.clone(),
        reason,
    };

    match node.credentials() {
        Credentials::KeyFile { path, passphrase } => {
            if !path.exists() {
                return Err(RemoteError::KeyFileNotFound {
                    node: node.display_name().to_string(),
                    path: path.display().to_string(),
                });
            }
            session
                .userauth_pubkey_file(&node.user_name, None, &path, passphrase)
                .map_err(|e| auth_failed(e.to_string()))?;
        }
        Credentials::Password(password) => {
            session
                .userauth_password(&node.user_name, password)
                .map_err(|e| auth_failed(e.to_string()))?;
        }
        Credentials::None => return Err(auth_failed("no credentials configured".into())),
    }

    if session.authenticated() {
        Ok(())
    } else {
        Err(auth_failed("server rejected credentials".into()))
    }
}
