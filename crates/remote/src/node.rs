//! Node descriptors
//!
//! A node is anything reachable over a remote shell: the compute boards and
//! the carrier's management controller share the same descriptor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder written over secrets in redacted copies
pub const REDACTED: &str = "********";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Name shown on the panel
    #[serde(default)]
    pub name: String,
    /// Host name or address used for the connection and as the pool key
    #[serde(default)]
    pub host_name: String,
    #[serde(default = "Node::default_port")]
    pub port: u16,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Private key path, `~` is expanded. Takes precedence over `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file_passphrase: Option<String>,
    /// SHA-256 host key fingerprint (base64, optionally prefixed with `SHA256:`).
    /// When unset any presented key is trusted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fingerprint: Option<String>,
    #[serde(
        default = "Node::default_connection_timeout",
        with = "common::duration"
    )]
    pub connection_timeout: Duration,
}

/// How a session authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials<'a> {
    KeyFile {
        path: PathBuf,
        passphrase: Option<&'a str>,
    },
    Password(&'a str),
    None,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            host_name: String::new(),
            port: Self::default_port(),
            user_name: String::new(),
            password: None,
            key_file: None,
            key_file_passphrase: None,
            expected_fingerprint: None,
            connection_timeout: Self::default_connection_timeout(),
        }
    }
}

impl Node {
    pub fn new(name: &str, host_name: &str, user_name: &str) -> Self {
        Self {
            name: name.to_string(),
            host_name: host_name.to_string(),
            user_name: user_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub fn with_key_file(mut self, path: &str, passphrase: Option<&str>) -> Self {
        self.key_file = Some(path.to_string());
        self.key_file_passphrase = passphrase.map(str::to_string);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.expected_fingerprint = Some(fingerprint.to_string());
        self
    }

    fn default_port() -> u16 {
        22
    }

    fn default_connection_timeout() -> Duration {
        Duration::from_secs(20)
    }

    /// Name for logs and the display, falling back to the host name
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.host_name
        } else {
            &self.name
        }
    }

    /// A node needs both a name and a host name before it is queried
    pub fn is_configured(&self) -> bool {
        !self.name.is_empty() && !self.host_name.is_empty()
    }

    pub fn credentials(&self) -> Credentials<'_> {
        match (&self.key_file, &self.password) {
            (Some(key), _) if !key.is_empty() => Credentials::KeyFile {
                path: PathBuf::from(shellexpand::tilde(key).as_ref()),
                passphrase: self
                    .key_file_passphrase
                    .as_deref()
                    .filter(|p| !p.is_empty()),
            },
            (_, Some(password)) => Credentials::Password(password),
            _ => Credentials::None,
        }
    }

    /// Copy with every secret replaced by [`REDACTED`]
    pub fn redacted(&self) -> Self {
        let hide = |value: &Option<String>| value.as_ref().map(|_| REDACTED.to_string());
        Self {
            password: hide(&self.password),
            key_file_passphrase: hide(&self.key_file_passphrase),
            ..self.clone()
        }
    }
}
