//! Host identity verification (trust on first use)

use crate::error::{RemoteError, Result};
use crate::node::Node;
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

/// Render a raw SHA-256 host key hash the way `ssh-keygen -l` prints it,
/// without the `SHA256:` prefix
pub fn fingerprint_sha256(hash: &[u8]) -> String {
    STANDARD_NO_PAD.encode(hash)
}

/// Decide whether a presented fingerprint is acceptable
///
/// With no expected fingerprint every host is trusted. Otherwise the
/// presented value must match exactly.
pub fn is_trusted(expected: Option<&str>, presented: &str) -> bool {
    match expected.map(str::trim).filter(|e| !e.is_empty()) {
        None => true,
        Some(expected) => expected.strip_prefix("SHA256:").unwrap_or(expected) == presented,
    }
}

/// Check the fingerprint `node` presented against the one it is pinned to
pub fn verify(node: &Node, presented: String) -> Result<()> {
    if is_trusted(node.expected_fingerprint.as_deref(), &presented) {
        Ok(())
    } else {
        Err(RemoteError::HostKeyMismatch {
            node: node.display_name().to_string(),
            presented,
            expected: node.expected_fingerprint.clone().unwrap_or_default(),
        })
    }
}
