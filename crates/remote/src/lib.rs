//! Remote command execution for tpi-panel
//!
//! Owns one pooled shell session per host, runs single-line commands on
//! compute nodes and on the cluster carrier's management controller, and
//! turns their output into typed readings. Every query degrades to a
//! sentinel (`None` or `false`) instead of surfacing transport errors.

pub mod carrier;
pub mod error;
pub mod hostkey;
pub mod node;
pub mod node_queries;
pub mod parse;
pub mod pool;
pub mod session;
pub mod ssh;
pub mod status;
pub mod testing;

pub use carrier::{CarrierController, PowerTarget};
pub use error::{RemoteError, Result};
pub use node::{Credentials, Node};
pub use node_queries::NodeQueries;
pub use pool::{ConnectionPool, DEFAULT_COMMAND_TIMEOUT};
pub use session::{CommandOutput, RemoteSession, SessionFactory};
pub use ssh::SshSessionFactory;
pub use status::{CarrierStatus, ClusterStatus, NodeStatus};
