//! Queries against compute nodes

use crate::node::Node;
use crate::parse;
use crate::pool::ConnectionPool;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::trace;

const TEMPERATURE_COMMAND: &str = "cat /sys/class/thermal/thermal_zone0/temp";
const ADDRESS_COMMAND: &str = "ifconfig | grep -w inet | awk '{print $2}'";

/// Typed readings from compute nodes
#[derive(Clone)]
pub struct NodeQueries {
    pool: Arc<ConnectionPool>,
}

impl NodeQueries {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// CPU temperature in degrees Celsius, `None` when unknown
    pub async fn cpu_temperature(&self, node: &Node) -> Option<f64> {
        let output = self
            .pool
            .execute(node, TEMPERATURE_COMMAND, "cpu_temperature")
            .await
            .ok()?;
        let value = parse::parse_temperature(&output);
        trace!("{} temperature: {:?}", node.display_name(), value);
        value
    }

    /// Primary IPv4 address, `None` when unknown
    pub async fn network_address(&self, node: &Node) -> Option<Ipv4Addr> {
        let output = self
            .pool
            .execute(node, ADDRESS_COMMAND, "network_address")
            .await
            .ok()?;
        parse::parse_primary_address(&output)
    }
}
