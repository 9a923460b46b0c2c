//! Point-in-time cluster snapshot
//!
//! Gathers every reading the panel can show in one fan-out. Used by the
//! one-shot `--status` report.

use crate::carrier::CarrierController;
use crate::node::Node;
use crate::node_queries::NodeQueries;
use serde::Serialize;
use std::net::Ipv4Addr;
use tokio::task::JoinSet;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierStatus {
    pub name: String,
    pub host_name: String,
    pub version: Option<String>,
    pub address: Option<Ipv4Addr>,
    pub mac: Option<String>,
    /// Power state per slot, slot 0 is node 1
    pub power: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatus {
    /// Position in the configuration, numbered from 1
    pub index: usize,
    pub name: String,
    pub host_name: String,
    pub temperature: Option<f64>,
    pub address: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatus {
    pub carrier: CarrierStatus,
    pub nodes: Vec<NodeStatus>,
}

impl ClusterStatus {
    pub async fn collect(carrier: &CarrierController, queries: &NodeQueries, nodes: &[Node]) -> Self {
        let mut tasks = JoinSet::new();
        for (position, node) in nodes.iter().enumerate() {
            let queries = queries.clone();
            let node = node.clone();
            tasks.spawn(async move { node_status(&queries, position + 1, node).await });
        }

        let (version, address, mac, power) = tokio::join!(
            carrier.version(),
            carrier.network_address(),
            carrier.mac_address(),
            carrier.power_status(),
        );

        let mut statuses = Vec::with_capacity(nodes.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(status) => statuses.push(status),
                Err(e) => error!("Node status task failed: {}", e),
            }
        }
        statuses.sort_by_key(|s| s.index);

        let descriptor = carrier.carrier();
        Self {
            carrier: CarrierStatus {
                name: descriptor.display_name().to_string(),
                host_name: descriptor.host_name.clone(),
                version,
                address,
                mac,
                power,
            },
            nodes: statuses,
        }
    }
}

async fn node_status(queries: &NodeQueries, index: usize, node: Node) -> NodeStatus {
    let (temperature, address) = if node.is_configured() {
        tokio::join!(queries.cpu_temperature(&node), queries.network_address(&node))
    } else {
        (None, None)
    };

    NodeStatus {
        index,
        name: node.display_name().to_string(),
        host_name: node.host_name,
        temperature,
        address,
    }
}
