//! Queries and power control for the cluster carrier
//!
//! The carrier's management controller exposes a vendor CLI (`tpi`). Only
//! its stable output columns are used.

use crate::node::Node;
use crate::parse;
use crate::pool::ConnectionPool;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

/// Which slot a power command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTarget {
    /// One node, numbered from 1
    Node(u8),
    All,
}

impl fmt::Display for PowerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerTarget::Node(index) => write!(f, "node {}", index),
            PowerTarget::All => write!(f, "all nodes"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerState {
    On,
    Off,
}

impl PowerState {
    fn as_arg(self) -> &'static str {
        match self {
            PowerState::On => "on",
            PowerState::Off => "off",
        }
    }
}

#[derive(Clone)]
pub struct CarrierController {
    pool: Arc<ConnectionPool>,
    carrier: Node,
}

impl CarrierController {
    pub fn new(pool: Arc<ConnectionPool>, carrier: Node) -> Self {
        Self { pool, carrier }
    }

    pub fn carrier(&self) -> &Node {
        &self.carrier
    }

    async fn query(&self, command: &str, caller: &str) -> Option<String> {
        self.pool.execute(&self.carrier, command, caller).await.ok()
    }

    async fn run(&self, command: &str, caller: &str) -> bool {
        self.pool
            .execute(&self.carrier, command, caller)
            .await
            .is_ok()
    }

    /// Management controller firmware version
    pub async fn version(&self) -> Option<String> {
        self.query("tpi info | grep -w version | awk '{print $3}'", "version")
            .await
            .filter(|v| !v.is_empty())
    }

    pub async fn network_address(&self) -> Option<Ipv4Addr> {
        let output = self
            .query("tpi info | grep -w ip | awk '{print $3}'", "network_address")
            .await?;
        parse::parse_primary_address(&output)
    }

    pub async fn mac_address(&self) -> Option<String> {
        self.query("tpi info | grep -w mac | awk '{print $3}'", "mac_address")
            .await
            .filter(|v| !v.is_empty())
    }

    /// Power state of every slot, empty when unknown
    pub async fn power_status(&self) -> Vec<bool> {
        self.query("tpi power status", "power_status")
            .await
            .map(|output| parse::parse_power_table(&output))
            .unwrap_or_default()
    }

    /// Power state of one node, numbered from 1
    pub async fn node_power(&self, index: u8) -> bool {
        let command = format!(
            "tpi power status | grep -w node{}: | awk '{{print $2}}'",
            index
        );
        self.query(&command, "node_power")
            .await
            .is_some_and(|output| parse::parse_power_state(&output))
    }

    pub async fn power_on(&self, target: PowerTarget) -> bool {
        self.power(target, PowerState::On).await
    }

    pub async fn power_off(&self, target: PowerTarget) -> bool {
        self.power(target, PowerState::Off).await
    }

    async fn power(&self, target: PowerTarget, state: PowerState) -> bool {
        info!("Powering {} {}", state.as_arg(), target);
        let command = match target {
            PowerTarget::Node(index) => format!("tpi power --node {} {}", index, state.as_arg()),
            PowerTarget::All => format!("tpi power {}", state.as_arg()),
        };
        self.run(&command, "power").await
    }

    pub async fn reboot(&self) -> bool {
        info!("Rebooting the carrier");
        self.run("tpi reboot", "reboot").await
    }
}
