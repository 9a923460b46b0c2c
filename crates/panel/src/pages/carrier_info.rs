//! Carrier information: firmware, powered nodes, address and MAC
//!
//! An IP address can use the full width of a 16 column display, so the
//! address and MAC items carry no caption and the MAC drops its separators.

use super::Cluster;
use async_trait::async_trait;
use std::time::Duration;
use ui::{ButtonEvent, EventResult, Menu, MenuItem, Page, PageContext, PageId};

pub const CARRIER_INFO: PageId = "carrier-info";

const LOADING_PROGRESS: Duration = Duration::from_secs(3);
const UNKNOWN: &str = "---";

pub struct CarrierInfo {
    cluster: Cluster,
    menu: Menu,
}

impl CarrierInfo {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            menu: Menu::new(),
        }
    }

    #[cfg(test)]
    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    fn version_caption(version: Option<String>) -> String {
        match version {
            Some(version) => format!("BMC: v{}", version),
            None => format!("BMC: {}", UNKNOWN),
        }
    }

    /// Which nodes are powered, numbered from 1
    fn power_caption(power: &[bool]) -> String {
        if power.is_empty() {
            return format!("Nodes: {}", UNKNOWN);
        }
        if power.iter().all(|on| *on) {
            return "All Nodes On".to_string();
        }

        let on: Vec<String> = power
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(|(slot, _)| (slot + 1).to_string())
            .collect();
        if on.is_empty() {
            "No Nodes On".to_string()
        } else {
            format!("Node {} on", on.join(","))
        }
    }

    fn mac_caption(mac: Option<String>) -> String {
        mac.map_or_else(|| UNKNOWN.to_string(), |mac| mac.replace(':', ""))
    }
}

#[async_trait]
impl Page for CarrierInfo {
    fn name(&self) -> PageId {
        CARRIER_INFO
    }

    fn auto_refresh(&self) -> bool {
        false
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.menu.open(ctx).await;
        if let Some(mut display) = ctx.display().await {
            display.clear();
            display.write("Turing Info ...");
        }
        ctx.show_progress_span(
            0,
            ctx.columns().saturating_sub(1),
            LOADING_PROGRESS,
            Duration::ZERO,
        )?;
        Ok(())
    }

    async fn on_close(&self, ctx: &PageContext) -> anyhow::Result<()> {
        ctx.stop_progress();
        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        let carrier = self.cluster.carrier();
        let (version, power, address, mac) = tokio::join!(
            carrier.version(),
            carrier.power_status(),
            carrier.network_address(),
            carrier.mac_address(),
        );

        self.menu.set_items(vec![
            MenuItem::info(Self::version_caption(version)),
            MenuItem::info(Self::power_caption(&power)),
            MenuItem::info(address.map_or_else(|| UNKNOWN.to_string(), |a| a.to_string())),
            MenuItem::info(Self::mac_caption(mac)),
            MenuItem::back(),
        ]);
        self.menu.show(ctx).await;
        Ok(())
    }

    async fn on_button(
        &self,
        ctx: &PageContext,
        event: ButtonEvent,
    ) -> anyhow::Result<EventResult> {
        self.menu.handle_button(ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use remote::ConnectionPool;
    use remote::testing::{MockSessionFactory, mock_carrier, mock_node};
    use std::sync::Arc;
    use ui::{Button, MenuPage};

    #[test]
    fn test_power_caption() {
        assert_eq!(CarrierInfo::power_caption(&[true, true, true, true]), "All Nodes On");
        assert_eq!(CarrierInfo::power_caption(&[true, false, true, false]), "Node 1,3 on");
        assert_eq!(CarrierInfo::power_caption(&[false, false, false, true]), "Node 4 on");
        assert_eq!(CarrierInfo::power_caption(&[false, false]), "No Nodes On");
        assert_eq!(CarrierInfo::power_caption(&[]), "Nodes: ---");
    }

    #[test]
    fn test_captions_for_unknown_values() {
        assert_eq!(CarrierInfo::version_caption(Some("2.0.5".into())), "BMC: v2.0.5");
        assert_eq!(CarrierInfo::version_caption(None), "BMC: ---");
        assert_eq!(
            CarrierInfo::mac_caption(Some("12:34:56:78:9a:bc".into())),
            "123456789abc"
        );
        assert_eq!(CarrierInfo::mac_caption(None), "---");
    }

    async fn open(cluster: Cluster) -> (Harness, Arc<CarrierInfo>) {
        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        let page = Arc::new(CarrierInfo::new(cluster));
        harness.open(page.clone());
        assert!(harness.wait_for_prefix(0, "•BMC:").await);
        (harness, page)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reachable_carrier() {
        let (harness, page) = open(cluster(&factory())).await;

        assert_eq!(
            page.menu().captions(),
            vec!["BMC: v2.0.5", "Node 1,3 on", "192.168.1.2", "123456789abc", "Back"]
        );
        assert!(harness.display.preview_row(0).starts_with("•BMC: v2.0.5"));
        assert!(harness.display.preview_row(1).starts_with(" Node 1,3 on"));

        for _ in 0..4 {
            harness.press(Button::Right);
        }
        assert!(harness.wait_for_prefix(0, "▸Back").await);
        harness.press(Button::Action);
        assert!(harness.wait_for_page("actions").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_carrier() {
        let pool = Arc::new(ConnectionPool::new(Arc::new(MockSessionFactory::new())));
        let cluster = Cluster::new(pool, mock_carrier(), vec![mock_node(1)]);
        let (_harness, page) = open(cluster).await;

        assert_eq!(
            page.menu().captions(),
            vec!["BMC: ---", "Nodes: ---", "---", "---", "Back"]
        );
    }
}
