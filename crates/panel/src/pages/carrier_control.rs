//! Carrier control menu

use super::Cluster;
use async_trait::async_trait;
use tracing::error;
use ui::{ButtonEvent, EventResult, Menu, MenuItem, Page, PageContext, PageId};

pub const CARRIER_CONTROL: PageId = "carrier-control";

pub struct CarrierControl {
    cluster: Cluster,
    menu: Menu,
}

impl CarrierControl {
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

    fn items(&self) -> Vec<MenuItem> {
        let carrier = self.cluster.carrier().clone();
        vec![
            MenuItem::action("Reboot Turing", move |ctx: PageContext| {
                let carrier = carrier.clone();
                async move {
                    if let Some(mut display) = ctx.display().await {
                        display.write_at(1, 0, &ctx.pad("Rebooting ..."));
                    }
                    if !carrier.reboot().await {
                        error!("Carrier reboot failed");
                    }
                }
            }),
            MenuItem::back(),
        ]
    }
}

#[async_trait]
impl Page for CarrierControl {
    fn name(&self) -> PageId {
        CARRIER_CONTROL
    }

    fn auto_refresh(&self) -> bool {
        false
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.menu.set_items(self.items());
        self.menu.open(ctx).await;
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
    use common::test_utils::{DEFAULT_TEST_TIMEOUT, wait_until};
    use remote::CommandOutput;
    use remote::testing::mock_carrier;
    use std::sync::Arc;
    use ui::{Button, MenuPage};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reboot_item() {
        let factory = factory();
        let carrier = mock_carrier().host_name;
        factory.respond(&carrier, "tpi reboot", CommandOutput::success(""));

        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        let page = Arc::new(CarrierControl::new(cluster(&factory)));
        harness.open(page.clone());

        assert!(harness.wait_for_prefix(0, "▸Reboot Turing").await);
        assert_eq!(page.menu().captions(), vec!["Reboot Turing", "Back"]);

        harness.press(Button::Action);
        assert!(harness.wait_for_prefix(0, "▸Rebooting ...").await);

        let stats = factory.stats();
        assert!(
            wait_until(DEFAULT_TEST_TIMEOUT, || {
                stats
                    .commands()
                    .iter()
                    .any(|(host, command)| *host == carrier && command == "tpi reboot")
            })
            .await
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_back_closes() {
        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        harness.open(Arc::new(CarrierControl::new(cluster(&factory()))));
        assert!(harness.wait_for_prefix(0, "▸Reboot Turing").await);

        harness.press(Button::Right);
        assert!(harness.wait_for_prefix(0, "▸Back").await);
        harness.press(Button::Action);
        assert!(harness.wait_for_page("actions").await);
    }
}
