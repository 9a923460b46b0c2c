//! Node power control menu
//!
//! Items are rebuilt from the carrier's power table on every refresh: one
//! switch per slot, then the all-nodes commands that would change anything.

use super::Cluster;
use async_trait::async_trait;
use remote::{CarrierController, PowerTarget};
use std::time::Duration;
use tracing::warn;
use ui::{ButtonEvent, EventResult, Menu, MenuItem, Page, PageContext, PageId};

pub const NODE_CONTROL: PageId = "node-control";

const LOADING_PROGRESS: Duration = Duration::from_secs(3);
/// Refresh soon after a command so the menu shows the new state
const AFTER_COMMAND: Duration = Duration::from_secs(2);

pub struct NodeControl {
    cluster: Cluster,
    menu: Menu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Switch {
    On,
    Off,
}

impl NodeControl {
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

    fn command(
        carrier: &CarrierController,
        caption: String,
        target: PowerTarget,
        switch: Switch,
    ) -> MenuItem {
        let carrier = carrier.clone();
        MenuItem::action(caption, move |ctx: PageContext| {
            let carrier = carrier.clone();
            async move {
                if let Some(mut display) = ctx.display().await {
                    display.write_at(1, 0, &ctx.pad("Executing ..."));
                }

                let done = match switch {
                    Switch::On => carrier.power_on(target).await,
                    Switch::Off => carrier.power_off(target).await,
                };
                if !done {
                    warn!("Switching {:?} {} failed", switch, target);
                }
                ctx.schedule_refresh(AFTER_COMMAND, true);
            }
        })
    }

    fn items(carrier: &CarrierController, power: &[bool]) -> Vec<MenuItem> {
        let mut items = Vec::with_capacity(power.len() + 3);

        for (slot, &on) in power.iter().enumerate() {
            let Ok(index) = u8::try_from(slot + 1) else {
                break;
            };
            let target = PowerTarget::Node(index);
            items.push(if on {
                Self::command(carrier, format!("{}: Switch OFF", index), target, Switch::Off)
            } else {
                Self::command(carrier, format!("{}: Switch ON", index), target, Switch::On)
            });
        }

        if power.iter().any(|on| !on) {
            items.push(Self::command(
                carrier,
                "Power ON ALL".to_string(),
                PowerTarget::All,
                Switch::On,
            ));
        }
        if power.iter().any(|on| *on) {
            items.push(Self::command(
                carrier,
                "Power OFF ALL".to_string(),
                PowerTarget::All,
                Switch::Off,
            ));
        }

        items.push(MenuItem::back());
        items
    }
}

#[async_trait]
impl Page for NodeControl {
    fn name(&self) -> PageId {
        NODE_CONTROL
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.menu.open(ctx).await;
        if let Some(mut display) = ctx.display().await {
            display.clear();
            display.write("Node Control ...");
        }
        ctx.show_progress(LOADING_PROGRESS)?;
        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        let carrier = self.cluster.carrier();
        let power = carrier.power_status().await;
        self.menu.set_items(Self::items(carrier, &power));
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
    use remote::CommandOutput;
    use remote::testing::{MockHost, MockSessionFactory, mock_carrier};
    use std::sync::Arc;
    use ui::{Button, MenuPage};

    fn captions(power: &[bool]) -> Vec<String> {
        let carrier = cluster(&factory()).carrier().clone();
        NodeControl::items(&carrier, power)
            .iter()
            .map(|item| item.caption().to_string())
            .collect()
    }

    #[test]
    fn test_items_follow_power_table() {
        assert_eq!(
            captions(&[true, false, true]),
            vec![
                "1: Switch OFF",
                "2: Switch ON",
                "3: Switch OFF",
                "Power ON ALL",
                "Power OFF ALL",
                "Back"
            ]
        );
        assert_eq!(
            captions(&[true, true]),
            vec!["1: Switch OFF", "2: Switch OFF", "Power OFF ALL", "Back"]
        );
        assert_eq!(
            captions(&[false]),
            vec!["1: Switch ON", "Power ON ALL", "Back"]
        );
        assert_eq!(captions(&[]), vec!["Back"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_switch_runs_command_and_refreshes() {
        let factory = factory();
        let carrier = mock_carrier().host_name;
        factory.respond(&carrier, "tpi power --node 1 off", CommandOutput::success(""));

        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        let page = Arc::new(NodeControl::new(cluster(&factory)));
        harness.open(page.clone());

        assert!(harness.wait_for_prefix(0, "▸1: Switch OFF").await);
        assert!(harness.display.preview_row(1).starts_with(" 2: Switch ON"));

        factory.respond(
            &carrier,
            POWER,
            CommandOutput::success("node1: Off\nnode2: Off\nnode3: On\n"),
        );
        harness.press(Button::Action);
        assert!(harness.wait_for_prefix(0, "▸Executing ...").await);

        // Menu is rebuilt from the new table two seconds later
        assert!(harness.wait_for_prefix(0, "▸1: Switch ON").await);
        assert_eq!(
            page.menu().captions(),
            vec![
                "1: Switch ON",
                "2: Switch ON",
                "3: Switch OFF",
                "Power ON ALL",
                "Power OFF ALL",
                "Back"
            ]
        );

        let commands: Vec<String> = factory
            .stats()
            .commands()
            .into_iter()
            .filter(|(host, _)| *host == carrier)
            .map(|(_, command)| command)
            .collect();
        assert!(commands.contains(&"tpi power --node 1 off".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_opening_shows_loading_text() {
        let factory = Arc::new(MockSessionFactory::new().with_host(
            &mock_carrier().host_name,
            MockHost::new()
                .exec_delay(Duration::from_millis(300))
                .respond(POWER, CommandOutput::success("node1: On\n")),
        ));
        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        harness.open(Arc::new(NodeControl::new(cluster(&factory))));

        assert!(harness.wait_for_prefix(0, "Node Control ...").await);
        assert!(harness.wait_for_prefix(0, "▸1: Switch OFF").await);
    }
}
