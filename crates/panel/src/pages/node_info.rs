//! Node information: name and address of one node at a time
//!
//! The page cycles through the nodes every 20 seconds. Left and right pick
//! a node by hand and hold it for two minutes; action closes the page.

use super::Cluster;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use ui::{Button, ButtonEvent, EventResult, Page, PageContext, PageId, PressKind};

pub const NODE_INFO: PageId = "node-info";

const CYCLE_INTERVAL: Duration = Duration::from_secs(20);
const MANUAL_HOLD: Duration = Duration::from_secs(120);
const QUERY_PROGRESS: Duration = Duration::from_secs(4);

pub struct NodeInfo {
    cluster: Cluster,
    /// Node on screen, `None` until the first refresh
    index: Arc<Mutex<Option<usize>>>,
}

impl NodeInfo {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            index: Arc::new(Mutex::new(None)),
        }
    }

    pub fn selected(&self) -> Option<usize> {
        *self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(&self, index: Option<usize>) {
        *self.index.lock().unwrap_or_else(PoisonError::into_inner) = index;
    }

    fn navigate_right(&self) -> usize {
        let count = self.cluster.nodes().len();
        let next = match self.selected() {
            Some(index) if index + 1 < count => index + 1,
            _ => 0,
        };
        self.select(Some(next));
        next
    }

    fn navigate_left(&self) -> usize {
        let count = self.cluster.nodes().len();
        let next = match self.selected() {
            Some(index) if index > 0 => index - 1,
            _ => count.saturating_sub(1),
        };
        self.select(Some(next));
        next
    }

    /// Paint the node's name and look up its address in the background
    ///
    /// The address is only painted if the same node is still selected.
    async fn display(&self, ctx: &PageContext, index: usize) -> anyhow::Result<()> {
        let Some(node) = self.cluster.nodes().get(index).filter(|n| n.is_configured()) else {
            info!("Node {} is not set up", index + 1);
            return Ok(());
        };

        if let Some(mut display) = ctx.display().await {
            display.write_at(0, 0, &ctx.pad(&node.name));
            display.write_at(0, 1, &ctx.pad("..."));
        }

        ctx.show_progress(QUERY_PROGRESS)?;

        let ctx = ctx.clone();
        let node = node.clone();
        let queries = self.cluster.queries().clone();
        let selected = Arc::clone(&self.index);
        tokio::spawn(async move {
            let address = queries.network_address(&node).await;
            let still_selected =
                *selected.lock().unwrap_or_else(PoisonError::into_inner) == Some(index);
            if !still_selected {
                debug!("Discarding address of {}, selection moved", node.display_name());
                return;
            }

            ctx.stop_progress();
            let text = address.map_or_else(|| "Offline".to_string(), |a| a.to_string());
            if let Some(mut display) = ctx.display().await {
                display.write_at(0, 1, &ctx.pad(&text));
            }
        });

        Ok(())
    }
}

#[async_trait]
impl Page for NodeInfo {
    fn name(&self) -> PageId {
        NODE_INFO
    }

    fn auto_refresh(&self) -> bool {
        false
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.select(None);
        if let Some(mut display) = ctx.display().await {
            display.clear();
            display.write("Node Info ...");
        }
        Ok(())
    }

    async fn on_close(&self, ctx: &PageContext) -> anyhow::Result<()> {
        ctx.stop_progress();
        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        let index = self.navigate_right();
        ctx.stop_progress();
        self.display(ctx, index).await?;
        ctx.schedule_refresh(CYCLE_INTERVAL, false);
        Ok(())
    }

    async fn on_button(
        &self,
        ctx: &PageContext,
        event: ButtonEvent,
    ) -> anyhow::Result<EventResult> {
        if event.kind != PressKind::Press {
            return Ok(EventResult::Ignored);
        }

        match event.button {
            Button::Left => {
                ctx.schedule_refresh(MANUAL_HOLD, true);
                let index = self.navigate_left();
                self.display(ctx, index).await?;
            }
            Button::Right => {
                ctx.schedule_refresh(MANUAL_HOLD, true);
                let index = self.navigate_right();
                self.display(ctx, index).await?;
            }
            Button::Action => ctx.close_page()?,
        }
        Ok(EventResult::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use remote::testing::{MockHost, MockSessionFactory, mock_carrier, mock_node};
    use remote::{CommandOutput, ConnectionPool};
    use ui::MenuPage;

    fn open(factory: &Arc<MockSessionFactory>) -> (Harness, Arc<NodeInfo>) {
        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        let page = Arc::new(NodeInfo::new(cluster(factory)));
        harness.open(page.clone());
        (harness, page)
    }

    #[test]
    fn test_navigation_wraps() {
        let page = NodeInfo::new(cluster(&factory()));

        assert_eq!(page.navigate_right(), 0);
        assert_eq!(page.navigate_right(), 1);
        assert_eq!(page.navigate_right(), 2);
        assert_eq!(page.navigate_right(), 0);
        assert_eq!(page.navigate_left(), 2);
        assert_eq!(page.navigate_left(), 1);

        page.select(None);
        assert_eq!(page.navigate_left(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_first_refresh_shows_first_node() {
        let (harness, page) = open(&factory());

        assert!(harness.wait_for_row(0, "node1").await);
        assert!(harness.wait_for_row(1, "192.168.1.51").await);
        assert_eq!(page.selected(), Some(0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_buttons_move_between_nodes() {
        let (harness, page) = open(&factory());
        assert!(harness.wait_for_row(1, "192.168.1.51").await);

        harness.press(Button::Left);
        assert!(harness.wait_for_row(0, "node3").await);
        assert!(harness.wait_for_row(1, "Offline").await);
        assert_eq!(page.selected(), Some(2));

        harness.press(Button::Right);
        assert!(harness.wait_for_row(0, "node1").await);

        harness.press(Button::Right);
        assert!(harness.wait_for_row(0, "node2").await);
        assert!(harness.wait_for_row(1, "192.168.1.52").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_address_is_not_painted() {
        let factory = Arc::new(
            MockSessionFactory::new()
                .with_host(
                    &mock_node(1).host_name,
                    MockHost::new()
                        .exec_delay(Duration::from_millis(400))
                        .respond(ADDR, CommandOutput::success("192.168.1.51")),
                )
                .with_host(
                    &mock_node(2).host_name,
                    MockHost::new().respond(ADDR, CommandOutput::success("192.168.1.52")),
                ),
        );
        let pool = Arc::new(ConnectionPool::new(factory.clone()));
        let cluster = Cluster::new(pool, mock_carrier(), vec![mock_node(1), mock_node(2)]);

        let harness = Harness::start();
        harness.open(Arc::new(MenuPage::new("actions", vec![])));
        harness.open(Arc::new(NodeInfo::new(cluster)));
        assert!(harness.wait_for_row(0, "node1").await);

        // Move on while node1's lookup is still running
        harness.press(Button::Right);
        assert!(harness.wait_for_row(1, "192.168.1.52").await);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(harness.display.preview_row(0).trim_end(), "node2");
        assert_eq!(harness.display.preview_row(1).trim_end(), "192.168.1.52");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_action_closes() {
        let (harness, _page) = open(&factory());
        assert!(harness.wait_for_row(0, "node1").await);

        harness.press(Button::Action);
        assert!(harness.wait_for_page("actions").await);
    }
}
