//! Home page: CPU temperature of every node on a two-column grid
//!
//! ```text
//! 1:45.0°  2:61.5°
//! 3: ---   4:38.2°
//! ```

use super::Cluster;
use async_trait::async_trait;
use futures::future::join_all;
use remote::Node;
use std::sync::Arc;
use tracing::{trace, warn};
use ui::{ButtonEvent, CharacterSet, EventResult, Glyph, Page, PageContext, PageId, PressKind};

pub const HOME: PageId = "home";

pub struct Home {
    cluster: Cluster,
    actions: Arc<dyn Page>,
}

impl Home {
    pub fn new(cluster: Cluster, actions: Arc<dyn Page>) -> Self {
        Self { cluster, actions }
    }

    /// Top-left cell of node `index` (from 0)
    fn cell(columns: usize, index: usize) -> (usize, usize) {
        let column = if index % 2 == 0 { 0 } else { columns / 2 + 1 };
        (column, index / 2)
    }

    fn reading(temperature: Option<f64>) -> String {
        match temperature {
            Some(degrees) => format!("{:04.1}{}", degrees, Glyph::Degrees),
            None => " ---".to_string(),
        }
    }

    async fn show_node(&self, ctx: &PageContext, index: usize, node: &Node) {
        if !node.is_configured() {
            warn!("Node {} has a missing name or host name in config", index + 1);
            return;
        }

        let temperature = self.cluster.queries().cpu_temperature(node).await;
        let (column, row) = Self::cell(ctx.columns(), index);
        let text = ui::display::pad(&Self::reading(temperature), ctx.columns() / 2 - 1);

        if let Some(mut display) = ctx.display().await {
            display.write_at(column + 2, row, &text);
        }
    }
}

#[async_trait]
impl Page for Home {
    fn name(&self) -> PageId {
        HOME
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        trace!(
            "Configured nodes: {}",
            self.cluster
                .nodes()
                .iter()
                .map(|node| node.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        ctx.stop_progress();

        let Some(mut display) = ctx.display().await else {
            return Ok(());
        };
        display.clear();
        display.load_character_set(CharacterSet::Application);

        let slots = ctx.rows() * 2;
        for (index, node) in self.cluster.nodes().iter().enumerate().take(slots) {
            if node.name.is_empty() {
                continue;
            }
            let (column, row) = Self::cell(ctx.columns(), index);
            let label = format!("{}: ---", index + 1);
            display.write_at(column, row, &ui::display::pad(&label, ctx.columns() / 2));
        }

        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        let slots = ctx.rows() * 2;
        let updates = self
            .cluster
            .nodes()
            .iter()
            .enumerate()
            .take(slots)
            .map(|(index, node)| self.show_node(ctx, index, node));
        join_all(updates).await;
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
        ctx.stop_progress();
        ctx.open_page(Arc::clone(&self.actions))?;
        Ok(EventResult::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use remote::CommandOutput;
    use remote::testing::mock_node;
    use ui::{Button, MenuPage};

    fn home(cluster: Cluster) -> Arc<dyn Page> {
        Arc::new(Home::new(cluster, Arc::new(MenuPage::new("actions", vec![]))))
    }

    #[test]
    fn test_cells() {
        assert_eq!(Home::cell(16, 0), (0, 0));
        assert_eq!(Home::cell(16, 1), (9, 0));
        assert_eq!(Home::cell(16, 2), (0, 1));
        assert_eq!(Home::cell(20, 3), (11, 1));
    }

    #[test]
    fn test_reading() {
        assert_eq!(Home::reading(Some(45.0)), format!("45.0{}", Glyph::Degrees));
        assert_eq!(Home::reading(Some(7.3)), format!("07.3{}", Glyph::Degrees));
        assert_eq!(Home::reading(None), " ---");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_grid_shows_placeholders_then_readings() {
        let factory = factory();
        let harness = Harness::start();
        harness.open(home(cluster(&factory)));

        assert!(harness.wait_for_row(0, "1:45.0°  2:61.5°").await);
        assert!(harness.wait_for_row(1, "3: ---").await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unnamed_node_leaves_cell_blank() {
        let factory = factory();
        let pool = Arc::new(remote::ConnectionPool::new(factory.clone()));
        let mut unnamed = mock_node(2);
        unnamed.name = String::new();
        let cluster = Cluster::new(pool, remote::testing::mock_carrier(), vec![mock_node(1), unnamed]);

        let harness = Harness::start();
        harness.open(home(cluster));

        assert!(harness.wait_for_row(0, "1:45.0°").await);
        let temperature_reads = factory
            .stats()
            .commands()
            .iter()
            .filter(|(host, command)| host == "10.0.0.12" && command == TEMP)
            .count();
        assert_eq!(temperature_reads, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recovered_node_updates_on_next_refresh() {
        let factory = factory();
        let display = ui::MemoryDisplay::new(16, 2);
        let shell = ui::Shell::with_refresh_interval(
            ui::Panel::new(display.clone()),
            std::time::Duration::from_millis(100),
        );
        let handle = shell.handle();
        let task = tokio::spawn(shell.run());
        handle.open_page(home(cluster(&factory))).unwrap();

        let row = |display: &ui::MemoryDisplay| display.preview_row(1);
        assert!(
            common::test_utils::wait_until(common::test_utils::DEFAULT_TEST_TIMEOUT, || {
                row(&display).starts_with("3: ---")
            })
            .await
        );

        factory.respond(&mock_node(3).host_name, TEMP, CommandOutput::success("38200"));
        assert!(
            common::test_utils::wait_until(common::test_utils::DEFAULT_TEST_TIMEOUT, || {
                row(&display).starts_with("3:38.2°")
            })
            .await
        );

        task.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_press_opens_actions() {
        let factory = factory();
        let harness = Harness::start();
        harness.open(home(cluster(&factory)));
        assert!(harness.wait_for_page(HOME).await);

        harness.press(Button::Left);
        assert!(harness.wait_for_page("actions").await);
    }
}
