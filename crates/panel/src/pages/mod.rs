//! Cluster panel pages
//!
//! The panel starts on [`Splash`], which connects to every host and then
//! leaves [`Home`] alone on the stack. Any button on the home page opens the
//! actions menu, from which the information and control pages are reached.

mod carrier_control;
mod carrier_info;
mod home;
mod node_control;
mod node_info;
mod splash;

pub use carrier_control::CarrierControl;
pub use carrier_info::CarrierInfo;
pub use home::Home;
pub use node_control::NodeControl;
pub use node_info::NodeInfo;
pub use splash::Splash;

use remote::{CarrierController, ClusterStatus, ConnectionPool, Node, NodeQueries};
use std::sync::Arc;
use ui::{MenuItem, MenuPage, Page};

pub const ACTIONS: &str = "actions";

/// Everything the pages query: the carrier controller and the nodes
#[derive(Clone)]
pub struct Cluster {
    pool: Arc<ConnectionPool>,
    carrier: CarrierController,
    queries: NodeQueries,
    nodes: Arc<[Node]>,
}

impl Cluster {
    pub fn new(pool: Arc<ConnectionPool>, carrier: Node, nodes: Vec<Node>) -> Self {
        Self {
            carrier: CarrierController::new(Arc::clone(&pool), carrier),
            queries: NodeQueries::new(Arc::clone(&pool)),
            nodes: nodes.into(),
            pool,
        }
    }

    pub fn carrier(&self) -> &CarrierController {
        &self.carrier
    }

    pub fn queries(&self) -> &NodeQueries {
        &self.queries
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every host the panel talks to, the carrier last
    pub fn hosts(&self) -> Vec<Node> {
        let mut hosts: Vec<Node> = self.nodes.to_vec();
        if !self.carrier.carrier().host_name.is_empty() {
            hosts.push(self.carrier.carrier().clone());
        }
        hosts
    }

    /// Open a session to every host, best effort
    pub async fn connect(&self) {
        self.pool.connect(&self.hosts()).await;
    }

    pub async fn status(&self) -> ClusterStatus {
        ClusterStatus::collect(&self.carrier, &self.queries, &self.nodes).await
    }
}

/// Build the page graph and return the first page to open
pub fn build(cluster: Cluster) -> Arc<dyn Page> {
    let actions: Arc<dyn Page> = Arc::new(MenuPage::new(
        ACTIONS,
        vec![
            MenuItem::page("Node Info", Arc::new(NodeInfo::new(cluster.clone()))),
            MenuItem::page("Node Ctrl", Arc::new(NodeControl::new(cluster.clone()))),
            MenuItem::page("Turing Info", Arc::new(CarrierInfo::new(cluster.clone()))),
            MenuItem::page("Turing Ctrl", Arc::new(CarrierControl::new(cluster.clone()))),
            MenuItem::back(),
        ],
    ));
    let home: Arc<dyn Page> = Arc::new(Home::new(cluster.clone(), actions));
    Arc::new(Splash::new(cluster, home))
}

#[cfg(test)]
pub(crate) mod harness {
    //! Shell task over a memory display and a scripted cluster

    use super::Cluster;
    use common::test_utils::{DEFAULT_TEST_TIMEOUT, wait_until};
    use remote::testing::{MockHost, MockSessionFactory, mock_carrier, mock_node};
    use remote::{CommandOutput, ConnectionPool};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use ui::{Button, ButtonEvent, MemoryDisplay, Page, PageId, Panel, Shell, ShellHandle};

    pub const TEMP: &str = "cat /sys/class/thermal/thermal_zone0/temp";
    pub const ADDR: &str = "ifconfig | grep -w inet | awk '{print $2}'";
    pub const POWER: &str = "tpi power status";

    /// node1 and node2 answer, node3 is unreachable
    pub fn factory() -> Arc<MockSessionFactory> {
        Arc::new(
            MockSessionFactory::new()
                .with_host(
                    &mock_node(1).host_name,
                    MockHost::new()
                        .respond(TEMP, CommandOutput::success("45000\n"))
                        .respond(ADDR, CommandOutput::success("127.0.0.1\n192.168.1.51\n")),
                )
                .with_host(
                    &mock_node(2).host_name,
                    MockHost::new()
                        .respond(TEMP, CommandOutput::success("61500\n"))
                        .respond(ADDR, CommandOutput::success("192.168.1.52\n")),
                )
                .with_host(
                    &mock_carrier().host_name,
                    MockHost::new()
                        .respond(
                            "tpi info | grep -w version | awk '{print $3}'",
                            CommandOutput::success("2.0.5\n"),
                        )
                        .respond(
                            "tpi info | grep -w ip | awk '{print $3}'",
                            CommandOutput::success("192.168.1.2\n"),
                        )
                        .respond(
                            "tpi info | grep -w mac | awk '{print $3}'",
                            CommandOutput::success("12:34:56:78:9a:bc\n"),
                        )
                        .respond(
                            POWER,
                            CommandOutput::success("node1: On\nnode2: Off\nnode3: On\n"),
                        ),
                ),
        )
    }

    pub fn cluster(factory: &Arc<MockSessionFactory>) -> Cluster {
        let pool = Arc::new(ConnectionPool::new(factory.clone()));
        Cluster::new(pool, mock_carrier(), (1..=3).map(mock_node).collect())
    }

    pub struct Harness {
        pub display: MemoryDisplay,
        pub handle: ShellHandle,
        current: watch::Receiver<Option<PageId>>,
        task: JoinHandle<()>,
    }

    impl Harness {
        pub fn start() -> Self {
            let display = MemoryDisplay::new(16, 2);
            let shell = Shell::new(Panel::new(display.clone()));
            let handle = shell.handle();
            let current = shell.watch_current();
            let task = tokio::spawn(shell.run());
            Self {
                display,
                handle,
                current,
                task,
            }
        }

        pub fn open(&self, page: Arc<dyn Page>) {
            self.handle.open_page(page).unwrap();
        }

        pub fn press(&self, button: Button) {
            self.handle.button(ButtonEvent::press(button)).unwrap();
        }

        pub fn current(&self) -> Option<PageId> {
            *self.current.borrow()
        }

        pub async fn wait_for_page(&self, page: PageId) -> bool {
            wait_until(DEFAULT_TEST_TIMEOUT, || self.current() == Some(page)).await
        }

        /// Wait until the previewed row, without trailing spaces, equals `text`
        pub async fn wait_for_row(&self, row: usize, text: &str) -> bool {
            let found = wait_until(DEFAULT_TEST_TIMEOUT, || {
                self.display.preview_row(row).trim_end() == text
            })
            .await;
            if !found {
                eprintln!("screen: {:?}", self.display.preview());
            }
            found
        }

        pub async fn wait_for_prefix(&self, row: usize, prefix: &str) -> bool {
            let found = wait_until(DEFAULT_TEST_TIMEOUT, || {
                self.display.preview_row(row).starts_with(prefix)
            })
            .await;
            if !found {
                eprintln!("screen: {:?}", self.display.preview());
            }
            found
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::harness::*;
    use super::*;
    use remote::testing::{mock_carrier, mock_node};
    use std::time::Duration;
    use ui::Button;

    #[test]
    fn test_hosts_include_carrier_last() {
        let cluster = cluster(&factory());

        let hosts = cluster.hosts();
        assert_eq!(hosts.len(), 4);
        assert_eq!(hosts[0], mock_node(1));
        assert_eq!(hosts[3], mock_carrier());
    }

    #[test]
    fn test_hosts_skip_unset_carrier() {
        let factory = factory();
        let pool = Arc::new(ConnectionPool::new(factory));
        let cluster = Cluster::new(pool, Node::default(), vec![mock_node(1)]);

        assert_eq!(cluster.hosts(), vec![mock_node(1)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_snapshot() {
        let cluster = cluster(&factory());

        let status = cluster.status().await;
        assert_eq!(status.carrier.version.as_deref(), Some("2.0.5"));
        assert_eq!(status.carrier.power, vec![true, false, true]);
        assert_eq!(status.nodes[0].temperature, Some(45.0));
        assert_eq!(status.nodes[2].temperature, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_startup_reaches_home_and_actions() {
        let factory = factory();
        let harness = Harness::start();
        harness.open(build(cluster(&factory)));

        assert!(harness.wait_for_page(home::HOME).await);
        assert!(harness.wait_for_row(0, "1:45.0°  2:61.5°").await);

        // Sessions were opened during the splash
        assert!(factory.stats().connects() >= 3);

        harness.press(Button::Right);
        assert!(harness.wait_for_page(ACTIONS).await);
        assert!(harness.wait_for_prefix(0, "▸Node Info").await);

        harness.press(Button::Right);
        harness.press(Button::Right);
        harness.press(Button::Right);
        harness.press(Button::Right);
        assert!(harness.wait_for_prefix(0, "▸Back").await);

        harness.press(Button::Action);
        assert!(harness.wait_for_page(home::HOME).await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.current(), Some(home::HOME));
    }
}
