//! Startup page: logo and progress bar while sessions are opened

use super::Cluster;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, trace};
use ui::{CharacterSet, Glyph, Page, PageContext, PageId};

pub const SPLASH: PageId = "splash";

const PROGRESS_DURATION: Duration = Duration::from_secs(2);

pub struct Splash {
    cluster: Cluster,
    home: Arc<dyn Page>,
}

impl Splash {
    pub fn new(cluster: Cluster, home: Arc<dyn Page>) -> Self {
        Self { cluster, home }
    }
}

#[async_trait]
impl Page for Splash {
    fn name(&self) -> PageId {
        SPLASH
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        if let Some(mut display) = ctx.display().await {
            display.load_character_set(CharacterSet::Splash);
            display.clear();
            display.write(&format!(
                " {}{}  Turing Pi",
                Glyph::LogoTopLeft,
                Glyph::LogoTopRight
            ));
            display.write_at(
                0,
                1,
                &format!(" {}{}", Glyph::LogoBottomLeft, Glyph::LogoBottomRight),
            );
        }

        ctx.show_progress_span(
            4,
            ctx.columns().saturating_sub(2),
            PROGRESS_DURATION,
            Duration::ZERO,
        )?;

        info!("Connecting to {} host(s)", self.cluster.hosts().len());
        self.cluster.connect().await;
        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        trace!("Startup finished, leaving splash");
        ctx.replace_stack(Arc::clone(&self.home))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::harness::*;
    use super::*;
    use remote::testing::{MockHost, MockSessionFactory, mock_node};
    use ui::MenuPage;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_splash_draws_logo_then_leaves() {
        // A slow host keeps the splash up long enough to observe
        let factory = Arc::new(MockSessionFactory::new().with_host(
            &mock_node(1).host_name,
            MockHost::new().connect_delay(Duration::from_millis(300)),
        ));
        let harness = Harness::start();
        let home: Arc<dyn Page> = Arc::new(MenuPage::new("home", vec![]));
        harness.open(Arc::new(Splash::new(cluster(&factory), home)));

        assert!(harness.wait_for_row(0, " ┏┓  Turing Pi").await);
        assert!(harness.wait_for_prefix(1, " ┗┛").await);
        assert_eq!(harness.current(), Some(SPLASH));

        assert!(harness.wait_for_page("home").await);
        assert_eq!(factory.stats().connects(), 4);
        assert!(factory.stats().commands().is_empty());

        // Splash is gone from the stack
        harness.handle.close_page().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(harness.current(), Some("home"));
    }
}
