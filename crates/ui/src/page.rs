//! Page capability and the per-page context
//!
//! A [`Page`] is a long-lived singleton. The shell gives every page one
//! [`PageContext`] that owns its timers and is the only way to reach the
//! display, so a page that is no longer on top of the stack cannot paint.

use crate::display::{DisplayGuard, Panel, pad};
use crate::error::Result;
use crate::input::ButtonEvent;
use crate::shell::ShellHandle;
use crate::timer::{DEFAULT_PROGRESS_DELAY, ProgressPlan, ProgressTimer, RefreshTimer};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, trace};

/// Pages are identified by their static name
pub type PageId = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Handled,
    Ignored,
}

/// Lifecycle hooks of a page
///
/// Errors and panics raised by any hook are logged by the shell and never
/// reach the caller.
#[async_trait]
pub trait Page: Send + Sync {
    fn name(&self) -> PageId;

    /// Whether the refresh timer rearms itself after every firing
    fn auto_refresh(&self) -> bool {
        true
    }

    async fn on_open(&self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_close(&self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_refresh(&self, _ctx: &PageContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_button(
        &self,
        _ctx: &PageContext,
        _event: ButtonEvent,
    ) -> anyhow::Result<EventResult> {
        Ok(EventResult::Ignored)
    }
}

/// Display access gated on the page being current
#[derive(Clone)]
pub(crate) struct Painter {
    page: PageId,
    panel: Panel,
    current: watch::Receiver<Option<PageId>>,
}

impl Painter {
    pub(crate) fn page(&self) -> PageId {
        self.page
    }

    pub(crate) fn rows(&self) -> usize {
        self.panel.rows()
    }

    fn is_current(&self) -> bool {
        *self.current.borrow() == Some(self.page)
    }

    /// The lock is taken before the check so a page cannot lose the top of
    /// the stack between the check and its writes being queued.
    pub(crate) async fn display(&self) -> Option<DisplayGuard<'_>> {
        let guard = self.panel.lock().await;
        if self.is_current() {
            Some(guard)
        } else {
            trace!("Discarding paint from page '{}', not current", self.page);
            None
        }
    }
}

/// Handle a page uses to paint, schedule and navigate
#[derive(Clone)]
pub struct PageContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    painter: Painter,
    shell: ShellHandle,
    refresh: RefreshTimer,
    progress: ProgressTimer,
}

impl PageContext {
    pub(crate) fn new(
        page: PageId,
        panel: Panel,
        current: watch::Receiver<Option<PageId>>,
        shell: ShellHandle,
        refresh: RefreshTimer,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                painter: Painter {
                    page,
                    panel,
                    current,
                },
                shell,
                refresh,
                progress: ProgressTimer::default(),
            }),
        }
    }

    pub fn page(&self) -> PageId {
        self.inner.painter.page
    }

    /// Whether this page is on top of the stack
    pub fn is_current(&self) -> bool {
        self.inner.painter.is_current()
    }

    /// Lock the display for a sequence of writes
    ///
    /// Returns `None` once the page is no longer current. Results of work
    /// that outlived the page are dropped that way.
    pub async fn display(&self) -> Option<DisplayGuard<'_>> {
        self.inner.painter.display().await
    }

    pub fn columns(&self) -> usize {
        self.inner.painter.panel.columns()
    }

    pub fn rows(&self) -> usize {
        self.inner.painter.panel.rows()
    }

    /// `text` truncated or padded to the display width
    pub fn pad(&self, text: &str) -> String {
        pad(text, self.columns())
    }

    pub fn refresh(&self) -> &RefreshTimer {
        &self.inner.refresh
    }

    pub fn schedule_refresh(&self, delay: Duration, auto_refresh: bool) {
        self.inner.refresh.schedule(delay, auto_refresh);
    }

    /// Animate a progress bar across the bottom row
    pub fn show_progress(&self, duration: Duration) -> Result<()> {
        self.show_progress_span(
            0,
            self.columns().saturating_sub(1),
            duration,
            DEFAULT_PROGRESS_DELAY,
        )
    }

    /// Animate a progress bar over columns `start..=finish` of the bottom row
    pub fn show_progress_span(
        &self,
        start: usize,
        finish: usize,
        duration: Duration,
        delay: Duration,
    ) -> Result<()> {
        let plan = ProgressPlan::new(start, finish, duration, delay)?;
        trace!(
            "Page '{}' progress over columns {}..={} for {:?}",
            self.page(),
            start,
            finish,
            duration
        );
        self.inner.progress.start(plan, self.inner.painter.clone());
        Ok(())
    }

    pub fn stop_progress(&self) {
        self.inner.progress.stop();
    }

    pub fn progress_running(&self) -> bool {
        self.inner.progress.is_running()
    }

    pub fn shell(&self) -> &ShellHandle {
        &self.inner.shell
    }

    pub fn open_page(&self, page: Arc<dyn Page>) -> Result<()> {
        self.inner.shell.open_page(page)
    }

    pub fn close_page(&self) -> Result<()> {
        self.inner.shell.close_page()
    }

    pub fn return_home(&self) -> Result<()> {
        self.inner.shell.return_home()
    }

    /// Close this page, drop the rest of the stack and open `page` alone
    pub fn replace_stack(&self, page: Arc<dyn Page>) -> Result<()> {
        self.inner.shell.replace_stack(page)
    }

    pub(crate) fn stop_timers(&self) {
        self.inner.refresh.stop();
        self.inner.progress.stop();
    }
}

/// Run one page hook, logging failures and panics
pub(crate) async fn guarded<T, F>(page: PageId, hook: &str, future: F) -> Option<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!("Page '{}' {} handler failed: {:#}", page, hook, e);
            None
        }
        Err(panic) => {
            error!(
                "Page '{}' {} handler panicked: {}",
                page,
                hook,
                panic_message(panic.as_ref())
            );
            None
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Refresh loop of one page
///
/// Lives for as long as the shell. Sleeps through the current schedule,
/// restarts whenever the schedule changes, and fires only while the page is
/// current.
pub(crate) async fn drive_refresh(page: Arc<dyn Page>, ctx: PageContext) {
    let mut schedule = ctx.refresh().subscribe();

    loop {
        let armed = *schedule.borrow_and_update();
        let Some(delay) = armed.delay else {
            if schedule.changed().await.is_err() {
                return;
            }
            continue;
        };

        tokio::select! {
            changed = schedule.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let Some(generation) = ctx.refresh().disarm_if(armed.generation) else {
            continue;
        };
        if !ctx.is_current() {
            trace!("Refresh of page '{}' skipped, not current", page.name());
            continue;
        }

        trace!("Refreshing page '{}'", page.name());
        guarded(page.name(), "refresh", page.on_refresh(&ctx)).await;
        ctx.refresh().rearm(generation);
    }
}
