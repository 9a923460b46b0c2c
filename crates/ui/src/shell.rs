//! Page stack and navigation
//!
//! The [`Shell`] runs as a single task that owns the stack. Pages, the input
//! router and the binary talk to it through a cloneable [`ShellHandle`]:
//! requests are queued and applied in order, so a callback that navigates
//! never re-enters the shell.

use crate::display::Panel;
use crate::error::{Result, UiError};
use crate::input::{Button, ButtonEvent};
use crate::page::{EventResult, Page, PageContext, PageId, drive_refresh, guarded};
use crate::timer::{DEFAULT_REFRESH_INTERVAL, RefreshTimer};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub enum ShellCommand {
    Open(Arc<dyn Page>),
    Close,
    ReturnHome,
    ClearStack,
    Replace(Arc<dyn Page>),
    Button(ButtonEvent),
    Shutdown,
}

impl fmt::Debug for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellCommand::Open(page) => write!(f, "Open({})", page.name()),
            ShellCommand::Close => write!(f, "Close"),
            ShellCommand::ReturnHome => write!(f, "ReturnHome"),
            ShellCommand::ClearStack => write!(f, "ClearStack"),
            ShellCommand::Replace(page) => write!(f, "Replace({})", page.name()),
            ShellCommand::Button(event) => write!(f, "Button({})", event),
            ShellCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Queue requests for the shell task
#[derive(Clone)]
pub struct ShellHandle {
    tx: mpsc::UnboundedSender<ShellCommand>,
}

impl ShellHandle {
    fn send(&self, command: ShellCommand) -> Result<()> {
        self.tx.send(command).map_err(|_| UiError::ShellClosed)
    }

    pub fn open_page(&self, page: Arc<dyn Page>) -> Result<()> {
        self.send(ShellCommand::Open(page))
    }

    pub fn close_page(&self) -> Result<()> {
        self.send(ShellCommand::Close)
    }

    pub fn return_home(&self) -> Result<()> {
        self.send(ShellCommand::ReturnHome)
    }

    pub fn clear_page_stack(&self) -> Result<()> {
        self.send(ShellCommand::ClearStack)
    }

    pub fn replace_stack(&self, page: Arc<dyn Page>) -> Result<()> {
        self.send(ShellCommand::Replace(page))
    }

    pub fn button(&self, event: ButtonEvent) -> Result<()> {
        self.send(ShellCommand::Button(event))
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(ShellCommand::Shutdown)
    }
}

#[derive(Clone)]
struct Entry {
    page: Arc<dyn Page>,
    ctx: PageContext,
}

impl Entry {
    fn name(&self) -> PageId {
        self.page.name()
    }

    /// Fire Opened, then arm the bootstrap refresh
    async fn activate(&self) {
        guarded(self.name(), "open", self.page.on_open(&self.ctx)).await;
        self.ctx.refresh().start();
    }

    /// Fire Closed and stop both timers
    async fn deactivate(&self) {
        self.ctx.stop_timers();
        guarded(self.name(), "close", self.page.on_close(&self.ctx)).await;
    }
}

/// Owner of the page stack
pub struct Shell {
    panel: Panel,
    refresh_interval: Duration,
    stack: Vec<Entry>,
    pages: HashMap<PageId, Entry>,
    drivers: Vec<JoinHandle<()>>,
    current: watch::Sender<Option<PageId>>,
    handle: ShellHandle,
    rx: Option<mpsc::UnboundedReceiver<ShellCommand>>,
}

impl Shell {
    pub fn new(panel: Panel) -> Self {
        Self::with_refresh_interval(panel, DEFAULT_REFRESH_INTERVAL)
    }

    /// `refresh_interval` is the rearm delay of auto-refreshing pages
    pub fn with_refresh_interval(panel: Panel, refresh_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (current, _) = watch::channel(None);
        Self {
            panel,
            refresh_interval,
            stack: Vec::new(),
            pages: HashMap::new(),
            drivers: Vec::new(),
            current,
            handle: ShellHandle { tx },
            rx: Some(rx),
        }
    }

    pub fn handle(&self) -> ShellHandle {
        self.handle.clone()
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn current_page(&self) -> Option<PageId> {
        self.stack.last().map(Entry::name)
    }

    /// Page names from the bottom of the stack to the top
    pub fn stack(&self) -> Vec<PageId> {
        self.stack.iter().map(Entry::name).collect()
    }

    /// Follow which page is on top
    pub fn watch_current(&self) -> watch::Receiver<Option<PageId>> {
        self.current.subscribe()
    }

    /// Context of a page that has been opened at least once
    pub fn context(&self, page: PageId) -> Option<PageContext> {
        self.pages.get(page).map(|entry| entry.ctx.clone())
    }

    fn entry(&mut self, page: Arc<dyn Page>) -> Entry {
        if let Some(entry) = self.pages.get(page.name()) {
            return entry.clone();
        }

        let refresh = RefreshTimer::new(self.refresh_interval, page.auto_refresh());
        let ctx = PageContext::new(
            page.name(),
            self.panel.clone(),
            self.current.subscribe(),
            self.handle.clone(),
            refresh,
        );
        self.drivers
            .push(tokio::spawn(drive_refresh(page.clone(), ctx.clone())));

        let entry = Entry { page, ctx };
        self.pages.insert(entry.name(), entry.clone());
        entry
    }

    fn publish(&self) {
        self.current.send_replace(self.current_page());
    }

    pub async fn open_page(&mut self, page: Arc<dyn Page>) {
        let entry = self.entry(page);
        if self.stack.iter().any(|open| open.name() == entry.name()) {
            warn!("Page '{}' is already on the stack", entry.name());
        }
        self.stack.push(entry.clone());
        self.publish();
        entry.activate().await;
        debug!(
            "Opened page '{}'. Pages in stack: {}",
            entry.name(),
            self.stack.len()
        );
    }

    /// Close the top page and re-open the one below it
    ///
    /// The bottom page is never closed this way.
    pub async fn close_page(&mut self) {
        if self.stack.len() <= 1 {
            warn!("Ignoring request to close the last page on the stack");
            return;
        }
        let Some(closed) = self.stack.pop() else {
            return;
        };
        self.publish();
        closed.deactivate().await;
        debug!(
            "Closed page '{}'. Pages in stack: {}",
            closed.name(),
            self.stack.len()
        );

        if let Some(resumed) = self.stack.last().cloned() {
            resumed.activate().await;
        }
    }

    /// Close the top page, discard all but the bottom one, re-open the bottom
    pub async fn return_home(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        let Some(closed) = self.stack.pop() else {
            return;
        };
        let discarded = self.stack.split_off(1);
        self.publish();

        closed.deactivate().await;
        for entry in &discarded {
            entry.ctx.stop_timers();
        }

        if let Some(home) = self.stack.last().cloned() {
            home.activate().await;
            debug!("Returned to page '{}'", home.name());
        }
    }

    /// Close the top page and discard the rest, leaving the stack empty
    pub async fn clear_page_stack(&mut self) {
        let Some(closed) = self.stack.pop() else {
            return;
        };
        let discarded = std::mem::take(&mut self.stack);
        self.publish();

        closed.deactivate().await;
        for entry in &discarded {
            entry.ctx.stop_timers();
        }
        debug!("Cleared page stack");
    }

    pub async fn replace_stack(&mut self, page: Arc<dyn Page>) {
        self.clear_page_stack().await;
        self.open_page(page).await;
    }

    /// Route a button event to the top page
    ///
    /// A hold of the left button always returns home.
    pub async fn handle_button(&mut self, event: ButtonEvent) {
        if event == ButtonEvent::hold(Button::Left) {
            self.return_home().await;
            return;
        }
        let Some(entry) = self.stack.last().cloned() else {
            return;
        };

        let generation = entry.ctx.refresh().generation();
        let result = guarded(entry.name(), "button", entry.page.on_button(&entry.ctx, event)).await;
        if result == Some(EventResult::Handled) {
            entry.ctx.refresh().restart_interval(generation);
        }
    }

    /// Apply one command, returning `false` on shutdown
    pub async fn dispatch(&mut self, command: ShellCommand) -> bool {
        match command {
            ShellCommand::Open(page) => self.open_page(page).await,
            ShellCommand::Close => self.close_page().await,
            ShellCommand::ReturnHome => self.return_home().await,
            ShellCommand::ClearStack => self.clear_page_stack().await,
            ShellCommand::Replace(page) => self.replace_stack(page).await,
            ShellCommand::Button(event) => self.handle_button(event).await,
            ShellCommand::Shutdown => return false,
        }
        true
    }

    /// Apply queued commands until shutdown
    pub async fn run(mut self) {
        let Some(mut rx) = self.rx.take() else {
            warn!("Shell is already running");
            return;
        };

        while let Some(command) = rx.recv().await {
            if !self.dispatch(command).await {
                break;
            }
        }

        self.shutdown().await;
    }

    /// Apply every command queued so far; used by tests and single-step hosts
    pub async fn run_pending(&mut self) -> bool {
        let Some(mut rx) = self.rx.take() else {
            return true;
        };
        let mut running = true;
        while let Ok(command) = rx.try_recv() {
            if !self.dispatch(command).await {
                running = false;
                break;
            }
        }
        self.rx = Some(rx);
        running
    }

    async fn shutdown(&mut self) {
        if let Some(top) = self.stack.pop() {
            top.deactivate().await;
        }
        for entry in self.stack.drain(..) {
            entry.ctx.stop_timers();
        }
        self.publish();
        info!("Shell stopped");
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        for driver in &self.drivers {
            driver.abort();
        }
    }
}
