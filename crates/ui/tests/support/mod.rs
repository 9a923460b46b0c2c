//! Recording page used by the shell and timer tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ui::{ButtonEvent, EventResult, MemoryDisplay, Page, PageContext, PageId, Panel, Shell};

/// Shared, ordered log of lifecycle events
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

pub struct Recorder {
    name: PageId,
    log: Log,
    auto_refresh: bool,
    button_result: EventResult,
    fail_open: bool,
    panic_close: bool,
    open_on_button: Option<Arc<dyn Page>>,
    reschedule: Option<Duration>,
}

impl Recorder {
    pub fn new(name: PageId, log: &Log) -> Self {
        Self {
            name,
            log: log.clone(),
            auto_refresh: true,
            button_result: EventResult::Handled,
            fail_open: false,
            panic_close: false,
            open_on_button: None,
            reschedule: None,
        }
    }

    pub fn manual(mut self) -> Self {
        self.auto_refresh = false;
        self
    }

    pub fn ignoring_buttons(mut self) -> Self {
        self.button_result = EventResult::Ignored;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn panicking_close(mut self) -> Self {
        self.panic_close = true;
        self
    }

    pub fn opening_on_button(mut self, page: Arc<dyn Page>) -> Self {
        self.open_on_button = Some(page);
        self
    }

    /// Ask for a manual refresh after every refresh
    pub fn rescheduling(mut self, delay: Duration) -> Self {
        self.reschedule = Some(delay);
        self
    }

    pub fn build(self) -> Arc<dyn Page> {
        Arc::new(self)
    }
}

#[async_trait]
impl Page for Recorder {
    fn name(&self) -> PageId {
        self.name
    }

    fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    async fn on_open(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:open", self.name));
        if let Some(mut display) = ctx.display().await {
            display.clear();
            display.write_at(0, 0, self.name);
        }
        if self.fail_open {
            anyhow::bail!("open failed");
        }
        Ok(())
    }

    async fn on_close(&self, _ctx: &PageContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:close", self.name));
        if self.panic_close {
            panic!("close exploded");
        }
        Ok(())
    }

    async fn on_refresh(&self, ctx: &PageContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:refresh", self.name));
        if let Some(delay) = self.reschedule {
            ctx.schedule_refresh(delay, false);
        }
        Ok(())
    }

    async fn on_button(&self, ctx: &PageContext, event: ButtonEvent) -> anyhow::Result<EventResult> {
        self.log.push(format!("{}:button:{}", self.name, event));
        if let Some(page) = &self.open_on_button {
            ctx.open_page(page.clone())?;
        }
        Ok(self.button_result)
    }
}

pub fn shell(columns: usize, rows: usize, interval: Duration) -> (Shell, MemoryDisplay) {
    let display = MemoryDisplay::new(columns, rows);
    let shell = Shell::with_refresh_interval(Panel::new(display.clone()), interval);
    (shell, display)
}
