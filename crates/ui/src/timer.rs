//! Per-page refresh and progress timers
//!
//! The refresh timer is a one-shot schedule published on a watch channel.
//! Each page has a driver task (see [`crate::page`]) that sleeps until the
//! scheduled delay, disarms the timer, runs the page's refresh handler and
//! only then rearms, so firings for one page never overlap.
//!
//! Every change to the schedule bumps a generation counter. A rearm or
//! interval reset carries the generation it observed and is dropped if
//! anything rescheduled the timer in between.

use crate::display::Glyph;
use crate::error::{Result, UiError};
use crate::page::Painter;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// First refresh after a page is opened
pub const BOOTSTRAP_DELAY: Duration = Duration::from_millis(25);

/// Pause before the first visible progress step
pub const DEFAULT_PROGRESS_DELAY: Duration = Duration::from_millis(500);

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub generation: u64,
    /// `None` while disarmed
    pub delay: Option<Duration>,
    pub auto_refresh: bool,
}

pub struct RefreshTimer {
    schedule: watch::Sender<Schedule>,
    interval: Duration,
    default_auto_refresh: bool,
}

impl RefreshTimer {
    pub fn new(interval: Duration, auto_refresh: bool) -> Self {
        let (schedule, _) = watch::channel(Schedule {
            generation: 0,
            delay: None,
            auto_refresh,
        });
        Self {
            schedule,
            interval,
            default_auto_refresh: auto_refresh,
        }
    }

    /// Request the next refresh after `delay`; zero disables refreshing
    pub fn schedule(&self, delay: Duration, auto_refresh: bool) {
        self.schedule.send_modify(|s| {
            s.generation += 1;
            s.delay = (!delay.is_zero()).then_some(delay);
            s.auto_refresh = auto_refresh;
        });
        trace!("Refresh scheduled in {:?} (auto: {})", delay, auto_refresh);
    }

    /// Arm the bootstrap refresh of a freshly opened page
    pub fn start(&self) {
        self.schedule.send_modify(|s| {
            s.generation += 1;
            s.delay = Some(BOOTSTRAP_DELAY);
            s.auto_refresh = self.default_auto_refresh;
        });
    }

    pub fn stop(&self) {
        self.schedule.send_modify(|s| {
            s.generation += 1;
            s.delay = None;
        });
    }

    /// Disarm for a firing, provided the schedule is still `generation`
    pub(crate) fn disarm_if(&self, generation: u64) -> Option<u64> {
        let mut disarmed = None;
        self.schedule.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.generation += 1;
            s.delay = None;
            disarmed = Some(s.generation);
            true
        });
        disarmed
    }

    /// Rearm with the interval after a firing, unless the handler or a
    /// navigation already changed the schedule
    pub(crate) fn rearm(&self, generation: u64) {
        let interval = self.interval;
        self.schedule.send_if_modified(|s| {
            if s.generation != generation || !s.auto_refresh {
                return false;
            }
            s.generation += 1;
            s.delay = Some(interval);
            true
        });
    }

    /// Push an armed auto-refresh timer back to the full interval
    pub(crate) fn restart_interval(&self, generation: u64) {
        let interval = self.interval;
        self.schedule.send_if_modified(|s| {
            if s.generation != generation || !s.auto_refresh || s.delay.is_none() {
                return false;
            }
            s.generation += 1;
            s.delay = Some(interval);
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Schedule> {
        self.schedule.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.schedule.borrow().generation
    }

    pub fn next_delay(&self) -> Option<Duration> {
        self.schedule.borrow().delay
    }

    pub fn auto_refresh(&self) -> bool {
        self.schedule.borrow().auto_refresh
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Timing and layout of one progress animation
///
/// The bar advances half a column per step: each column first shows the
/// half glyph, then the full glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    min: usize,
    max: usize,
    interval: Duration,
    delay: Duration,
}

impl ProgressPlan {
    pub fn new(start: usize, finish: usize, duration: Duration, delay: Duration) -> Result<Self> {
        if duration < delay {
            return Err(UiError::InvalidProgress { duration, delay });
        }
        if finish < start {
            return Err(UiError::InvalidProgressSpan { start, finish });
        }

        let (min, max) = (start * 2, finish * 2);
        let steps = u32::try_from((max - min).max(1)).unwrap_or(u32::MAX);
        Ok(Self {
            min,
            max,
            interval: (duration - delay) / steps,
            delay,
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait before the background and first frame appear
    pub fn first_step(&self) -> Duration {
        if self.delay.is_zero() {
            self.interval
        } else {
            self.delay
        }
    }

    /// `(column, width)` of the background track
    pub fn background(&self) -> (usize, usize) {
        (self.min / 2, (self.max - self.min) / 2 + 1)
    }

    /// `(column, glyph)` for every step, in order
    pub fn frames(&self) -> impl Iterator<Item = (usize, Glyph)> + use<> {
        (self.min + 1..=self.max + 1).map(|counter| {
            let glyph = if counter % 2 == 0 {
                Glyph::ProgressHalf
            } else {
                Glyph::ProgressFull
            };
            (counter / 2, glyph)
        })
    }
}

/// Single progress animation of a page
///
/// Starting a new animation replaces the running one.
#[derive(Default)]
pub struct ProgressTimer {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTimer {
    pub(crate) fn start(&self, plan: ProgressPlan, painter: Painter) {
        let task = tokio::spawn(animate(plan, painter));
        if let Some(previous) = self.slot().replace(task) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(task) = self.slot().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(|task| !task.is_finished())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn animate(plan: ProgressPlan, painter: Painter) {
    let row = painter.rows().saturating_sub(1);
    tokio::time::sleep(plan.first_step()).await;

    {
        let Some(mut display) = painter.display().await else {
            return;
        };
        let (column, width) = plan.background();
        display.write_at(column, row, &Glyph::ProgressBackground.to_string().repeat(width));
    }

    for (step, (column, glyph)) in plan.frames().enumerate() {
        if step > 0 {
            tokio::time::sleep(plan.interval()).await;
        }
        let Some(mut display) = painter.display().await else {
            trace!("Progress of page '{}' stopped, page not current", painter.page());
            return;
        };
        display.write_at(column, row, &glyph.to_string());
    }
}
