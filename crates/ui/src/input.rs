//! Button input
//!
//! Raw button levels are turned into [`ButtonEvent`]s by a [`PressDetector`]
//! per button. The [`InputRouter`] gates them through the [`Backlight`] and
//! queues them for the shell.

use crate::display::Panel;
use crate::error::Result;
use crate::shell::ShellHandle;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Left,
    Right,
    Action,
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Button::Left => write!(f, "left"),
            Button::Right => write!(f, "right"),
            Button::Action => write!(f, "action"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressKind {
    Press,
    DoublePress,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEvent {
    pub button: Button,
    pub kind: PressKind,
}

impl ButtonEvent {
    pub fn new(button: Button, kind: PressKind) -> Self {
        Self { button, kind }
    }

    pub fn press(button: Button) -> Self {
        Self::new(button, PressKind::Press)
    }

    pub fn double_press(button: Button) -> Self {
        Self::new(button, PressKind::DoublePress)
    }

    pub fn hold(button: Button) -> Self {
        Self::new(button, PressKind::Hold)
    }
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.button, self.kind)
    }
}

/// Debounce, double-press and hold windows of one button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonTiming {
    debounce: Duration,
    double_press: Duration,
    hold: Duration,
}

impl ButtonTiming {
    /// The double-press window must be at least three debounce windows,
    /// shorter values are widened.
    pub fn new(debounce: Duration, double_press: Duration, hold: Duration) -> Self {
        let minimum = debounce * 3;
        let double_press = if double_press < minimum {
            warn!(
                "Double press window {:?} is shorter than 3x debounce {:?}, using {:?}",
                double_press, debounce, minimum
            );
            minimum
        } else {
            double_press
        };

        Self {
            debounce,
            double_press,
            hold,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    pub fn double_press(&self) -> Duration {
        self.double_press
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(250),
            Duration::from_millis(750),
            Duration::from_millis(3000),
        )
    }
}

/// Edge-driven state machine for a single button
///
/// A press is reported on release unless a hold already fired for it. A
/// second release inside the double-press window also reports a double
/// press. Holds are reported by [`PressDetector::poll`] while the button is
/// still down.
#[derive(Debug)]
pub struct PressDetector {
    button: Button,
    timing: ButtonTiming,
    pressed: bool,
    pressed_at: Option<Instant>,
    last_edge: Option<Instant>,
    last_press: Option<Instant>,
    hold_fired: bool,
}

impl PressDetector {
    pub fn new(button: Button, timing: ButtonTiming) -> Self {
        Self {
            button,
            timing,
            pressed: false,
            pressed_at: None,
            last_edge: None,
            last_press: None,
            hold_fired: false,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    pub fn timing(&self) -> ButtonTiming {
        self.timing
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Feed a level change
    pub fn edge(&mut self, pressed: bool, now: Instant) -> Vec<ButtonEvent> {
        if pressed == self.pressed {
            return Vec::new();
        }
        if let Some(last) = self.last_edge
            && now.saturating_duration_since(last) < self.timing.debounce
        {
            trace!("Bounce on {} button ignored", self.button);
            return Vec::new();
        }
        self.last_edge = Some(now);
        self.pressed = pressed;

        if pressed {
            self.pressed_at = Some(now);
            self.hold_fired = false;
            return Vec::new();
        }

        self.pressed_at = None;
        if self.hold_fired {
            self.hold_fired = false;
            return Vec::new();
        }

        let mut events = vec![ButtonEvent::press(self.button)];
        match self.last_press {
            Some(last) if now.saturating_duration_since(last) <= self.timing.double_press => {
                events.push(ButtonEvent::double_press(self.button));
                self.last_press = None;
            }
            _ => self.last_press = Some(now),
        }
        events
    }

    /// Report a hold once the button has been down for the hold window
    pub fn poll(&mut self, now: Instant) -> Option<ButtonEvent> {
        let deadline = self.next_deadline()?;
        if now < deadline {
            return None;
        }
        self.hold_fired = true;
        self.last_press = None;
        Some(ButtonEvent::hold(self.button))
    }

    /// When [`PressDetector::poll`] should next be called
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.pressed_at {
            Some(at) if self.pressed && !self.hold_fired => Some(at + self.timing.hold),
            _ => None,
        }
    }
}

/// Backlight with an inactivity timeout
///
/// Clones share state. The timeout task holds only weak references and ends
/// with the last clone.
#[derive(Clone)]
pub struct Backlight {
    inner: Arc<BacklightInner>,
}

struct BacklightInner {
    panel: Panel,
    on: Mutex<bool>,
    activity: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl Drop for BacklightInner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Backlight {
    /// Switch the backlight on; `timeout` of `None` keeps it on forever
    pub async fn start(panel: Panel, timeout: Option<Duration>) -> Self {
        panel.set_backlight(true).await;

        let activity = Arc::new(Notify::new());
        let inner = Arc::new_cyclic(|weak: &Weak<BacklightInner>| {
            let task = timeout
                .filter(|timeout| !timeout.is_zero())
                .map(|timeout| tokio::spawn(run_timeout(weak.clone(), activity.clone(), timeout)));
            BacklightInner {
                panel,
                on: Mutex::new(true),
                activity,
                task,
            }
        });

        Self { inner }
    }

    /// Switch the backlight on, returning whether it was off
    pub async fn wake(&self) -> bool {
        let mut on = self.inner.on.lock().await;
        self.inner.activity.notify_one();
        if *on {
            return false;
        }
        *on = true;
        self.inner.panel.set_backlight(true).await;
        debug!("Backlight woken");
        true
    }

    /// Restart the inactivity timeout
    pub fn reset_timeout(&self) {
        self.inner.activity.notify_one();
    }

    pub async fn is_on(&self) -> bool {
        *self.inner.on.lock().await
    }
}

async fn run_timeout(backlight: Weak<BacklightInner>, activity: Arc<Notify>, timeout: Duration) {
    loop {
        tokio::select! {
            _ = activity.notified() => continue,
            _ = tokio::time::sleep(timeout) => {}
        }

        {
            let Some(inner) = backlight.upgrade() else {
                return;
            };
            let mut on = inner.on.lock().await;
            if *on {
                *on = false;
                inner.panel.set_backlight(false).await;
                debug!("Backlight off after {:?} without input", timeout);
            }
        }

        activity.notified().await;
    }
}

/// Entry point for button events
#[derive(Clone)]
pub struct InputRouter {
    shell: ShellHandle,
    backlight: Option<Backlight>,
}

impl InputRouter {
    pub fn new(shell: ShellHandle, backlight: Option<Backlight>) -> Self {
        Self { shell, backlight }
    }

    /// Forward an event to the shell
    ///
    /// Returns `false` when the event was consumed by waking the backlight.
    /// Any kind of event can wake it, holds included.
    pub async fn dispatch(&self, event: ButtonEvent) -> Result<bool> {
        if let Some(backlight) = &self.backlight
            && backlight.wake().await
        {
            debug!("Swallowed {} used to wake the backlight", event);
            return Ok(false);
        }

        trace!("Dispatching {}", event);
        self.shell.button(event)?;
        Ok(true)
    }
}
