//! TUI application state
//!
//! The terminal shows the in-memory character grid the pages paint on. Key
//! presses become button levels fed through the same [`PressDetector`]s a
//! GPIO driver would use, so debounce, double press and hold behave as on
//! the real panel.

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use ui::{Button, ButtonEvent, InputRouter, MemoryDisplay, PageId, PressDetector};

use super::events::{Action, Event, EventHandler};
use super::ui::render;
use crate::config::ButtonSettings;

/// Extra time a simulated press stays down past the debounce window
const PRESS_MARGIN: Duration = Duration::from_millis(30);
/// Extra time a simulated hold stays down past the hold window
const HOLD_MARGIN: Duration = Duration::from_millis(50);

const TICK_RATE: Duration = Duration::from_millis(20);

/// One button driven by key presses
#[derive(Debug)]
struct KeyButton {
    detector: PressDetector,
    release_at: Option<Instant>,
}

/// The three panel buttons, pressed and released from the keyboard
///
/// A key press pushes the button down and schedules its release; the
/// release and any hold are reported by [`Keypad::tick`].
#[derive(Debug)]
pub struct Keypad {
    buttons: Vec<KeyButton>,
}

impl Keypad {
    pub fn new(settings: &ButtonSettings) -> Self {
        let buttons = [
            (Button::Left, &settings.left),
            (Button::Right, &settings.right),
            (Button::Action, &settings.action),
        ]
        .into_iter()
        .map(|(button, config)| KeyButton {
            detector: PressDetector::new(button, config.timing()),
            release_at: None,
        })
        .collect();

        Self { buttons }
    }

    fn find(&mut self, button: Button) -> Option<&mut KeyButton> {
        self.buttons
            .iter_mut()
            .find(|key| key.detector.button() == button)
    }

    /// Push `button` down, holding it past the hold window if `hold`
    ///
    /// Returns whether the button went down. Key repeats while it is still
    /// down and presses inside the debounce window are dropped.
    pub fn press(&mut self, button: Button, hold: bool, now: Instant) -> bool {
        let Some(key) = self.find(button) else {
            return false;
        };
        if key.detector.is_pressed() {
            return false;
        }

        // Pressing never reports an event, only releasing and holding do
        let _ = key.detector.edge(true, now);
        if !key.detector.is_pressed() {
            debug!("Key press on {} inside debounce window dropped", button);
            return false;
        }

        let timing = key.detector.timing();
        let down_for = if hold {
            timing.hold() + HOLD_MARGIN
        } else {
            timing.debounce() + PRESS_MARGIN
        };
        key.release_at = Some(now + down_for);
        true
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons
            .iter()
            .any(|key| key.detector.button() == button && key.detector.is_pressed())
    }

    /// Report holds that came due and release buttons whose time is up
    pub fn tick(&mut self, now: Instant) -> Vec<ButtonEvent> {
        let mut events = Vec::new();
        for key in self.buttons.iter_mut() {
            events.extend(key.detector.poll(now));

            if key.release_at.is_some_and(|at| at <= now) {
                key.release_at = None;
                events.extend(key.detector.edge(false, now));
            }
        }
        events
    }
}

/// Application state
pub struct App {
    display: MemoryDisplay,
    router: InputRouter,
    current: watch::Receiver<Option<PageId>>,
    keypad: Keypad,
    /// Most recent event handed to the shell
    last_event: Option<ButtonEvent>,
    should_quit: bool,
}

impl App {
    pub fn new(
        display: MemoryDisplay,
        router: InputRouter,
        current: watch::Receiver<Option<PageId>>,
        buttons: &ButtonSettings,
    ) -> Self {
        Self {
            display,
            router,
            current,
            keypad: Keypad::new(buttons),
            last_event: None,
            should_quit: false,
        }
    }

    pub fn display(&self) -> &MemoryDisplay {
        &self.display
    }

    pub fn current_page(&self) -> Option<PageId> {
        *self.current.borrow()
    }

    pub fn last_event(&self) -> Option<ButtonEvent> {
        self.last_event
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.keypad.is_pressed(button)
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn handle_action(&mut self, action: Action, now: Instant) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Button { button, hold } => {
                self.keypad.press(button, hold, now);
            }
            Action::None => {}
        }
    }

    /// Advance the keypad and hand its events to the shell
    pub async fn tick(&mut self, now: Instant) {
        for event in self.keypad.tick(now) {
            match self.router.dispatch(event).await {
                Ok(true) => self.last_event = Some(event),
                Ok(false) => debug!("{} woke the backlight", event),
                Err(e) => {
                    warn!("Shell is gone, stopping: {:#}", e);
                    self.should_quit = true;
                }
            }
        }
    }
}

/// Terminal wrapper for TUI
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    /// Create and initialize the terminal
    pub fn new() -> Result<Self> {
        let backend = CrosstermBackend::new(io::stdout());
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }

    /// Enter TUI mode (raw mode, alternate screen)
    pub fn enter(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        self.terminal.hide_cursor()?;
        self.terminal.clear()?;
        Ok(())
    }

    /// Exit TUI mode (restore terminal state)
    pub fn exit(&mut self) -> Result<()> {
        disable_raw_mode()?;
        execute!(io::stdout(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    pub fn draw(&mut self, app: &App) -> Result<()> {
        self.terminal.draw(|frame| {
            render(frame, app);
        })?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        // Best effort cleanup
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Run the display simulator until the user quits
pub async fn run(
    display: MemoryDisplay,
    router: InputRouter,
    current: watch::Receiver<Option<PageId>>,
    buttons: &ButtonSettings,
) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.enter()?;

    let mut page_changes = current.clone();
    let mut app = App::new(display, router, current, buttons);
    let mut events = EventHandler::new(TICK_RATE);

    loop {
        if let Err(e) = tui.draw(&app) {
            warn!("Failed to draw panel: {:#}", e);
            break;
        }

        tokio::select! {
            event = events.next() => {
                match event {
                    Some(Event::Key(key)) => app.handle_action(Action::from(key), Instant::now()),
                    Some(Event::Resize) => {
                        // Handled by ratatui on the next draw
                    }
                    Some(Event::Tick) => app.tick(Instant::now()).await,
                    None => break,
                }
            }

            Ok(()) = page_changes.changed() => {
                if let Some(page) = *page_changes.borrow_and_update() {
                    debug!("Showing {}", page);
                }
            }
        }

        if app.should_quit() {
            info!("Quit requested");
            break;
        }
    }

    tui.exit()?;
    Ok(())
}
