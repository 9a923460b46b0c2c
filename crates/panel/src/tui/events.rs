//! TUI event handling
//!
//! Terminal key presses stand in for the three panel buttons. Crossterm is
//! polled on the blocking pool and its events are forwarded on a channel,
//! interleaved with ticks that drive button timing and redraws.

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;
use ui::Button;

/// Terminal event types
#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
    /// Terminal resize event
    Resize,
    Tick,
}

/// User actions derived from keyboard input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Press a panel button, holding it down past the hold time if `hold`
    Button { button: Button, hold: bool },
    None,
}

impl From<KeyEvent> for Action {
    fn from(key: KeyEvent) -> Self {
        let shifted = key.modifiers.contains(KeyModifiers::SHIFT);
        let button = |button, hold| Action::Button { button, hold };

        match key.code {
            KeyCode::Char('q') => Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,

            KeyCode::Left | KeyCode::Char('a') => button(Button::Left, shifted),
            KeyCode::Right | KeyCode::Char('d') => button(Button::Right, shifted),
            KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('s') => {
                button(Button::Action, shifted)
            }
            KeyCode::Char('A') => button(Button::Left, true),
            KeyCode::Char('D') => button(Button::Right, true),
            KeyCode::Char('S') => button(Button::Action, true),

            _ => Action::None,
        }
    }
}

/// Event handler that polls terminal events in a background task
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::task::spawn_blocking(move || {
            let mut last_tick = std::time::Instant::now();

            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::ZERO);

                if event::poll(timeout).unwrap_or(false) {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            tx.send(Event::Key(key))
                        }
                        Ok(CrosstermEvent::Resize(_, _)) => tx.send(Event::Resize),
                        Ok(_) => Ok(()),
                        Err(_) => break,
                    };
                    if forwarded.is_err() {
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = std::time::Instant::now();
                }
            }
        });

        Self { rx }
    }

    /// Receive the next event, `None` once the poller has stopped
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Action {
        Action::from(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn test_action_from_key_quit() {
        assert_eq!(key(KeyCode::Char('q'), KeyModifiers::NONE), Action::Quit);
        assert_eq!(key(KeyCode::Char('c'), KeyModifiers::CONTROL), Action::Quit);
    }

    #[test]
    fn test_action_from_key_buttons() {
        assert_eq!(
            key(KeyCode::Left, KeyModifiers::NONE),
            Action::Button {
                button: Button::Left,
                hold: false
            }
        );
        assert_eq!(
            key(KeyCode::Char('d'), KeyModifiers::NONE),
            Action::Button {
                button: Button::Right,
                hold: false
            }
        );
        assert_eq!(
            key(KeyCode::Enter, KeyModifiers::NONE),
            Action::Button {
                button: Button::Action,
                hold: false
            }
        );
    }

    #[test]
    fn test_action_from_key_holds() {
        assert_eq!(
            key(KeyCode::Left, KeyModifiers::SHIFT),
            Action::Button {
                button: Button::Left,
                hold: true
            }
        );
        assert_eq!(
            key(KeyCode::Char('S'), KeyModifiers::SHIFT),
            Action::Button {
                button: Button::Action,
                hold: true
            }
        );
    }

    #[test]
    fn test_unmapped_key() {
        assert_eq!(key(KeyCode::Char('x'), KeyModifiers::NONE), Action::None);
        assert_eq!(key(KeyCode::Char('c'), KeyModifiers::NONE), Action::None);
    }
}
