//! Page engine for small character displays
//!
//! A stack of [`Page`]s is driven by the [`Shell`]: button events go to the
//! page on top, every page owns a refresh timer and a progress timer, and
//! only the page on top may paint. [`Menu`] adds a scrollable list of
//! items on top of the same capability trait.
//!
//! Hardware is reached through two capabilities: [`Display`] for output and
//! [`ButtonEvent`]s fed to an [`InputRouter`] for input.

pub mod display;
pub mod error;
pub mod input;
pub mod menu;
pub mod page;
pub mod shell;
pub mod timer;

pub use display::{CharacterSet, Display, Glyph, MemoryDisplay, Panel};
pub use error::{Result, UiError};
pub use input::{
    Backlight, Button, ButtonEvent, ButtonTiming, InputRouter, PressDetector, PressKind,
};
pub use menu::{Menu, MenuItem, MenuPage};
pub use page::{EventResult, Page, PageContext, PageId};
pub use shell::{Shell, ShellCommand, ShellHandle};
pub use timer::{BOOTSTRAP_DELAY, DEFAULT_PROGRESS_DELAY, ProgressPlan};
