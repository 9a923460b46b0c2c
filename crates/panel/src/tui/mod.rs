//! Terminal User Interface
//!
//! Simulates the panel's character display and buttons in a terminal.

pub mod app;
pub mod events;
pub mod ui;

pub use app::run;
