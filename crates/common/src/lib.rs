//! Common utilities for tpi-panel
//!
//! This crate provides functionality shared by the remote execution layer,
//! the page engine and the panel binary: error handling, logging setup,
//! human readable durations for configuration files and test helpers.

pub mod duration;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::{setup_file_logging, setup_logging};
