//! Page engine error types

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("progress duration {duration:?} is shorter than its delay {delay:?}")]
    InvalidProgress { duration: Duration, delay: Duration },

    #[error("progress span {start}..={finish} runs backwards")]
    InvalidProgressSpan { start: usize, finish: usize },

    #[error("shell is no longer running")]
    ShellClosed,
}

pub type Result<T> = std::result::Result<T, UiError>;
