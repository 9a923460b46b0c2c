//! Test utilities for tpi-panel
//!
//! Helpers shared by the unit and integration tests of every crate.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let value = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
//! assert_eq!(value, 42);
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async operation with a timeout
///
/// Prevents a misbehaving test from hanging the whole suite.
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

/// Poll `condition` every few milliseconds until it holds or `duration` elapses
///
/// Returns whether the condition was observed.
pub async fn wait_until<F>(duration: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
