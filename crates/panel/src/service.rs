//! Systemd service integration
//!
//! The headless panel runs as a `Type=notify` unit. Readiness is reported
//! once the page stack is running, the status line follows the page on
//! top, and watchdog keepalives are sent when `WatchdogSec` is set.

use anyhow::{Context, Result};
use std::env;
use std::os::unix::net::UnixDatagram;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

fn send(message: &str) -> Result<bool> {
    let Ok(socket_path) = env::var("NOTIFY_SOCKET") else {
        return Ok(false);
    };
    let socket = UnixDatagram::unbound().context("Failed to create Unix socket")?;
    socket
        .send_to(message.as_bytes(), &socket_path)
        .with_context(|| format!("Failed to send {} notification to systemd", message))?;
    Ok(true)
}

/// Notify systemd that the panel is up and showing pages
pub fn notify_ready() -> Result<()> {
    if send("READY=1")? {
        info!("Notified systemd: service ready");
    } else {
        debug!("NOTIFY_SOCKET not set, skipping systemd notification");
    }
    Ok(())
}

/// Notify systemd that the shutdown sequence has started
pub fn notify_stopping() -> Result<()> {
    if send("STOPPING=1")? {
        info!("Notified systemd: service stopping");
    } else {
        debug!("NOTIFY_SOCKET not set, skipping systemd notification");
    }
    Ok(())
}

/// Send watchdog keepalive to systemd
pub fn notify_watchdog() -> Result<()> {
    if send("WATCHDOG=1")? {
        debug!("Notified systemd: watchdog keepalive");
    }
    Ok(())
}

/// Status line shown by `systemctl status`
pub fn notify_status(status: &str) -> Result<()> {
    if send(&format!("STATUS={}", status))? {
        debug!("Notified systemd: status = {}", status);
    }
    Ok(())
}

/// Get the watchdog timeout configured by systemd (in microseconds)
pub fn get_watchdog_timeout() -> Option<u64> {
    env::var("WATCHDOG_USEC").ok().and_then(|s| s.parse().ok())
}

pub fn is_systemd() -> bool {
    env::var("NOTIFY_SOCKET").is_ok()
}

/// Keepalive period for a watchdog timeout: half of it, at least one second
fn watchdog_interval(timeout_usec: u64) -> Duration {
    Duration::from_secs((timeout_usec / 1_000_000 / 2).max(1))
}

/// Spawn the keepalive task, or `None` when the watchdog is not enabled
pub fn spawn_watchdog_task() -> Option<JoinHandle<()>> {
    let Some(timeout_usec) = get_watchdog_timeout() else {
        debug!("Systemd watchdog not enabled, skipping watchdog task");
        return None;
    };
    let interval = watchdog_interval(timeout_usec);

    info!(
        "Systemd watchdog enabled, interval: {}s (timeout: {}s)",
        interval.as_secs(),
        timeout_usec / 1_000_000
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = notify_watchdog() {
                error!("Failed to send watchdog keepalive: {:#}", e);
            }
        }
    }))
}
