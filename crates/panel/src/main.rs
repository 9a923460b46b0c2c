//! tpi-panel
//!
//! Front panel for a Turing Pi cluster board. Shows node temperatures,
//! addresses and power state on a small character display and switches
//! nodes on and off from three buttons, all over SSH.

mod config;
mod pages;
mod service;
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use common::{setup_file_logging, setup_logging};
use config::{DisplayInterface, PanelConfig};
use pages::Cluster;
use remote::ConnectionPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};
use ui::{Backlight, InputRouter, MemoryDisplay, PageId, Panel, Shell, ShellHandle};

/// How often the headless panel traces what is on screen
const SCREEN_TRACE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "tpi-panel")]
#[command(
    author,
    version,
    about = "Turing Pi panel - Cluster status and power control on a character display"
)]
#[command(long_about = "
Front panel for a Turing Pi cluster board. Talks to every node and to the
board management controller over SSH and drives a page based interface on
a small character display with three buttons.

Without a display attached the panel is simulated in the terminal: the
arrow keys and Enter stand in for the left, right and action buttons.

EXAMPLES:
    # Run the panel in the terminal with the default config
    tpi-panel

    # Run with a custom config
    tpi-panel --config /path/to/panel.toml

    # Print the cluster status as JSON and exit
    tpi-panel --status

    # Run as systemd service (no terminal display)
    tpi-panel --service

    # Run with debug logging
    tpi-panel --log-level debug

CONFIGURATION:
    The panel looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/tpi-panel/panel.toml
    3. /etc/tpi-panel/panel.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Print the loaded configuration with secrets masked and exit
    #[arg(long)]
    show_config: bool,

    /// Query every node and the carrier, print the status as JSON and exit
    #[arg(long)]
    status: bool,

    /// Run as systemd service (no terminal display)
    #[arg(long)]
    service: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// The running page stack and the handles to drive it
struct Engine {
    display: MemoryDisplay,
    handle: ShellHandle,
    current: watch::Receiver<Option<PageId>>,
    router: InputRouter,
    task: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = PanelConfig::default();
        let path = PanelConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        PanelConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        PanelConfig::load_or_default()
    };

    if args.show_config {
        print!("{}", config.redacted().to_toml()?);
        return Ok(());
    }

    // Use CLI log level if specified, otherwise use config value
    let log_level = args.log_level.as_deref().unwrap_or(&config.panel.log_level);

    let service_mode = args.service
        || config.panel.service_mode
        || config.display.interface == DisplayInterface::Headless;

    // The terminal display owns the screen, so its logs go to a file
    if service_mode || args.status {
        setup_logging(log_level).context("Failed to setup logging")?;
    } else {
        let path = common::logging::default_log_path();
        setup_file_logging(log_level, &path).context("Failed to setup logging")?;
    }

    info!("tpi-panel v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let pool = Arc::new(ConnectionPool::ssh());
    let cluster = Cluster::new(
        Arc::clone(&pool),
        config.carrier.clone(),
        config.nodes.clone(),
    );

    let result = if args.status {
        status_mode(&cluster).await
    } else {
        let engine = start_engine(&config, cluster).await;
        let handle = engine.handle.clone();

        let result = if service_mode {
            info!("Running in service mode (headless)");
            run_service(&engine).await
        } else {
            info!("Running in TUI mode (interactive)");
            tui::run(
                engine.display.clone(),
                engine.router.clone(),
                engine.current.clone(),
                &config.buttons,
            )
            .await
        };

        if let Err(e) = handle.shutdown() {
            warn!("Page stack already stopped: {}", e);
        }
        if let Err(e) = engine.task.await {
            error!("Page stack task failed: {}", e);
        }
        result
    };

    info!("Closing SSH sessions...");
    pool.shutdown().await;

    result
}

/// Print a one-shot cluster status report
async fn status_mode(cluster: &Cluster) -> Result<()> {
    info!("Collecting cluster status...");
    cluster.connect().await;
    let status = cluster.status().await;
    let json = serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
    println!("{}", json);
    Ok(())
}

/// Start the page stack on an in-memory display and open the splash page
async fn start_engine(config: &PanelConfig, cluster: Cluster) -> Engine {
    let display = MemoryDisplay::new(config.display.columns, config.display.rows);
    let panel = Panel::new(display.clone());

    let shell = Shell::with_refresh_interval(panel.clone(), config.panel.refresh_interval);
    let handle = shell.handle();
    let current = shell.watch_current();

    let backlight = Backlight::start(panel, Some(config.display.backlight_timeout)).await;
    let router = InputRouter::new(handle.clone(), Some(backlight));

    let task = tokio::spawn(shell.run());
    if let Err(e) = handle.open_page(pages::build(cluster)) {
        error!("Failed to open the first page: {}", e);
    }

    Engine {
        display,
        handle,
        current,
        router,
        task,
    }
}

/// Run in service mode (headless, systemd-compatible)
async fn run_service(engine: &Engine) -> Result<()> {
    info!("Starting panel in service mode");

    if service::is_systemd() {
        info!("Running under systemd");
    }

    let watchdog_handle = service::spawn_watchdog_task();

    service::notify_ready().context("Failed to notify systemd ready")?;
    service::notify_status("Starting").context("Failed to send status to systemd")?;

    info!("Press Ctrl+C to shutdown");

    let mut current = engine.current.clone();
    let mut screen = tokio::time::interval(SCREEN_TRACE_INTERVAL);

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }

            changed = current.changed() => {
                if changed.is_err() {
                    warn!("Page stack stopped");
                    break;
                }
                let page = *current.borrow_and_update();
                if let Some(page) = page
                    && let Err(e) = service::notify_status(&format!("Showing {}", page))
                {
                    warn!("Failed to send status to systemd: {:#}", e);
                }
            }

            _ = screen.tick() => {
                trace!(screen = ?engine.display.preview(), "Panel");
            }
        }
    }

    service::notify_stopping().context("Failed to notify systemd stopping")?;

    if let Some(handle) = watchdog_handle {
        handle.abort();
    }

    info!("Panel shutdown complete");
    Ok(())
}
