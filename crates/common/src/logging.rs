//! Logging setup and configuration

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Setup tracing subscriber writing to stderr
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = build_filter(default_level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}

/// Setup tracing subscriber appending to a log file
///
/// Used when the terminal is owned by the display simulator and stderr
/// output would corrupt the screen.
pub fn setup_file_logging(default_level: &str, path: &Path) -> crate::Result<()> {
    let filter = build_filter(default_level)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Failed to install subscriber: {}", e)))?;

    Ok(())
}

/// Default location of the log file used by [`setup_file_logging`]
pub fn default_log_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        data_dir.join("tpi-panel").join("panel.log")
    } else {
        PathBuf::from("/var/log/tpi-panel/panel.log")
    }
}

fn build_filter(default_level: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(build_filter(level).is_ok(), "level {level} rejected");
        }
    }

    #[test]
    fn test_default_log_path_file_name() {
        let path = default_log_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("panel.log"));
    }

    #[test]
    fn test_file_logging_creates_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("panel.log");

        setup_file_logging("info", &path).unwrap();
        tracing::info!("file logging ready");

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("file logging ready"));

        // Only one subscriber per process
        assert!(setup_file_logging("info", &path).is_err());
    }
}
