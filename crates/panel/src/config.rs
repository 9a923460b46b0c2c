//! Panel configuration management

use anyhow::{Context, Result, anyhow};
use remote::Node;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ui::ButtonTiming;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Narrowest display the pages can lay out on
const MIN_COLUMNS: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub panel: PanelSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub buttons: ButtonSettings,
    /// The cluster carrier's management controller
    #[serde(default = "PanelConfig::default_carrier")]
    pub carrier: Node,
    /// Compute nodes, in slot order
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSettings {
    #[serde(default = "PanelSettings::default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub service_mode: bool,
    /// Rearm delay of auto-refreshing pages
    #[serde(
        default = "PanelSettings::default_refresh_interval",
        with = "common::duration"
    )]
    pub refresh_interval: Duration,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            service_mode: false,
            refresh_interval: Self::default_refresh_interval(),
        }
    }
}

impl PanelSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_refresh_interval() -> Duration {
        Duration::from_secs(60)
    }
}

/// Where the character grid is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayInterface {
    /// Simulated panel in the terminal
    #[default]
    Terminal,
    /// In-memory grid only, for running as a service
    Headless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default)]
    pub interface: DisplayInterface,
    #[serde(default = "DisplaySettings::default_columns")]
    pub columns: usize,
    #[serde(default = "DisplaySettings::default_rows")]
    pub rows: usize,
    #[serde(
        default = "DisplaySettings::default_backlight_timeout",
        with = "common::duration"
    )]
    pub backlight_timeout: Duration,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            interface: DisplayInterface::default(),
            columns: Self::default_columns(),
            rows: Self::default_rows(),
            backlight_timeout: Self::default_backlight_timeout(),
        }
    }
}

impl DisplaySettings {
    fn default_columns() -> usize {
        16
    }

    fn default_rows() -> usize {
        2
    }

    fn default_backlight_timeout() -> Duration {
        Duration::from_secs(45)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonSettings {
    #[serde(default = "ButtonSettings::default_action")]
    pub action: ButtonConfig,
    #[serde(default = "ButtonSettings::default_left")]
    pub left: ButtonConfig,
    #[serde(default = "ButtonSettings::default_right")]
    pub right: ButtonConfig,
}

impl Default for ButtonSettings {
    fn default() -> Self {
        Self {
            action: Self::default_action(),
            left: Self::default_left(),
            right: Self::default_right(),
        }
    }
}

impl ButtonSettings {
    fn default_action() -> ButtonConfig {
        ButtonConfig::on_pin(22)
    }

    fn default_left() -> ButtonConfig {
        ButtonConfig::on_pin(17)
    }

    fn default_right() -> ButtonConfig {
        ButtonConfig::on_pin(27)
    }
}

/// One physical button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub gpio_pin: u8,
    #[serde(default = "ButtonConfig::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "ButtonConfig::default_double_press_ms")]
    pub double_press_ms: u64,
    #[serde(default = "ButtonConfig::default_hold_ms")]
    pub hold_ms: u64,
}

impl ButtonConfig {
    fn on_pin(gpio_pin: u8) -> Self {
        Self {
            gpio_pin,
            debounce_ms: Self::default_debounce_ms(),
            double_press_ms: Self::default_double_press_ms(),
            hold_ms: Self::default_hold_ms(),
        }
    }

    fn default_debounce_ms() -> u64 {
        250
    }

    fn default_double_press_ms() -> u64 {
        750
    }

    fn default_hold_ms() -> u64 {
        3000
    }

    pub fn timing(&self) -> ButtonTiming {
        ButtonTiming::new(
            Duration::from_millis(self.debounce_ms),
            Duration::from_millis(self.double_press_ms),
            Duration::from_millis(self.hold_ms),
        )
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            panel: PanelSettings::default(),
            display: DisplaySettings::default(),
            buttons: ButtonSettings::default(),
            carrier: Self::default_carrier(),
            nodes: (1..=4)
                .map(|index| {
                    Node::new(
                        &format!("node{}", index),
                        &format!("node{}.local", index),
                        "root",
                    )
                })
                .collect(),
        }
    }
}

impl PanelConfig {
    fn default_carrier() -> Node {
        Node::new("bmc", "turingpi.local", "root")
    }

    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/tpi-panel/panel.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: PanelConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("tpi-panel").join("panel.toml")
        } else {
            PathBuf::from(".config/tpi-panel/panel.toml")
        }
    }

    /// Copy safe to print, with passwords and passphrases masked
    pub fn redacted(&self) -> Self {
        Self {
            carrier: self.carrier.redacted(),
            nodes: self.nodes.iter().map(Node::redacted).collect(),
            ..self.clone()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !VALID_LOG_LEVELS.contains(&self.panel.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.panel.log_level,
                VALID_LOG_LEVELS.join(", ")
            ));
        }

        if self.panel.refresh_interval.is_zero() {
            return Err(anyhow!("refresh_interval must be greater than zero"));
        }

        let display = &self.display;
        if display.columns < MIN_COLUMNS || display.rows == 0 {
            return Err(anyhow!(
                "Display must have at least {} columns and one row, got {}x{}",
                MIN_COLUMNS,
                display.columns,
                display.rows
            ));
        }

        let slots = display.rows * 2;
        if self.nodes.len() > slots {
            return Err(anyhow!(
                "{} nodes configured but a {}-row display shows at most {}",
                self.nodes.len(),
                display.rows,
                slots
            ));
        }

        for (position, node) in self.nodes.iter().enumerate() {
            Self::validate_node(node)
                .with_context(|| format!("Invalid node {} in [[nodes]]", position + 1))?;
        }

        if !self.carrier.host_name.is_empty() {
            Self::validate_node(&self.carrier).context("Invalid [carrier]")?;
        }

        Ok(())
    }

    fn validate_node(node: &Node) -> Result<()> {
        if node.host_name.trim().is_empty() {
            return Err(anyhow!(
                "Node '{}' has no host_name",
                node.display_name()
            ));
        }
        if node.user_name.trim().is_empty() {
            return Err(anyhow!(
                "Node '{}' has no user_name",
                node.display_name()
            ));
        }
        Ok(())
    }
}
