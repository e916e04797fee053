//! Configuration for mantle
//!
//! Loads configuration from TOML at `~/.config/mantle/config.toml` (or the
//! path given with `--config`). A missing default file means defaults; a
//! file that exists but does not parse is a setup error. Key bindings are
//! built in and not configurable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::WmError;
use crate::wm::display::FrameStyle;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Command spawned by Alt+Return, program first
    pub terminal: Vec<String>,
    pub frame: FrameConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            terminal: vec!["/usr/bin/alacritty".to_string()],
            frame: FrameConfig::default(),
        }
    }
}

/// Frame appearance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameConfig {
    /// Border width in pixels
    pub border_width: u16,
    /// Border pixel value (0xRRGGBB on TrueColor visuals); screen white if unset
    pub border_color: Option<u32>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            border_width: 2,
            border_color: None,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; the default one may be missing.
    pub fn load(path: Option<&Path>) -> Result<Self, WmError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::config_path() {
                Some(path) => (path, false),
                None => {
                    info!("No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !explicit && !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| WmError::Config(format!("can't read {}: {e}", path.display())))?;
        let config = Self::from_toml(&content)
            .map_err(|e| WmError::Config(format!("{}: {e}", path.display())))?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, WmError> {
        let config: Config = toml::from_str(content).map_err(|e| WmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), WmError> {
        if self.terminal.first().is_none_or(|program| program.is_empty()) {
            return Err(WmError::Config("terminal command must not be empty".into()));
        }
        Ok(())
    }

    /// Default config file location
    fn config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("mantle").join("config.toml"))
    }

    pub fn frame_style(&self) -> FrameStyle {
        FrameStyle {
            border_width: self.frame.border_width,
            border_pixel: self.frame.border_color,
        }
    }
}
