//! Settings Module
//!
//! The part of the configuration the engine consumes at runtime.

use crate::config::Config;
use crate::wm::display::FrameStyle;

/// Window manager settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowManagerSettings {
    /// Border of every new frame
    pub style: FrameStyle,

    /// Command run by the spawn-terminal binding
    pub terminal: Vec<String>,
}

impl Default for WindowManagerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WindowManagerSettings {
    fn from(config: &Config) -> Self {
        Self {
            style: config.frame_style(),
            terminal: config.terminal.clone(),
        }
    }
}
